use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RECEIPT: &str = "Uber\nOctober 12, 2025\nSubtotal: CA$52.40\nHST: CA$7.32\nTotal: CA$59.72\n";

fn rcpt(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rcpt").unwrap();
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_process_json_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "receipt.txt", RECEIPT);

    let output = rcpt(dir.path()).arg("process").arg(&input).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["amount"]["best"]["value"], "59.72");
    assert_eq!(json["currency"]["best"]["value"], "CAD");
    assert!(json["debug"]["field_confidence"].get("subtotal").is_some());
}

#[test]
fn test_process_csv_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "receipt.txt", RECEIPT);

    rcpt(dir.path())
        .args(["process", "--format", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "date,vendor,amount,currency,tax,review_status,confidence,warnings\n",
        ))
        .stdout(predicate::str::contains("2025-10-12"))
        .stdout(predicate::str::contains("59.72,CAD,7.32"));
}

#[test]
fn test_process_empty_input_needs_review() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "empty.txt", "   \n");

    rcpt(dir.path())
        .args(["process", "--format", "text"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Vendor:   N/A"))
        .stdout(predicate::str::contains("Amount:   N/A USD"))
        .stdout(predicate::str::contains("Needs Review"));
}

#[test]
fn test_process_word_list() {
    let dir = TempDir::new().unwrap();
    let words = r#"[
        {"text": "Total", "x": 10, "y": 120, "width": 60, "height": 20},
        {"text": "$6.55", "x": 300, "y": 120, "width": 50, "height": 20}
    ]"#;
    let input = write(&dir, "words.json", words);

    let output = rcpt(dir.path()).arg("process").arg(&input).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["amount"]["best"]["value"], "6.55");
    assert_eq!(json["debug"]["input_kind"], "words");
}

#[test]
fn test_process_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "receipt.txt", RECEIPT);
    let out = dir.path().join("out.json");

    rcpt(dir.path())
        .arg("process")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written to"));

    assert!(fs::read_to_string(out).unwrap().contains("overall_confidence"));
}

#[test]
fn test_process_reports_duplicate() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "receipt.txt", RECEIPT);
    let prior = write(
        &dir,
        "prior.json",
        r#"[{"id": "r-1", "user_id": "local", "file_hash": "abc", "vendor": "Uber", "amount": "59.72", "date": "2025-10-12"}]"#,
    );

    rcpt(dir.path())
        .arg("process")
        .arg(&input)
        .arg("--prior")
        .arg(&prior)
        .assert()
        .success()
        .stderr(predicate::str::contains("Duplicate of r-1"));
}

#[test]
fn test_process_missing_file() {
    let dir = TempDir::new().unwrap();

    rcpt(dir.path())
        .args(["process", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_skips_duplicates() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.txt", RECEIPT);
    write(&dir, "b.txt", RECEIPT);
    write(&dir, "notes.md", RECEIPT);
    let out = dir.path().join("out");

    rcpt(dir.path())
        .arg("batch")
        .arg(format!("{}/*", dir.path().display()))
        .arg("--output-dir")
        .arg(&out)
        .args(["--summary", "--skip-duplicates", "--jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 files"))
        .stdout(predicate::str::contains("1 duplicates"));

    assert!(out.join("a.json").exists());
    assert!(!out.join("b.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("a.txt,success,"));
    assert!(lines[2].starts_with("b.txt,duplicate,"));
}

#[test]
fn test_batch_no_matches() {
    let dir = TempDir::new().unwrap();

    rcpt(dir.path())
        .arg("batch")
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();

    rcpt(dir.path())
        .args(["config", "set", "review.min_amount_confidence", "0.5"])
        .assert()
        .success();

    rcpt(dir.path())
        .args(["config", "get", "review.min_amount_confidence"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.5"));

    rcpt(dir.path())
        .args(["config", "set", "review.no_such_key", "1"])
        .assert()
        .failure();
}

#[test]
fn test_config_path_and_init() {
    let dir = TempDir::new().unwrap();

    rcpt(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    let target = dir.path().join("custom.json");
    rcpt(dir.path())
        .args(["config", "init", "--output"])
        .arg(&target)
        .assert()
        .success();
    assert!(target.exists());

    rcpt(dir.path())
        .args(["config", "init", "--output"])
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_custom_config_file() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "receipt.txt", "Total: $6.55\n");
    let config = write(&dir, "config.json", r#"{"export": {"missing_placeholder": "-"}}"#);

    rcpt(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["process", "--format", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("-,-,6.55,USD"));
}
