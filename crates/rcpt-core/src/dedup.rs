//! Duplicate detection against previously stored receipts.
//!
//! Runs one layer above the parser: the caller builds a [`CandidateRecord`]
//! from a finished [`ParseResult`] and checks it against the user's prior
//! records before persisting. Check-then-insert atomicity belongs to the
//! storage layer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::receipt::{Field, ParseResult};

/// A receipt already stored for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorRecord {
    pub id: String,
    pub user_id: String,
    pub file_hash: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Lookup of stored receipts, keyed by user.
pub trait PriorRecords {
    fn records_for(&self, user_id: &str) -> Vec<PriorRecord>;
}

impl PriorRecords for Vec<PriorRecord> {
    fn records_for(&self, user_id: &str) -> Vec<PriorRecord> {
        self.iter().filter(|r| r.user_id == user_id).cloned().collect()
    }
}

impl PriorRecords for [PriorRecord] {
    fn records_for(&self, user_id: &str) -> Vec<PriorRecord> {
        self.iter().filter(|r| r.user_id == user_id).cloned().collect()
    }
}

/// The fields of a new receipt that duplicate checks look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub user_id: String,
    pub file_hash: String,
    pub vendor: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

impl CandidateRecord {
    /// Take the best values of a parse result.
    pub fn from_result(result: &ParseResult, user_id: impl Into<String>, file_hash: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            file_hash: file_hash.into(),
            vendor: result.vendor.value().cloned(),
            amount: result.amount.value().copied(),
            date: result.date.value().copied(),
        }
    }

    /// As a record that later candidates can be checked against.
    pub fn into_prior(self, id: impl Into<String>) -> PriorRecord {
        PriorRecord {
            id: id.into(),
            user_id: self.user_id,
            file_hash: self.file_hash,
            vendor: self.vendor,
            amount: self.amount,
            date: self.date,
        }
    }
}

/// How a duplicate was recognized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuplicateKind {
    /// Same file content.
    ExactHash,
    /// Different file, same vendor/amount/date values.
    Semantic { matched_fields: Vec<Field> },
}

/// A prior record the new receipt duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub record: PriorRecord,
    pub kind: DuplicateKind,
}

/// Exact-hash and semantic duplicate checks.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    min_semantic_fields: usize,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self { min_semantic_fields: 2 }
    }

    /// Find the first prior record `new` duplicates.
    ///
    /// An exact file hash match wins over any semantic match. A semantic
    /// match needs at least two of vendor, amount and date on the new record,
    /// and every one of them must equal the prior record's value.
    pub fn check<P>(&self, new: &CandidateRecord, prior: &P) -> Option<DuplicateMatch>
    where
        P: PriorRecords + ?Sized,
    {
        let records = prior.records_for(&new.user_id);

        if !new.file_hash.is_empty() {
            if let Some(record) = records.iter().find(|r| r.file_hash == new.file_hash) {
                debug!("Exact duplicate of {} for user {}", record.id, new.user_id);
                return Some(DuplicateMatch {
                    record: record.clone(),
                    kind: DuplicateKind::ExactHash,
                });
            }
        }

        let present = present_fields(new);
        if present.len() < self.min_semantic_fields {
            debug!(
                "Only {} of vendor/amount/date present, skipping semantic check",
                present.len()
            );
            return None;
        }

        let record = records.iter().find(|r| present.iter().all(|f| field_matches(*f, new, r)))?;
        debug!("Semantic duplicate of {} on {:?}", record.id, present);
        Some(DuplicateMatch {
            record: record.clone(),
            kind: DuplicateKind::Semantic { matched_fields: present },
        })
    }
}

fn present_fields(record: &CandidateRecord) -> Vec<Field> {
    let mut fields = Vec::with_capacity(3);
    if record.vendor.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        fields.push(Field::Vendor);
    }
    if record.amount.is_some() {
        fields.push(Field::Amount);
    }
    if record.date.is_some() {
        fields.push(Field::Date);
    }
    fields
}

fn field_matches(field: Field, new: &CandidateRecord, prior: &PriorRecord) -> bool {
    match field {
        Field::Vendor => match (&new.vendor, &prior.vendor) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => false,
        },
        Field::Amount => match (new.amount, prior.amount) {
            (Some(a), Some(b)) => a.normalize() == b.normalize(),
            _ => false,
        },
        Field::Date => new.date.is_some() && new.date == prior.date,
        _ => false,
    }
}
