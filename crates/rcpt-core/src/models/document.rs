//! Input document types: raw text, OCR word layouts and email context.

use serde::{Deserialize, Serialize};

use crate::error::{RcptError, Result};

/// A single OCR word with its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Recognized text.
    pub text: String,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
    /// Recognition confidence. Words with a negative confidence are ignored.
    #[serde(default = "default_word_confidence")]
    pub confidence: f32,
}

fn default_word_confidence() -> f32 {
    1.0
}

impl Word {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// Get the center point of the word box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// Axis-aligned rectangle recorded on spatial candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A document handed to the engine: plain text, or OCR words with boxes.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    Text(String),
    Words(Vec<Word>),
}

impl DocumentInput {
    /// Parse a JSON array of OCR words.
    pub fn words_from_json(json: &str) -> Result<Self> {
        let words: Vec<Word> =
            serde_json::from_str(json).map_err(|e| RcptError::Input(format!("expected a JSON word list: {}", e)))?;
        if let Some(bad) = words
            .iter()
            .find(|w| !(w.x.is_finite() && w.y.is_finite() && w.width >= 0.0 && w.height >= 0.0))
        {
            return Err(RcptError::Input(format!("word {:?} has an invalid bounding box", bad.text)));
        }
        Ok(DocumentInput::Words(words))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            DocumentInput::Text(_) => InputKind::Text,
            DocumentInput::Words(_) => InputKind::Words,
        }
    }
}

/// Which form of input a result was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Words,
}

/// Email metadata supplied by the caller alongside the body text.
///
/// Absent for OCR'd images and PDFs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseContext {
    /// Display name of the sender (`"Uber Receipts"`, `"Jorden Shaw"`).
    pub sender_name: Option<String>,
    /// Sender address (`noreply@uber.com`).
    pub sender_email: Option<String>,
    /// Email subject line.
    pub subject: Option<String>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_sender_email(mut self, email: impl Into<String>) -> Self {
        self.sender_email = Some(email.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Domain part of the sender address, lowercased.
    pub fn sender_domain(&self) -> Option<String> {
        self.sender_email
            .as_deref()
            .and_then(|email| email.rsplit_once('@'))
            .map(|(_, domain)| domain.trim_end_matches('>').trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}
