//! Core library for receipt field extraction.
//!
//! This crate provides:
//! - Text normalization for OCR output and email bodies
//! - Rule-based candidate generation for vendor, amount, subtotal, tax, date and currency
//! - Candidate scoring, top-3 selection and overall confidence
//! - Subtotal + tax = total consistency checks and review gating
//! - Bounding-box (spatial) search for OCR word layouts
//! - Duplicate detection against previously stored receipts

pub mod dedup;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod receipt;
pub mod spatial;

pub use dedup::{CandidateRecord, DuplicateDetector, DuplicateKind, DuplicateMatch, PriorRecord, PriorRecords};
pub use error::{RcptError, Result};
pub use export::ExportRow;
pub use models::config::RcptConfig;
pub use models::document::{BoundingBox, DocumentInput, InputKind, ParseContext, Word};
pub use models::receipt::{
    Candidate, CandidateSource, Currency, DebugInfo, Field, FieldResult, Issue, ParseResult, RawSpan,
    Validation,
};
pub use receipt::{ReceiptExtractor, ReceiptParser};
