//! Data models for receipts, input documents and configuration.

pub mod config;
pub mod document;
pub mod receipt;
