use chrono::{DateTime, Utc};
use nbbang_core::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one receipt in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    Parsed,
    Skipped { reason: String },
}

impl ReceiptStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ReceiptStatus::Skipped { reason: reason.into() }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ReceiptStatus::Parsed)
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptStatus::Parsed => write!(f, "parsed"),
            ReceiptStatus::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub source: PathBuf,
    /// SHA-256 hex digest of the file; empty when the file could not be read.
    pub hash_hex: String,
    #[serde(flatten)]
    pub status: ReceiptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
}

/// Per-receipt outcomes of one batch run, in input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub parsed: usize,
    pub skipped: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        let parsed = entries.iter().filter(|e| e.status.is_parsed()).count();
        Self {
            generated_at: Utc::now(),
            parsed,
            skipped: entries.len() - parsed,
            entries,
        }
    }

    /// Results of the parsed receipts only.
    pub fn results(&self) -> impl Iterator<Item = &ExtractionResult> {
        self.entries.iter().filter_map(|e| e.result.as_ref())
    }
}
