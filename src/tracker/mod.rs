//! Incremental run tracking.
//!
//! The [`ProcessedSet`] records which documents have already been tagged and
//! stores their results, so re-running over the same folder only processes
//! new documents. It is append-only: marking a document twice keeps the first
//! result. Failed documents are logged but never marked, so later runs retry
//! them.

mod cache;
mod error;
mod memory;
mod sqlite;

pub use cache::{CandidateStore, RecordCache};
pub use error::TrackerError;
pub use memory::MemoryProcessedSet;
pub use sqlite::SqliteProcessedSet;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tagging::DocumentTags;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// A stored tagging result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEntry {
    pub document_id: String,
    pub result: DocumentTags,
    /// Fingerprint of the settings that produced `result`.
    pub fingerprint: String,
    pub processed_at: String,
}

/// Why a document could not be tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Text could not be extracted.
    Decoding,
    /// The result could not be persisted.
    Tracker,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decoding => "decoding",
            Self::Tracker => "tracker",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "decoding" => Ok(Self::Decoding),
            "tracker" => Ok(Self::Tracker),
            other => Err(format!("unknown failure kind: {other}")),
        }
    }
}

/// One document that failed during a tagging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Persistent record of already-tagged documents.
#[async_trait]
pub trait ProcessedSet: Send + Sync {
    /// Whether a result is stored for `document_id`.
    async fn already_processed(&self, document_id: &str) -> Result<bool>;

    /// Stores `result` unless `document_id` is already present.
    ///
    /// Returns `true` when a new entry was written.
    async fn mark_processed(&self, document_id: &str, result: &DocumentTags) -> Result<bool>;

    /// Loads the stored entry for `document_id`.
    async fn load_result(&self, document_id: &str) -> Result<Option<ProcessedEntry>>;

    /// Appends to the failure log.
    async fn record_failure(&self, failure: &DocumentFailure) -> Result<()>;

    /// Every logged failure, oldest first.
    async fn failures(&self) -> Result<Vec<DocumentFailure>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_round_trips_through_str() {
        for kind in [FailureKind::Decoding, FailureKind::Tracker] {
            assert_eq!(kind.as_str().parse::<FailureKind>().unwrap(), kind);
        }
        assert!("network".parse::<FailureKind>().is_err());
    }
}
