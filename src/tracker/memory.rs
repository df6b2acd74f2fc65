//! In-memory processed set.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentFailure, ProcessedEntry, ProcessedSet, Result};
use crate::tagging::DocumentTags;

/// Processed set that lives only as long as the value.
///
/// Nothing survives a restart; use [`super::SqliteProcessedSet`] for incremental runs.
#[derive(Debug, Default)]
pub struct MemoryProcessedSet {
    entries: Mutex<BTreeMap<String, ProcessedEntry>>,
    failures: Mutex<Vec<DocumentFailure>>,
}

impl MemoryProcessedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn timestamp() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    seconds.to_string()
}

#[async_trait]
impl ProcessedSet for MemoryProcessedSet {
    async fn already_processed(&self, document_id: &str) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(document_id))
    }

    async fn mark_processed(&self, document_id: &str, result: &DocumentTags) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(document_id) {
            return Ok(false);
        }
        entries.insert(
            document_id.to_string(),
            ProcessedEntry {
                document_id: document_id.to_string(),
                result: result.clone(),
                fingerprint: result.fingerprint.clone(),
                processed_at: timestamp(),
            },
        );
        Ok(true)
    }

    async fn load_result(&self, document_id: &str) -> Result<Option<ProcessedEntry>> {
        Ok(self.entries.lock().await.get(document_id).cloned())
    }

    async fn record_failure(&self, failure: &DocumentFailure) -> Result<()> {
        self.failures.lock().await.push(failure.clone());
        Ok(())
    }

    async fn failures(&self) -> Result<Vec<DocumentFailure>> {
        Ok(self.failures.lock().await.clone())
    }
}
