//! Per-record cache of extractor outputs.
//!
//! Running seven extractors over every abstract dominates vocabulary build
//! time. Outputs are cached per record under a key derived from the record
//! text and the extraction settings, so a rebuild only re-extracts records
//! that are new or changed.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::Result;
use crate::db::Database;
use crate::extract::{Algorithm, ExtractorOutputs};

/// Extractor output cache stored in the state database.
#[derive(Debug, Clone)]
pub struct RecordCache {
    db: Database,
}

/// Storage contract for cached extractor outputs.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Cached outputs for `record_id`, if they were produced under `key`.
    async fn get(&self, record_id: &str, key: &str) -> Result<Option<ExtractorOutputs>>;

    /// Stores outputs for `record_id`, replacing any previous entry.
    async fn put(&self, record_id: &str, key: &str, outputs: &ExtractorOutputs) -> Result<()>;
}

impl RecordCache {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Key covering the record text and every setting that affects extraction.
    #[must_use]
    pub fn cache_key(text: &str, algorithms: &[Algorithm], top_k: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        for algorithm in algorithms {
            hasher.update(b";");
            hasher.update(algorithm.as_str().as_bytes());
        }
        hasher.update(format!(";top_k={top_k}"));
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl CandidateStore for RecordCache {
    #[instrument(skip(self, key))]
    async fn get(&self, record_id: &str, key: &str) -> Result<Option<ExtractorOutputs>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT outputs_json FROM record_candidates WHERE record_id = ? AND settings_key = ?",
        )
        .bind(record_id)
        .bind(key)
        .fetch_optional(self.db.pool())
        .await?;

        let outputs = row
            .map(|(json,)| serde_json::from_str::<ExtractorOutputs>(&json))
            .transpose()?;
        debug!(hit = outputs.is_some(), "record cache lookup");
        Ok(outputs)
    }

    #[instrument(skip(self, key, outputs))]
    async fn put(&self, record_id: &str, key: &str, outputs: &ExtractorOutputs) -> Result<()> {
        let json = serde_json::to_string(outputs)?;
        sqlx::query(
            "INSERT INTO record_candidates (record_id, settings_key, outputs_json) VALUES (?, ?, ?) \
             ON CONFLICT(record_id) DO UPDATE SET settings_key = excluded.settings_key, \
             outputs_json = excluded.outputs_json, extracted_at = datetime('now')",
        )
        .bind(record_id)
        .bind(key)
        .bind(json)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::ScoredPhrase;

    fn outputs(phrase: &str) -> ExtractorOutputs {
        ExtractorOutputs::from([(
            Algorithm::Yake,
            vec![ScoredPhrase {
                phrase: phrase.to_string(),
                score: 0.5,
            }],
        )])
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = RecordCache::new(Database::new_in_memory().await.unwrap());
        let key = RecordCache::cache_key("abstract", &Algorithm::ALL, 10);
        assert!(cache.get("doe2020", &key).await.unwrap().is_none());

        cache.put("doe2020", &key, &outputs("gene flow")).await.unwrap();
        assert_eq!(cache.get("doe2020", &key).await.unwrap(), Some(outputs("gene flow")));
    }

    #[tokio::test]
    async fn test_cache_misses_when_key_changes() {
        let cache = RecordCache::new(Database::new_in_memory().await.unwrap());
        let old_key = RecordCache::cache_key("abstract", &Algorithm::ALL, 10);
        let new_key = RecordCache::cache_key("abstract", &Algorithm::ALL, 5);
        assert_ne!(old_key, new_key);

        cache.put("doe2020", &old_key, &outputs("gene flow")).await.unwrap();
        assert!(cache.get("doe2020", &new_key).await.unwrap().is_none());

        cache.put("doe2020", &new_key, &outputs("phylogeny")).await.unwrap();
        assert!(cache.get("doe2020", &old_key).await.unwrap().is_none());
        assert_eq!(cache.get("doe2020", &new_key).await.unwrap(), Some(outputs("phylogeny")));
    }

    #[test]
    fn test_cache_key_depends_on_text() {
        assert_ne!(
            RecordCache::cache_key("a", &Algorithm::ALL, 10),
            RecordCache::cache_key("b", &Algorithm::ALL, 10)
        );
    }
}
