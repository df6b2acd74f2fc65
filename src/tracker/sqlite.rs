//! SQLite-backed processed set.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{DocumentFailure, FailureKind, ProcessedEntry, ProcessedSet, Result, TrackerError};
use crate::db::Database;
use crate::tagging::DocumentTags;

/// Processed set persisted in the state database; survives restarts.
#[derive(Debug, Clone)]
pub struct SqliteProcessedSet {
    db: Database,
}

impl SqliteProcessedSet {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Number of stored results.
    ///
    /// # Errors
    /// Returns [`TrackerError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_documents")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl ProcessedSet for SqliteProcessedSet {
    #[instrument(skip(self))]
    async fn already_processed(&self, document_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM processed_documents WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self, result), fields(tags = result.tags.len()))]
    async fn mark_processed(&self, document_id: &str, result: &DocumentTags) -> Result<bool> {
        let json = serde_json::to_string(result)?;
        let outcome = sqlx::query(
            "INSERT INTO processed_documents (document_id, result_json, fingerprint) \
             VALUES (?, ?, ?) ON CONFLICT(document_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(json)
        .bind(&result.fingerprint)
        .execute(self.db.pool())
        .await?;

        let inserted = outcome.rows_affected() == 1;
        debug!(inserted, "processed set updated");
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn load_result(&self, document_id: &str) -> Result<Option<ProcessedEntry>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT result_json, fingerprint, processed_at FROM processed_documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|(json, fingerprint, processed_at)| {
            Ok(ProcessedEntry {
                document_id: document_id.to_string(),
                result: serde_json::from_str(&json)?,
                fingerprint,
                processed_at,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, failure), fields(document_id = %failure.document_id, kind = %failure.kind))]
    async fn record_failure(&self, failure: &DocumentFailure) -> Result<()> {
        sqlx::query(
            "INSERT INTO tagging_failures (document_id, path, kind, message) VALUES (?, ?, ?, ?)",
        )
        .bind(&failure.document_id)
        .bind(failure.path.to_string_lossy().into_owned())
        .bind(failure.kind.as_str())
        .bind(&failure.message)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn failures(&self) -> Result<Vec<DocumentFailure>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT document_id, path, kind, message FROM tagging_failures ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|(document_id, path, kind, message)| {
                Ok(DocumentFailure {
                    document_id,
                    path: PathBuf::from(path),
                    kind: kind
                        .parse::<FailureKind>()
                        .map_err(TrackerError::Serialization)?,
                    message,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tagging::TagAssignment;

    fn tags(document_id: &str, keyword: &str) -> DocumentTags {
        DocumentTags {
            document_id: document_id.to_string(),
            tags: vec![TagAssignment {
                document_id: document_id.to_string(),
                keyword: keyword.to_string(),
                score: 4,
            }],
            fingerprint: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mark_then_load_round_trip() {
        let set = SqliteProcessedSet::new(Database::new_in_memory().await.unwrap());
        assert!(!set.already_processed("doc").await.unwrap());

        assert!(set.mark_processed("doc", &tags("doc", "gecko")).await.unwrap());
        assert!(set.already_processed("doc").await.unwrap());

        let entry = set.load_result("doc").await.unwrap().unwrap();
        assert_eq!(entry.result, tags("doc", "gecko"));
        assert_eq!(entry.fingerprint, "abc");
        assert!(!entry.processed_at.is_empty());
    }

    #[tokio::test]
    async fn test_mark_processed_keeps_first_entry() {
        let set = SqliteProcessedSet::new(Database::new_in_memory().await.unwrap());
        assert!(set.mark_processed("doc", &tags("doc", "gecko")).await.unwrap());
        assert!(!set.mark_processed("doc", &tags("doc", "skink")).await.unwrap());

        let entry = set.load_result("doc").await.unwrap().unwrap();
        assert_eq!(entry.result.tags[0].keyword, "gecko");
        assert_eq!(set.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_result_missing_is_none() {
        let set = SqliteProcessedSet::new(Database::new_in_memory().await.unwrap());
        assert!(set.load_result("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failures_are_logged_in_order() {
        let set = SqliteProcessedSet::new(Database::new_in_memory().await.unwrap());
        for (id, kind) in [("a", FailureKind::Decoding), ("b", FailureKind::Tracker)] {
            set.record_failure(&DocumentFailure {
                document_id: id.to_string(),
                path: PathBuf::from(format!("{id}.pdf")),
                kind,
                message: "broken".to_string(),
            })
            .await
            .unwrap();
        }

        let failures = set.failures().await.unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].document_id, "a");
        assert_eq!(failures[1].kind, FailureKind::Tracker);
        assert!(!set.already_processed("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupted_result_json_is_a_serialization_error() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO processed_documents (document_id, result_json, fingerprint) VALUES ('doc', '{broken', 'x')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let set = SqliteProcessedSet::new(db);
        let err = set.load_result("doc").await.unwrap_err();
        assert!(matches!(err, TrackerError::Serialization(_)));
    }
}
