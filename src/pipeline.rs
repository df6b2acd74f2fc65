//! Batch orchestration of vocabulary builds and tagging runs.
//!
//! Both pipelines are sequential: records and documents are handled one at a
//! time, and a tagging run checks its cancellation flag only between
//! documents, so a document is either fully tagged and recorded or not
//! touched at all.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::consensus::{AgreementRange, AgreementScope, ConsensusBuilder};
use crate::document::{DocumentRef, TextSource};
use crate::extract::{DEFAULT_TOP_K, ExtractorOutputs, ExtractorSet};
use crate::record::Record;
use crate::tagging::{DocumentTags, TaggingEngine};
use crate::tracker::{
    CandidateStore, DocumentFailure, FailureKind, ProcessedSet, RecordCache, TrackerError,
};
use crate::vocabulary::{AlternateList, KeywordOrigin, MergedPair, Vocabulary};

/// Errors that abort a whole pipeline run.
///
/// Per-document problems never surface here; they are collected in
/// [`RunReport::failures`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("state database error: {0}")]
    Tracker(#[from] TrackerError),
}

/// Settings for [`build_vocabulary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyOptions {
    pub agreement_range: AgreementRange,
    pub agreement_scope: AgreementScope,
    pub top_k: usize,
    pub include_author_keywords: bool,
    pub include_existing_tags: bool,
    pub alternate_lists: Vec<AlternateList>,
    /// Terms read from keyword files.
    pub keyword_terms: Vec<String>,
    pub merge_conjugations: bool,
}

impl Default for VocabularyOptions {
    fn default() -> Self {
        Self {
            agreement_range: AgreementRange::default(),
            agreement_scope: AgreementScope::default(),
            top_k: DEFAULT_TOP_K,
            include_author_keywords: true,
            include_existing_tags: true,
            alternate_lists: Vec::new(),
            keyword_terms: Vec::new(),
            merge_conjugations: false,
        }
    }
}

/// Outcome of a vocabulary build.
#[derive(Debug, Clone)]
pub struct VocabularyReport {
    pub vocabulary: Vocabulary,
    /// Conjugations folded when `merge_conjugations` is enabled.
    pub merged: Vec<MergedPair>,
    pub records_total: usize,
    /// Records run through the extractors.
    pub records_extracted: usize,
    /// Records whose extractor outputs came from the cache.
    pub records_cached: usize,
    /// Records with neither title nor abstract.
    pub records_without_text: usize,
}

/// Builds the consensus vocabulary for `records`.
///
/// When a `cache` is given, extractor outputs are looked up per record before
/// extracting and stored afterwards. Cache failures are logged and fall back
/// to extraction.
///
/// # Errors
/// Returns [`PipelineError`] if the run cannot continue. Cache errors are
/// logged as warnings instead.
#[instrument(skip_all, fields(records = records.len(), algorithms = extractors.algorithms().len()))]
pub async fn build_vocabulary(
    records: &[Record],
    extractors: &ExtractorSet,
    options: &VocabularyOptions,
    cache: Option<&dyn CandidateStore>,
) -> Result<VocabularyReport, PipelineError> {
    let algorithms = extractors.algorithms();
    let mut builder = ConsensusBuilder::new(options.agreement_range, options.agreement_scope);
    let mut records_extracted = 0;
    let mut records_cached = 0;
    let mut records_without_text = 0;

    for record in records {
        if options.include_author_keywords {
            builder.add_author_keywords(&record.author_keywords);
        }
        if options.include_existing_tags {
            builder.add_existing_tags(&record.existing_tags);
        }

        let Some(text) = record.extraction_text() else {
            debug!(record = %record.identifier, "record has no title or abstract");
            records_without_text += 1;
            continue;
        };

        let key = RecordCache::cache_key(&text, &algorithms, options.top_k);
        let outputs = match cached_outputs(cache, &record.identifier, &key).await {
            Some(outputs) => {
                records_cached += 1;
                outputs
            }
            None => {
                let outputs = extractors.extract_all(&text, options.top_k);
                records_extracted += 1;
                if let Some(cache) = cache
                    && let Err(error) = cache.put(&record.identifier, &key, &outputs).await
                {
                    warn!(record = %record.identifier, %error, "cannot cache extractor outputs");
                }
                outputs
            }
        };
        builder.add_outputs(&outputs);
    }

    let mut vocabulary = builder.build();
    for list in &options.alternate_lists {
        let added = vocabulary.merge_terms(list.terms(), KeywordOrigin::AlternateList);
        debug!(list = %list, added, "alternate list merged");
    }
    let from_files = vocabulary.merge_terms(&options.keyword_terms, KeywordOrigin::KeywordFile);
    debug!(added = from_files, "keyword file terms merged");

    let merged = if options.merge_conjugations {
        vocabulary.merge_conjugations()
    } else {
        Vec::new()
    };

    info!(
        terms = vocabulary.len(),
        extracted = records_extracted,
        cached = records_cached,
        without_text = records_without_text,
        merged = merged.len(),
        "vocabulary built"
    );

    Ok(VocabularyReport {
        vocabulary,
        merged,
        records_total: records.len(),
        records_extracted,
        records_cached,
        records_without_text,
    })
}

async fn cached_outputs(
    cache: Option<&dyn CandidateStore>,
    record_id: &str,
    key: &str,
) -> Option<ExtractorOutputs> {
    let cache = cache?;
    match cache.get(record_id, key).await {
        Ok(outputs) => outputs,
        Err(error) => {
            warn!(record = %record_id, %error, "record cache lookup failed");
            None
        }
    }
}

/// What happened to one document in a tagging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Tagged in this run and recorded in the processed set.
    Tagged(DocumentTags),
    /// Result taken from the processed set.
    Reused(DocumentTags),
    Failed(DocumentFailure),
}

/// Summary of a tagging run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Results of every tagged or reused document, in document order.
    pub results: Vec<DocumentTags>,
    pub newly_tagged: usize,
    pub reused: usize,
    pub failures: Vec<DocumentFailure>,
    /// Set when cancellation stopped the run before the last document.
    pub interrupted: bool,
}

impl RunReport {
    /// True when every document was tagged and the run was not interrupted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.interrupted
    }

    /// Number of documents carrying each tag.
    #[must_use]
    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            for keyword in result.keywords() {
                *counts.entry(keyword.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn push(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Tagged(tags) => {
                self.newly_tagged += 1;
                self.results.push(tags);
            }
            DocumentOutcome::Reused(tags) => {
                self.reused += 1;
                self.results.push(tags);
            }
            DocumentOutcome::Failed(failure) => self.failures.push(failure),
        }
    }
}

/// One pass of the tagging engine over a set of documents.
pub struct TaggingRun<'a> {
    engine: &'a TaggingEngine,
    source: &'a dyn TextSource,
    processed: &'a dyn ProcessedSet,
}

impl std::fmt::Debug for TaggingRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggingRun")
            .field("engine", self.engine)
            .finish_non_exhaustive()
    }
}

impl<'a> TaggingRun<'a> {
    #[must_use]
    pub fn new(
        engine: &'a TaggingEngine,
        source: &'a dyn TextSource,
        processed: &'a dyn ProcessedSet,
    ) -> Self {
        Self {
            engine,
            source,
            processed,
        }
    }

    /// Tags `documents` in order, skipping those already processed.
    ///
    /// # Errors
    /// Returns [`PipelineError`] if the run cannot continue. Per-document
    /// failures are reported in [`RunReport::failures`] instead.
    pub async fn run(
        &self,
        documents: &[DocumentRef],
        cancel: &AtomicBool,
    ) -> Result<RunReport, PipelineError> {
        self.run_with_observer(documents, cancel, |_, _| {}).await
    }

    /// Like [`Self::run`], calling `observer` after each document with the
    /// document and its outcome.
    ///
    /// # Errors
    /// See [`Self::run`].
    #[instrument(skip_all, fields(documents = documents.len(), fingerprint = %self.engine.fingerprint()))]
    pub async fn run_with_observer<F>(
        &self,
        documents: &[DocumentRef],
        cancel: &AtomicBool,
        mut observer: F,
    ) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&DocumentRef, &DocumentOutcome) + Send,
    {
        let mut report = RunReport::default();

        for (index, document) in documents.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                warn!(
                    done = index,
                    remaining = documents.len() - index,
                    "run cancelled"
                );
                report.interrupted = true;
                break;
            }

            let outcome = self.process(document).await;
            if let DocumentOutcome::Failed(failure) = &outcome {
                warn!(
                    document_id = %failure.document_id,
                    kind = %failure.kind,
                    message = %failure.message,
                    "document failed"
                );
                if let Err(error) = self.processed.record_failure(failure).await {
                    warn!(document_id = %failure.document_id, %error, "cannot log failure");
                }
            }
            observer(document, &outcome);
            report.push(outcome);
        }

        info!(
            tagged = report.newly_tagged,
            reused = report.reused,
            failed = report.failures.len(),
            interrupted = report.interrupted,
            "tagging run finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(document_id = %document.id))]
    async fn process(&self, document: &DocumentRef) -> DocumentOutcome {
        match self.stored_result(document).await {
            Ok(Some(tags)) => return DocumentOutcome::Reused(tags),
            Ok(None) => {}
            Err(error) => return tracker_failure(document, &error),
        }

        let text = match self.source.extract_text(&document.path) {
            Ok(text) => text,
            Err(error) => {
                return DocumentOutcome::Failed(DocumentFailure {
                    document_id: document.id.clone(),
                    path: document.path.clone(),
                    kind: FailureKind::Decoding,
                    message: error.to_string(),
                });
            }
        };

        let tags = self.engine.tag(&document.id, &text);
        match self.processed.mark_processed(&document.id, &tags).await {
            Ok(_) => DocumentOutcome::Tagged(tags),
            Err(error) => tracker_failure(document, &error),
        }
    }

    async fn stored_result(
        &self,
        document: &DocumentRef,
    ) -> Result<Option<DocumentTags>, TrackerError> {
        if !self.processed.already_processed(&document.id).await? {
            return Ok(None);
        }
        let Some(entry) = self.processed.load_result(&document.id).await? else {
            return Ok(None);
        };
        if entry.fingerprint != self.engine.fingerprint() {
            info!(
                stored = %entry.fingerprint,
                current = %self.engine.fingerprint(),
                "reusing result produced with different settings"
            );
        }
        Ok(Some(entry.result))
    }
}

fn tracker_failure(document: &DocumentRef, error: &TrackerError) -> DocumentOutcome {
    DocumentOutcome::Failed(DocumentFailure {
        document_id: document.id.clone(),
        path: document.path.clone(),
        kind: FailureKind::Tracker,
        message: error.to_string(),
    })
}

/// Whether `record` describes the document `document_id`.
///
/// True when the record's identifier, or the file stem of its attached
/// document, equals the document id or the id's last path segment.
pub(crate) fn record_matches(record: &Record, document_id: &str) -> bool {
    let leaf = document_id.rsplit('/').next().unwrap_or(document_id);
    [record.identifier.as_str()]
        .into_iter()
        .chain(record.source_stem())
        .any(|key| key == document_id || key == leaf)
}

/// Attaches generated tags to the records that match a tagged document.
///
/// Returns the number of records enriched.
#[instrument(skip_all, fields(records = records.len(), results = results.len()))]
pub fn enrich_records(records: &mut [Record], results: &[DocumentTags]) -> usize {
    let mut enriched = 0;
    for record in records.iter_mut() {
        let matching: Vec<&DocumentTags> = results
            .iter()
            .filter(|result| record_matches(record, &result.document_id))
            .collect();
        if matching.is_empty() {
            continue;
        }
        for result in matching {
            record
                .generated_tags
                .extend(result.keywords().map(String::from));
        }
        enriched += 1;
    }
    debug!(enriched, "records enriched");
    enriched
}
