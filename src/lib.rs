//! aparts core library
//!
//! Builds a controlled vocabulary of research keywords from bibliographic
//! records and tags academic documents against it, weighting each match by the
//! document section it occurs in.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`text`] - Text hygiene and tokenization shared by every extractor
//! - [`extract`] - Seven keyword extraction algorithms behind one interface
//! - [`consensus`] - Cross-algorithm agreement filter
//! - [`vocabulary`] - Deduplicated keyword store, predefined lists, JSON persistence
//! - [`section`] - Heading-based document segmentation
//! - [`tagging`] - Section-weighted vocabulary matching
//! - [`tracker`] - Processed-set persistence for incremental runs
//! - [`record`] - Bibliographic records and BibTeX import/export
//! - [`document`] - Document discovery and text extraction
//! - [`pipeline`] - Batch orchestration of vocabulary builds and tagging runs
//! - [`export`] - CSV and JSON lines exports
//! - [`config`] - Configuration loading and validation
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod consensus;
pub mod db;
pub mod document;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod record;
pub mod section;
pub mod tagging;
pub mod text;
pub mod tracker;
pub mod vocabulary;

// Re-export commonly used types
pub use config::{ConfigError, RawConfig, TaggerConfig};
pub use consensus::{
    AgreementRange, AgreementScope, CandidateKeyword, ConsensusBuilder, ConsensusError,
    ConsensusKeyword, collect_candidates,
};
pub use db::{Database, DbError};
pub use document::{
    AutoTextSource, DecodingError, DocumentRef, PdfTextSource, PlainTextSource, TextSource,
    collect_documents,
};
pub use export::ExportError;
pub use extract::{Algorithm, ExtractorOutputs, ExtractorSet, KeywordExtractor, ScoredPhrase};
pub use pipeline::{
    DocumentOutcome, PipelineError, RunReport, TaggingRun, VocabularyOptions, VocabularyReport,
    build_vocabulary, enrich_records,
};
pub use record::{
    BibtexImport, Record, RecordError, parse_bibtex_records, read_bibtex_file, write_bibtex_file,
};
pub use section::{
    Section, SectionError, SectionLabel, SectionPatterns, SectionSegmenter, SectionWeights,
};
pub use tagging::{DocumentTags, TagAssignment, TaggingEngine, TaggingError, TaggingOptions};
pub use tracker::{
    CandidateStore, DocumentFailure, FailureKind, MemoryProcessedSet, ProcessedEntry,
    ProcessedSet, RecordCache, SqliteProcessedSet, TrackerError,
};
pub use vocabulary::{
    AlternateList, KeywordOrigin, MergedPair, Vocabulary, VocabularyEntry, VocabularyError,
    load_keyword_file,
};
