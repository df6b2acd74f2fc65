//! Bibliographic records.
//!
//! A [`Record`] is read-only after import: the pipeline only ever fills
//! [`Record::generated_tags`]. Records come from BibTeX exports of reference
//! managers (Zotero, Mendeley, JabRef), which carry the abstract, author
//! keywords, the user's own tags and a link to the attached PDF.

mod bibtex;

pub use bibtex::{BibtexImport, GENERATED_TAGS_FIELD, parse_bibtex_records, write_bibtex};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Errors from reading or writing record files.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot read bibliography '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write bibliography '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One bibliographic record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Citation key.
    pub identifier: String,
    pub entry_type: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authors: Option<String>,
    pub year: Option<u16>,
    pub doi: Option<String>,
    pub author_keywords: Vec<String>,
    pub existing_tags: BTreeSet<String>,
    /// Attached full-text document, as written in the bibliography.
    pub source_path: Option<PathBuf>,
    /// Tags attached by a tagging run.
    pub generated_tags: BTreeSet<String>,
    /// Entry text as imported, used to write enriched bibliographies.
    #[serde(skip)]
    pub(crate) raw: String,
}

impl Record {
    /// A record with only an identifier, title and abstract.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        title: Option<&str>,
        abstract_text: Option<&str>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            entry_type: "article".to_string(),
            title: title.map(String::from),
            abstract_text: abstract_text.map(String::from),
            ..Self::default()
        }
    }

    /// Title and abstract joined into the text keywords are extracted from.
    ///
    /// Returns `None` when the record has neither.
    #[must_use]
    pub fn extraction_text(&self) -> Option<String> {
        let parts: Vec<&str> = [self.title.as_deref(), self.abstract_text.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(
            parts
                .iter()
                .map(|part| {
                    if part.ends_with(['.', '?', '!']) {
                        (*part).to_string()
                    } else {
                        format!("{part}.")
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// File stem of the attached document, if any.
    #[must_use]
    pub fn source_stem(&self) -> Option<&str> {
        self.source_path
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|stem| stem.to_str())
    }
}

/// Reads and parses a BibTeX file.
///
/// # Errors
/// Returns [`RecordError::Read`] if the file cannot be read. Malformed entries
/// are not errors; they are reported in [`BibtexImport::skipped`].
#[instrument]
pub fn read_bibtex_file(path: &Path) -> Result<BibtexImport, RecordError> {
    let content = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_bibtex_records(&content))
}

/// Writes records as BibTeX, adding generated tags to each entry.
///
/// # Errors
/// Returns [`RecordError::Write`] if the file cannot be written.
#[instrument(skip(records), fields(records = records.len()))]
pub fn write_bibtex_file(path: &Path, records: &[Record]) -> Result<(), RecordError> {
    std::fs::write(path, write_bibtex(records)).map_err(|source| RecordError::Write {
        path: path.to_path_buf(),
        source,
    })
}
