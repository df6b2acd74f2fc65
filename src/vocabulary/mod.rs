//! The controlled vocabulary the tagging engine matches against.
//!
//! A [`Vocabulary`] is an ordered list of unique normalized terms. Every merge
//! is idempotent: adding a term that is already present changes nothing, so
//! the same inputs always produce the same vocabulary and fingerprint.

mod conjugation;
mod lists;

pub use conjugation::MergedPair;
pub use lists::AlternateList;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::text::normalize_phrase;

/// Errors from reading or writing vocabulary files.
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid vocabulary file: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where a vocabulary term came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordOrigin {
    Consensus,
    AuthorKeyword,
    ExistingTag,
    AlternateList,
    KeywordFile,
}

impl KeywordOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::AuthorKeyword => "author_keyword",
            Self::ExistingTag => "existing_tag",
            Self::AlternateList => "alternate_list",
            Self::KeywordFile => "keyword_file",
        }
    }
}

impl fmt::Display for KeywordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One vocabulary term with its consensus statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Normalized form.
    pub keyword: String,
    pub agreement_count: usize,
    pub frequency: usize,
    pub origin: KeywordOrigin,
}

impl VocabularyEntry {
    /// An entry with no consensus statistics, e.g. from a keyword file.
    #[must_use]
    pub fn new(keyword: impl Into<String>, origin: KeywordOrigin) -> Self {
        Self {
            keyword: keyword.into(),
            agreement_count: 0,
            frequency: 0,
            origin,
        }
    }
}

/// Ordered, duplicate-free set of normalized terms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<VocabularyEntry>", into = "Vec<VocabularyEntry>")]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
    index: HashSet<String>,
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Vocabulary {}

impl From<Vec<VocabularyEntry>> for Vocabulary {
    fn from(entries: Vec<VocabularyEntry>) -> Self {
        let mut vocabulary = Self::new();
        vocabulary.merge_entries(entries);
        vocabulary
    }
}

impl From<Vocabulary> for Vec<VocabularyEntry> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.entries
    }
}

impl Vocabulary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the normalized form of `term` is present.
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.index.contains(&normalize_phrase(term))
    }

    /// Looks up the entry for the normalized form of `term`.
    #[must_use]
    pub fn get(&self, term: &str) -> Option<&VocabularyEntry> {
        let key = normalize_phrase(term);
        if !self.index.contains(&key) {
            return None;
        }
        self.entries.iter().find(|entry| entry.keyword == key)
    }

    #[must_use]
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// Normalized terms in vocabulary order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.keyword.as_str())
    }

    /// Appends entries whose normalized form is new; returns how many were added.
    pub fn merge_entries(&mut self, entries: impl IntoIterator<Item = VocabularyEntry>) -> usize {
        let mut added = 0;
        for mut entry in entries {
            entry.keyword = normalize_phrase(&entry.keyword);
            if entry.keyword.is_empty() || self.index.contains(&entry.keyword) {
                continue;
            }
            self.index.insert(entry.keyword.clone());
            self.entries.push(entry);
            added += 1;
        }
        added
    }

    /// Appends plain terms tagged with `origin`; returns how many were added.
    pub fn merge_terms<S: AsRef<str>>(
        &mut self,
        terms: impl IntoIterator<Item = S>,
        origin: KeywordOrigin,
    ) -> usize {
        self.merge_entries(
            terms
                .into_iter()
                .map(|term| VocabularyEntry::new(term.as_ref(), origin)),
        )
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&VocabularyEntry) -> bool) {
        self.entries.retain(|entry| keep(entry));
        self.index = self.entries.iter().map(|entry| entry.keyword.clone()).collect();
    }

    pub(crate) fn entry_mut(&mut self, term: &str) -> Option<&mut VocabularyEntry> {
        self.entries.iter_mut().find(|entry| entry.keyword == term)
    }

    /// SHA-256 over the ordered terms, as lowercase hex.
    ///
    /// Statistics and origins are not part of the fingerprint: only the terms
    /// and their order affect tagging.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for term in self.terms() {
            hasher.update(term.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Writes the vocabulary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`VocabularyError::Write`] if the file cannot be written.
    #[instrument(skip(self), fields(terms = self.len()))]
    pub fn save(&self, path: &Path) -> Result<(), VocabularyError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            VocabularyError::Format {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(|source| VocabularyError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "vocabulary saved");
        Ok(())
    }

    /// Reads a vocabulary written by [`Self::save`].
    ///
    /// # Errors
    /// Returns [`VocabularyError`] if the file is missing or not valid JSON.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path).map_err(|source| VocabularyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| VocabularyError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads a keyword file (one term per line).
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns [`VocabularyError::Read`] if the file cannot be read.
#[instrument]
pub fn load_keyword_file(path: &Path) -> Result<Vec<String>, VocabularyError> {
    let content = std::fs::read_to_string(path).map_err(|source| VocabularyError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_merge_terms_normalizes_and_skips_duplicates() {
        let mut vocabulary = Vocabulary::new();
        let added = vocabulary.merge_terms(
            ["Gene Flows", "gene flow", "", "Phylogeny"],
            KeywordOrigin::KeywordFile,
        );
        assert_eq!(added, 2);
        assert_eq!(vocabulary.terms().collect::<Vec<_>>(), vec!["gene flow", "phylogeny"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(["lizard", "gecko"], KeywordOrigin::AlternateList);
        let before = vocabulary.clone();
        let fingerprint = vocabulary.fingerprint();

        assert_eq!(vocabulary.merge_terms(["lizard", "gecko"], KeywordOrigin::AlternateList), 0);
        assert_eq!(vocabulary, before);
        assert_eq!(vocabulary.fingerprint(), fingerprint);
    }

    #[test]
    fn test_merge_preserves_first_origin() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(["lizard"], KeywordOrigin::Consensus);
        vocabulary.merge_terms(["lizards"], KeywordOrigin::KeywordFile);
        assert_eq!(vocabulary.get("Lizards").unwrap().origin, KeywordOrigin::Consensus);
    }

    #[test]
    fn test_fingerprint_depends_on_order() {
        let mut a = Vocabulary::new();
        a.merge_terms(["lizard", "gecko"], KeywordOrigin::Consensus);
        let mut b = Vocabulary::new();
        b.merge_terms(["gecko", "lizard"], KeywordOrigin::Consensus);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_save_and_load_preserve_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocabulary.json");
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_entries([VocabularyEntry {
            keyword: "gene flow".to_string(),
            agreement_count: 3,
            frequency: 7,
            origin: KeywordOrigin::Consensus,
        }]);
        vocabulary.merge_terms(["europe"], KeywordOrigin::AlternateList);

        vocabulary.save(&path).unwrap();
        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded, vocabulary);
        assert!(loaded.contains("Europe"));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();
        let result = Vocabulary::load(file.path());
        assert!(matches!(result, Err(VocabularyError::Format { .. })));
    }

    #[test]
    fn test_load_deduplicates_hand_edited_files() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"keyword":"lizard","agreement_count":0,"frequency":0,"origin":"keyword_file"}},
                {{"keyword":"Lizards","agreement_count":0,"frequency":0,"origin":"keyword_file"}}]"#
        )
        .unwrap();
        let loaded = Vocabulary::load(file.path()).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_load_keyword_file_skips_comments_and_blanks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# reptiles").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "gecko").unwrap();
        writeln!(file, "  skink  ").unwrap();

        let terms = load_keyword_file(file.path()).unwrap();
        assert_eq!(terms, vec!["gecko", "skink"]);
    }

    #[test]
    fn test_load_keyword_file_missing_file_errors() {
        let result = load_keyword_file(Path::new("/nonexistent/keywords.txt"));
        assert!(matches!(result, Err(VocabularyError::Read { .. })));
    }
}
