//! Document discovery and text extraction.
//!
//! Text extraction sits behind the [`TextSource`] trait so the tagging run
//! never depends on a particular PDF library. [`AutoTextSource`] dispatches
//! on file extension to the bundled PDF and plain-text sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Extensions collected from a documents folder.
pub const DOCUMENT_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

/// Errors from turning a document into text.
#[derive(Debug, Error)]
pub enum DecodingError {
    /// The file could not be read.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its content could not be decoded.
    #[error("cannot decode '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// No source handles this file type.
    #[error("unsupported document type: '{path}'")]
    Unsupported { path: PathBuf },
}

impl DecodingError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produces plain text from a document file.
pub trait TextSource: Send + Sync {
    /// Extracts the full text of the document at `path`.
    ///
    /// # Errors
    /// Returns [`DecodingError`] when the file cannot be read or decoded.
    fn extract_text(&self, path: &Path) -> Result<String, DecodingError>;
}

/// PDF text extraction with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextSource;

impl TextSource for PdfTextSource {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn extract_text(&self, path: &Path) -> Result<String, DecodingError> {
        if !path.exists() {
            return Err(DecodingError::io(
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        let document = lopdf::Document::load(path).map_err(|err| DecodingError::Malformed {
            path: path.to_path_buf(),
            reason: format!("lopdf failed to open: {err}"),
        })?;
        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        if pages.is_empty() {
            warn!("pdf has no pages");
            return Ok(String::new());
        }

        let text = document
            .extract_text(&pages)
            .map_err(|err| DecodingError::Malformed {
                path: path.to_path_buf(),
                reason: format!("lopdf failed to extract text: {err}"),
            })?;
        debug!(pages = pages.len(), chars = text.len(), "pdf text extracted");
        Ok(warn_if_blank(path, text))
    }
}

/// UTF-8 plain-text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, DecodingError> {
        let bytes = std::fs::read(path).map_err(|source| DecodingError::io(path, source))?;
        let text = String::from_utf8(bytes).map_err(|err| DecodingError::Malformed {
            path: path.to_path_buf(),
            reason: format!("invalid UTF-8 at byte {}", err.utf8_error().valid_up_to()),
        })?;
        Ok(warn_if_blank(path, text))
    }
}

/// Blank text is not an error: the document is tagged with nothing.
fn warn_if_blank(path: &Path, text: String) -> String {
    if text.trim().is_empty() {
        warn!(path = %path.display(), "no extractable text; a scanned PDF may need OCR");
    }
    text
}

/// Chooses a source by file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoTextSource {
    pdf: PdfTextSource,
    plain: PlainTextSource,
}

impl TextSource for AutoTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, DecodingError> {
        match extension(path).as_deref() {
            Some("pdf") => self.pdf.extract_text(path),
            Some("txt") => self.plain.extract_text(path),
            _ => Err(DecodingError::Unsupported {
                path: path.to_path_buf(),
            }),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// A document to tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocumentRef {
    /// Path relative to the documents folder, without extension, `/`-separated.
    pub id: String,
    pub path: PathBuf,
}

impl DocumentRef {
    /// Builds a reference whose id is `path` relative to `root`.
    #[must_use]
    pub fn new(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let without_extension = relative.with_extension("");
        let id = without_extension
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            id,
            path: path.to_path_buf(),
        }
    }

    /// File stem, used to match records by their attached file.
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|stem| stem.to_str())
    }
}

/// Recursively lists PDF and text documents under `folder`, sorted by id.
///
/// When two files share an id (`paper.pdf` and `paper.txt`) the first in
/// path order wins.
///
/// # Errors
/// Returns [`DecodingError::Io`] if a directory cannot be read.
#[instrument(fields(folder = %folder.display()))]
pub fn collect_documents(folder: &Path) -> Result<Vec<DocumentRef>, DecodingError> {
    let mut paths = Vec::new();
    let mut pending = vec![folder.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|source| DecodingError::io(&dir, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| DecodingError::io(&dir, source))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|source| DecodingError::io(&path, source))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if extension(&path)
                .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
            {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut by_id: BTreeMap<String, DocumentRef> = BTreeMap::new();
    for path in paths {
        let document = DocumentRef::new(folder, &path);
        if let Some(existing) = by_id.get(&document.id) {
            warn!(
                id = %document.id,
                kept = %existing.path.display(),
                skipped = %path.display(),
                "duplicate document id"
            );
            continue;
        }
        by_id.insert(document.id.clone(), document);
    }

    debug!(documents = by_id.len(), "documents collected");
    Ok(by_id.into_values().collect())
}
