//! CSV and JSON lines exports of vocabularies and tagging results.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::pipeline::record_matches;
use crate::record::Record;
use crate::tagging::DocumentTags;
use crate::tracker::DocumentFailure;
use crate::vocabulary::Vocabulary;

/// File names written by a tagging run into its output directory.
pub const TAGS_FILE: &str = "tags.csv";
pub const DOCUMENTS_FILE: &str = "documents.csv";
pub const TAG_COUNTS_FILE: &str = "tag_counts.csv";
pub const FAILURES_FILE: &str = "failures.csv";
pub const RECORDS_FILE: &str = "records.jsonl";

/// Errors from writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize record for '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize)]
struct TagRow<'a> {
    document_id: &'a str,
    tag: &'a str,
    score: u32,
}

#[derive(Serialize)]
struct VocabularyRow<'a> {
    normalized_form: &'a str,
    agreement_count: usize,
    frequency: usize,
    origin: &'a str,
}

#[derive(Serialize)]
struct TagCountRow<'a> {
    tag: &'a str,
    documents: usize,
}

#[derive(Serialize)]
struct FailureRow<'a> {
    document_id: &'a str,
    path: String,
    kind: &'a str,
    message: &'a str,
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, ExportError> {
    csv::Writer::from_path(path).map_err(|source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, ExportError> {
    let csv_error = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv_writer(path)?;
    let mut written = 0;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
        written += 1;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(written)
}

/// Writes one `document_id,tag,score` row per tag assignment.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(results), fields(path = %path.display()))]
pub fn write_tag_triples(path: &Path, results: &[DocumentTags]) -> Result<usize, ExportError> {
    let rows = results.iter().flat_map(|result| {
        result.tags.iter().map(|tag| TagRow {
            document_id: &tag.document_id,
            tag: &tag.keyword,
            score: tag.score,
        })
    });
    let written = write_rows(path, rows)?;
    debug!(rows = written, "tag triples written");
    Ok(written)
}

/// Writes the vocabulary as `normalized_form,agreement_count,frequency,origin`.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(vocabulary), fields(path = %path.display(), terms = vocabulary.len()))]
pub fn write_vocabulary_csv(path: &Path, vocabulary: &Vocabulary) -> Result<usize, ExportError> {
    write_rows(
        path,
        vocabulary.entries().iter().map(|entry| VocabularyRow {
            normalized_form: &entry.keyword,
            agreement_count: entry.agreement_count,
            frequency: entry.frequency,
            origin: entry.origin.as_str(),
        }),
    )
}

/// Writes the wide document table: id, title, DOI, then one column per tag
/// holding the document's score for it (empty when untagged).
///
/// Title and DOI come from the first record matching the document.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(results, records), fields(path = %path.display(), documents = results.len()))]
pub fn write_document_table(
    path: &Path,
    results: &[DocumentTags],
    records: &[Record],
) -> Result<usize, ExportError> {
    let csv_error = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let columns: BTreeSet<&str> = results.iter().flat_map(DocumentTags::keywords).collect();
    let mut writer = csv_writer(path)?;
    let mut header = vec!["document_id", "title", "doi"];
    header.extend(columns.iter().copied());
    writer.write_record(&header).map_err(csv_error)?;

    for result in results {
        let record = records
            .iter()
            .find(|record| record_matches(record, &result.document_id));
        let scores: BTreeMap<&str, u32> = result
            .tags
            .iter()
            .map(|tag| (tag.keyword.as_str(), tag.score))
            .collect();

        let mut row = vec![
            result.document_id.clone(),
            record.and_then(|r| r.title.clone()).unwrap_or_default(),
            record.and_then(|r| r.doi.clone()).unwrap_or_default(),
        ];
        row.extend(
            columns
                .iter()
                .map(|column| scores.get(column).map(u32::to_string).unwrap_or_default()),
        );
        writer.write_record(&row).map_err(csv_error)?;
    }

    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(results.len())
}

/// Writes `tag,documents` rows, most frequent tag first.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(counts), fields(path = %path.display(), tags = counts.len()))]
pub fn write_tag_counts(
    path: &Path,
    counts: &BTreeMap<String, usize>,
) -> Result<usize, ExportError> {
    let mut ordered: Vec<(&String, &usize)> = counts.iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    write_rows(
        path,
        ordered.into_iter().map(|(tag, documents)| TagCountRow {
            tag,
            documents: *documents,
        }),
    )
}

/// Writes `document_id,path,kind,message` rows.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(failures), fields(path = %path.display(), failures = failures.len()))]
pub fn write_failures(path: &Path, failures: &[DocumentFailure]) -> Result<usize, ExportError> {
    write_rows(
        path,
        failures.iter().map(|failure| FailureRow {
            document_id: &failure.document_id,
            path: failure.path.display().to_string(),
            kind: failure.kind.as_str(),
            message: &failure.message,
        }),
    )
}

/// Writes records as JSON lines, one record per line.
///
/// # Errors
/// Returns [`ExportError`] if the file cannot be written.
#[instrument(skip(records), fields(path = %path.display(), records = records.len()))]
pub fn write_records_jsonl(path: &Path, records: &[Record]) -> Result<usize, ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record).map_err(|source| ExportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        out.write_all(b"\n").map_err(io_error)?;
    }
    out.flush().map_err(io_error)?;
    Ok(records.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tagging::TagAssignment;
    use crate::tracker::FailureKind;
    use crate::vocabulary::KeywordOrigin;
    use tempfile::TempDir;

    fn tags(document_id: &str, scored: &[(&str, u32)]) -> DocumentTags {
        DocumentTags {
            document_id: document_id.to_string(),
            tags: scored
                .iter()
                .map(|(keyword, score)| TagAssignment {
                    document_id: document_id.to_string(),
                    keyword: (*keyword).to_string(),
                    score: *score,
                })
                .collect(),
            fingerprint: "f".to_string(),
        }
    }

    #[test]
    fn test_write_tag_triples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TAGS_FILE);
        let results = vec![
            tags("doe2020", &[("gene flow", 6), ("lizard", 4)]),
            tags("roe2021", &[("phylogeny", 3)]),
        ];
        assert_eq!(write_tag_triples(&path, &results).unwrap(), 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "document_id,tag,score\ndoe2020,gene flow,6\ndoe2020,lizard,4\nroe2021,phylogeny,3\n"
        );
    }

    #[test]
    fn test_write_vocabulary_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocabulary.csv");
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(["gene flow"], KeywordOrigin::AuthorKeyword);

        write_vocabulary_csv(&path, &vocabulary).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "normalized_form,agreement_count,frequency,origin\ngene flow,0,0,author_keyword\n"
        );
    }

    #[test]
    fn test_write_document_table_has_one_column_per_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DOCUMENTS_FILE);
        let mut record = Record::new("doe2020", Some("Island lizards"), None);
        record.doi = Some("10.1234/x".to_string());
        let results = vec![
            tags("doe2020", &[("lizard", 4)]),
            tags("roe2021", &[("gene flow", 2)]),
        ];

        write_document_table(&path, &results, &[record]).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, vec!["document_id", "title", "doi", "gene flow", "lizard"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(&rows[0][1], "Island lizards");
        assert_eq!(&rows[0][2], "10.1234/x");
        assert_eq!(&rows[0][3], "");
        assert_eq!(&rows[0][4], "4");
        assert_eq!(&rows[1][1], "");
        assert_eq!(&rows[1][3], "2");
    }

    #[test]
    fn test_write_tag_counts_orders_by_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TAG_COUNTS_FILE);
        let counts = BTreeMap::from([("lizard".to_string(), 1), ("gene flow".to_string(), 3)]);

        write_tag_counts(&path, &counts).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "tag,documents\ngene flow,3\nlizard,1\n");
    }

    #[test]
    fn test_write_failures_with_header_only_when_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FAILURES_FILE);
        write_failures(&path, &[]).unwrap();
        // serde-driven writers emit the header with the first row
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        write_failures(
            &path,
            &[DocumentFailure {
                document_id: "scan".to_string(),
                path: PathBuf::from("docs/scan.pdf"),
                kind: FailureKind::Decoding,
                message: "no extractable text".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "document_id,path,kind,message\nscan,docs/scan.pdf,decoding,no extractable text\n"
        );
    }

    #[test]
    fn test_write_records_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RECORDS_FILE);
        let mut record = Record::new("doe2020", Some("Island lizards"), Some("Gene flow."));
        record.generated_tags.insert("gene flow".to_string());

        write_records_jsonl(&path, &[record.clone(), Record::new("roe2021", None, None)]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Record = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["abstract"], "Gene flow.");
    }
}
