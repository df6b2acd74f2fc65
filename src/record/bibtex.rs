//! BibTeX reading and writing for bibliographic records.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use super::Record;

#[allow(clippy::expect_used)]
static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:18|19|20)\d{2}\b").expect("bibtex year regex is valid"));
#[allow(clippy::expect_used)]
static AUTHOR_SPLIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").expect("bibtex author split regex is valid"));
#[allow(clippy::expect_used)]
static DOI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"10\.\d{4,9}/\S+").expect("bibtex doi regex is valid"));
#[allow(clippy::expect_used)]
static LATEX_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([&%_$#])").expect("bibtex escape regex is valid"));

const SUPPORTED_TYPES: [&str; 13] = [
    "article",
    "book",
    "inbook",
    "incollection",
    "inproceedings",
    "conference",
    "phdthesis",
    "mastersthesis",
    "thesis",
    "techreport",
    "report",
    "unpublished",
    "misc",
];
const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// Fields holding the user's own tags in reference-manager exports.
const TAG_FIELDS: [&str; 2] = ["mendeley-tags", "tags"];

/// Field written with generated tags on export.
pub const GENERATED_TAGS_FIELD: &str = "aparts-tags";

/// Result of importing a BibTeX file.
#[derive(Debug, Clone, Default)]
pub struct BibtexImport {
    pub records: Vec<Record>,
    /// Actionable skip messages for malformed or unsupported entries.
    pub skipped: Vec<String>,
    /// Total candidate `@...{...}` segments discovered.
    pub total_found: usize,
}

/// Parses every supported entry in `input`.
#[must_use]
#[instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_bibtex_records(input: &str) -> BibtexImport {
    let mut import = BibtexImport::default();
    let segments = segment_entries(input);
    import.total_found = segments.len();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for raw_entry in &segments {
        match parse_entry(raw_entry) {
            EntryOutcome::Parsed(record) => {
                if seen_keys.insert(record.identifier.clone()) {
                    import.records.push(*record);
                } else {
                    import.skipped.push(format!(
                        "What: duplicate citation key `{}`. Why: record identifiers must be unique. Fix: rename one of the entries.",
                        record.identifier
                    ));
                }
            }
            EntryOutcome::Ignore => {}
            EntryOutcome::Skip(message) => import.skipped.push(message),
        }
    }

    debug!(
        records = import.records.len(),
        skipped = import.skipped.len(),
        "bibtex parsed"
    );
    import
}

#[derive(Debug)]
enum EntryOutcome {
    Parsed(Box<Record>),
    Ignore,
    Skip(String),
}

/// Splits input into `@type{...}` segments, recovering from unbalanced braces
/// at the next line-initial `@`.
fn segment_entries(input: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || chars[j].1 != '{' {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut depth = 0usize;
        let mut escape = false;
        let mut found_end = None;
        for (k, (_, ch)) in chars.iter().enumerate().skip(j) {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        found_end = Some(k);
                        break;
                    }
                }
                _ => {}
            }
        }

        if let Some(end_index) = found_end {
            let end_exclusive = chars.get(end_index + 1).map_or(input.len(), |(pos, _)| *pos);
            entries.push(input[start..end_exclusive].trim().to_string());
            i = end_index + 1;
            continue;
        }

        let recovery = (i + 1..chars.len())
            .find(|&k| chars[k].1 == '@' && matches!(chars[k - 1].1, '\n' | '\r'));
        if let Some(recovery) = recovery {
            entries.push(input[start..chars[recovery].0].trim().to_string());
            i = recovery;
        } else {
            entries.push(input[start..].trim().to_string());
            break;
        }
    }

    entries
}

fn parse_entry(raw_entry: &str) -> EntryOutcome {
    let trimmed = raw_entry.trim();
    let Some(after_at) = trimmed.strip_prefix('@') else {
        return EntryOutcome::Skip(
            "What: malformed BibTeX entry. Why: missing '@type{...}' prefix. Fix: start entries with @article{key, ...}."
                .to_string(),
        );
    };
    let Some(brace_pos) = after_at.find('{') else {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: missing opening '{{' after entry type. Fix: use `@type{{key, field = value}}`.",
            preview(trimmed)
        ));
    };

    let entry_type = after_at[..brace_pos].trim().to_ascii_lowercase();
    if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
        return EntryOutcome::Ignore;
    }
    if !SUPPORTED_TYPES.contains(&entry_type.as_str()) {
        return EntryOutcome::Skip(format!(
            "What: unsupported BibTeX entry type `@{entry_type}`. Why: only bibliographic entry types carry abstracts. Fix: change the entry type or remove the entry."
        ));
    }

    if !trimmed.ends_with('}') {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: unbalanced braces (entry never closed). Fix: ensure each '{{' has a matching '}}'.",
            preview(trimmed)
        ));
    }
    let body = &after_at[brace_pos + 1..after_at.len() - 1];
    let (key_raw, fields_raw) = body.split_once(',').unwrap_or((body, ""));

    let key = key_raw.trim();
    if key.is_empty() {
        return EntryOutcome::Skip(format!(
            "What: malformed BibTeX entry `{}`. Why: empty citation key. Fix: provide a non-empty key before the first comma.",
            preview(trimmed)
        ));
    }

    let fields = match parse_fields(fields_raw) {
        Ok(fields) => fields,
        Err(reason) => {
            return EntryOutcome::Skip(format!(
                "What: malformed BibTeX field assignment in `{}`. Why: {reason}. Fix: use `field = {{value}}` or `field = \"value\"` with commas between fields.",
                preview(trimmed)
            ));
        }
    };

    let text_field = |name: &str| {
        fields
            .get(name)
            .map(|value| clean_value(value))
            .filter(|value| !value.is_empty())
    };

    let existing_tags: BTreeSet<String> = TAG_FIELDS
        .iter()
        .filter_map(|name| fields.get(*name))
        .flat_map(|value| split_list(value))
        .collect();

    EntryOutcome::Parsed(Box::new(Record {
        identifier: key.to_string(),
        entry_type,
        title: text_field("title"),
        abstract_text: text_field("abstract"),
        authors: fields
            .get("author")
            .map(|value| normalize_authors(value))
            .filter(|value| !value.is_empty()),
        year: fields.get("year").and_then(|value| normalize_year(value)),
        doi: fields.get("doi").and_then(|value| normalize_doi(value)),
        author_keywords: fields
            .get("keywords")
            .map(|value| split_list(value))
            .unwrap_or_default(),
        existing_tags,
        source_path: fields.get("file").and_then(|value| attached_pdf(value)),
        generated_tags: BTreeSet::new(),
        raw: trimmed.to_string(),
    }))
}

fn parse_fields(input: &str) -> Result<BTreeMap<String, String>, String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth == 0 => in_quotes = !in_quotes,
            '{' if !in_quotes => depth += 1,
            '}' if !in_quotes => {
                if depth == 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
                depth -= 1;
            }
            ',' if !in_quotes && depth == 0 => {
                let segment = current.trim();
                if !segment.is_empty() {
                    pairs.push(segment.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }
    let tail = current.trim();
    if !tail.is_empty() {
        pairs.push(tail.to_string());
    }

    let mut fields = BTreeMap::new();
    for pair in pairs {
        let Some((name, value_raw)) = pair.split_once('=') else {
            return Err(format!("missing '=' in field segment `{}`", preview(&pair)));
        };
        let field_name = name.trim().to_ascii_lowercase();
        if field_name.is_empty() {
            return Err("empty field name".to_string());
        }
        let value = strip_bibtex_value(value_raw)
            .ok_or_else(|| format!("invalid value in field `{field_name}`"))?;
        // First value wins, as in BibTeX itself.
        fields.entry(field_name).or_insert(value);
    }

    Ok(fields)
}

fn strip_bibtex_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() >= 2
        && ((trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('"') && trimmed.ends_with('"')))
    {
        return Some(trimmed[1..trimmed.len() - 1].trim().to_string());
    }
    Some(trimmed.to_string())
}

/// Drops protective braces, unescapes LaTeX specials and collapses whitespace.
fn clean_value(value: &str) -> String {
    let unbraced: String = value.chars().filter(|c| *c != '{' && *c != '}').collect();
    let unescaped = LATEX_ESCAPE.replace_all(&unbraced, "$1");
    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits keyword and tag lists on `,` and `;`.
fn split_list(value: &str) -> Vec<String> {
    clean_value(value)
        .split([',', ';'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_authors(value: &str) -> String {
    AUTHOR_SPLIT_PATTERN
        .split(&clean_value(value))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_year(value: &str) -> Option<u16> {
    YEAR_PATTERN
        .find(value)
        .and_then(|m| m.as_str().parse::<u16>().ok())
}

fn normalize_doi(value: &str) -> Option<String> {
    DOI_PATTERN
        .find(&clean_value(value))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

/// Finds the attached PDF in a Zotero/Mendeley/JabRef `file` field.
///
/// Formats seen in the wild: `path.pdf`, `:path.pdf:pdf` and
/// `Full Text:path.pdf:application/pdf`, several joined by `;`.
fn attached_pdf(value: &str) -> Option<PathBuf> {
    value.split(';').find_map(|attachment| {
        attachment
            .split(':')
            .map(str::trim)
            .find(|part| part.to_ascii_lowercase().ends_with(".pdf"))
            .map(|part| PathBuf::from(part.replace("\\:", ":")))
    })
}

/// Writes records as BibTeX.
///
/// Imported entries are written as imported, with generated tags added in an
/// extra field; records built in code are written from their fields.
#[must_use]
pub fn write_bibtex(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        let entry = if record.raw.is_empty() {
            synthesize_entry(record)
        } else {
            record.raw.clone()
        };
        out.push_str(&with_generated_tags(&entry, &record.generated_tags));
        out.push_str("\n\n");
    }
    out
}

fn synthesize_entry(record: &Record) -> String {
    let mut entry = format!("@{}{{{}", record.entry_type, record.identifier);
    let mut field = |name: &str, value: &str| {
        let _ = write!(entry, ",\n  {name} = {{{value}}}");
    };
    if let Some(title) = &record.title {
        field("title", title);
    }
    if let Some(authors) = &record.authors {
        field("author", &authors.replace(", ", " and "));
    }
    if let Some(year) = record.year {
        field("year", &year.to_string());
    }
    if let Some(doi) = &record.doi {
        field("doi", doi);
    }
    if let Some(abstract_text) = &record.abstract_text {
        field("abstract", abstract_text);
    }
    if !record.author_keywords.is_empty() {
        field("keywords", &record.author_keywords.join(", "));
    }
    if !record.existing_tags.is_empty() {
        field(
            "mendeley-tags",
            &record.existing_tags.iter().cloned().collect::<Vec<_>>().join(","),
        );
    }
    entry.push_str("\n}");
    entry
}

fn with_generated_tags(entry: &str, tags: &BTreeSet<String>) -> String {
    if tags.is_empty() {
        return entry.to_string();
    }
    let body = entry.trim_end();
    let Some(open) = body.strip_suffix('}') else {
        return entry.to_string();
    };
    let joined = tags.iter().cloned().collect::<Vec<_>>().join(", ");
    format!(
        "{},\n  {GENERATED_TAGS_FIELD} = {{{joined}}}\n}}",
        open.trim_end().trim_end_matches(',')
    )
}

fn preview(input: &str) -> String {
    const MAX: usize = 80;
    if input.chars().count() <= MAX {
        return input.to_string();
    }
    let shortened: String = input.chars().take(MAX).collect();
    format!("{shortened}...")
}
