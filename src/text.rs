//! Text hygiene shared by the keyword extractors and the tagging engine.
//!
//! PDF extraction leaves ligatures, soft hyphens, zero-width characters and
//! words split across line breaks in its output. Everything downstream works
//! on text that went through [`clean_text`] first.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use stop_words::{LANGUAGE, get};

#[allow(clippy::expect_used)]
static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['\-][\p{L}\p{N}]+)*").expect("word regex is valid")
});
#[allow(clippy::expect_used)]
static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?;]+(?:\s+|$)|\n[ \t]*\n").expect("sentence break regex is valid")
});
#[allow(clippy::expect_used)]
static HYPHEN_LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{L})-[ \t]*\r?\n[ \t]*(\p{Ll})").expect("hyphen line break regex is valid")
});

/// English stop words, lowercased.
pub static STOP_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    get(LANGUAGE::English)
        .into_iter()
        .map(|word| word.to_lowercase())
        .collect()
});

/// Words that end in `s` but are already singular.
const SINGULAR_EXCEPTIONS: [&str; 10] = [
    "bias", "gas", "lens", "chaos", "atlas", "canvas", "species", "series", "news", "biomass",
];

/// Removes PDF decoding artifacts and control characters.
///
/// Newlines are kept so heading detection still sees line structure.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let joined = HYPHEN_LINE_BREAK.replace_all(raw, "$1$2");
    let mut out = String::with_capacity(joined.len());

    for ch in joined.chars() {
        match ch {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{FFFD}' | '\r' => {}
            '\u{00A0}' | '\u{2002}'..='\u{2009}' | '\u{202F}' | '\t' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2010}'..='\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push(' '),
            '\n' => out.push('\n'),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    out
}

/// A single word token inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Lowercased form.
    pub text: String,
    /// Form as it appeared in the text.
    pub surface: String,
    /// Whether the word is an English stop word.
    pub is_stop: bool,
    /// Punctuation other than whitespace or hyphens separates this word from the previous one.
    pub break_before: bool,
}

impl Word {
    /// Content words carry meaning: not a stop word, at least two characters, not purely numeric.
    #[must_use]
    pub fn is_content(&self) -> bool {
        !self.is_stop
            && self.text.chars().count() >= 2
            && !self.text.chars().all(|c| c.is_numeric() || c == '-' || c == '\'')
    }
}

/// Splits cleaned text into sentences of word tokens.
#[must_use]
pub fn sentences(cleaned: &str) -> Vec<Vec<Word>> {
    SENTENCE_BREAK
        .split(cleaned)
        .map(tokenize_sentence)
        .filter(|words| !words.is_empty())
        .collect()
}

fn tokenize_sentence(sentence: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut last_end = 0usize;

    for found in WORD_PATTERN.find_iter(sentence) {
        let gap = &sentence[last_end..found.start()];
        let break_before = !words.is_empty()
            && gap
                .chars()
                .any(|c| !c.is_whitespace() && c != '-' && c != '\'');
        let text = found.as_str().to_lowercase();
        let is_stop = STOP_WORDS.contains(&text);
        words.push(Word {
            text,
            surface: found.as_str().to_string(),
            is_stop,
            break_before,
        });
        last_end = found.end();
    }

    words
}

/// Counts content words in raw text.
#[must_use]
pub fn content_word_count(raw: &str) -> usize {
    sentences(&clean_text(raw))
        .iter()
        .flatten()
        .filter(|word| word.is_content())
        .count()
}

/// Folds a single lowercase word to its singular form.
///
/// A heuristic rather than a lemmatizer; it only has to map the singular and
/// plural spellings of the same term onto one key.
#[must_use]
pub fn singularize(word: &str) -> String {
    let len = word.chars().count();
    if len <= 3 || SINGULAR_EXCEPTIONS.contains(&word) {
        return word.to_string();
    }
    if word.ends_with("ics")
        || word.ends_with("ss")
        || word.ends_with("us")
        || word.ends_with("is")
    {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies")
        && len > 4
    {
        return format!("{stem}y");
    }
    for suffix in ["sses", "ches", "shes", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }
    word.to_string()
}

/// Normalizes a keyphrase: lowercase, punctuation stripped, whitespace
/// collapsed, every word singularized.
///
/// Idempotent: normalizing an already-normalized phrase returns it unchanged.
#[must_use]
pub fn normalize_phrase(phrase: &str) -> String {
    let lowered = phrase.to_lowercase();
    let spaced: String = lowered
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
}
