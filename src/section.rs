//! Heading-based segmentation of document text into labelled sections.
//!
//! A heading is a line consisting only of a recognised section name,
//! optionally numbered (`2.`, `2.1`, `II.`) and optionally followed by `:` or
//! `.`. Text before the first heading is [`SectionLabel::Other`]; a document
//! without recognised headings is one `Other` section. Segmentation itself
//! never fails: patterns are compiled once, when the segmenter is built.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, trace};

/// Errors from compiling heading patterns.
#[derive(Debug, Error)]
pub enum SectionError {
    #[error("invalid heading pattern for {label}: {source}")]
    InvalidPattern {
        label: SectionLabel,
        #[source]
        source: regex::Error,
    },
}

/// Section of an academic paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLabel {
    Abstract,
    Introduction,
    Methods,
    Results,
    Discussion,
    References,
    Other,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 7] = [
        Self::Abstract,
        Self::Introduction,
        Self::Methods,
        Self::Results,
        Self::Discussion,
        Self::References,
        Self::Other,
    ];

    /// Labels that can be introduced by a heading.
    pub const HEADINGS: [SectionLabel; 6] = [
        Self::Abstract,
        Self::Introduction,
        Self::Methods,
        Self::Results,
        Self::Discussion,
        Self::References,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abstract => "abstract",
            Self::Introduction => "introduction",
            Self::Methods => "methods",
            Self::Results => "results",
            Self::Discussion => "discussion",
            Self::References => "references",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SectionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == key)
            .ok_or_else(|| format!("unknown section label: {s}"))
    }
}

/// A labelled byte range of the cleaned document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: SectionLabel,
    pub span: Range<usize>,
    pub weight: u32,
}

/// Weight applied to matches found in each section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionWeights(BTreeMap<SectionLabel, u32>);

impl Default for SectionWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (SectionLabel::Abstract, 4),
            (SectionLabel::Introduction, 1),
            (SectionLabel::Methods, 2),
            (SectionLabel::Results, 2),
            (SectionLabel::Discussion, 3),
            (SectionLabel::References, 0),
            (SectionLabel::Other, 0),
        ]))
    }
}

impl SectionWeights {
    /// Every section weighs `weight`.
    #[must_use]
    pub fn uniform(weight: u32) -> Self {
        Self(SectionLabel::ALL.into_iter().map(|label| (label, weight)).collect())
    }

    /// Weight for `label`; unlisted labels weigh 0.
    #[must_use]
    pub fn get(&self, label: SectionLabel) -> u32 {
        self.0.get(&label).copied().unwrap_or(0)
    }

    pub fn set(&mut self, label: SectionLabel, weight: u32) {
        self.0.insert(label, weight);
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionLabel, u32)> + '_ {
        self.0.iter().map(|(label, weight)| (*label, *weight))
    }
}

/// Case-insensitive heading alternatives per label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPatterns(BTreeMap<SectionLabel, Vec<String>>);

impl Default for SectionPatterns {
    fn default() -> Self {
        let owned = |patterns: &[&str]| patterns.iter().map(|p| (*p).to_string()).collect();
        Self(BTreeMap::from([
            (SectionLabel::Abstract, owned(&["abstract", "summary"])),
            (SectionLabel::Introduction, owned(&["introduction", "background"])),
            (
                SectionLabel::Methods,
                owned(&["methods?", "materials and methods", "methodology"]),
            ),
            (SectionLabel::Results, owned(&["results", "findings"])),
            (SectionLabel::Discussion, owned(&["discussion", "conclusions?"])),
            (
                SectionLabel::References,
                owned(&["references", "bibliography", "literature cited"]),
            ),
        ]))
    }
}

impl SectionPatterns {
    /// Replaces the alternatives for `label`.
    pub fn set(&mut self, label: SectionLabel, patterns: Vec<String>) {
        self.0.insert(label, patterns);
    }

    #[must_use]
    pub fn get(&self, label: SectionLabel) -> &[String] {
        self.0.get(&label).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionLabel, &[String])> + '_ {
        self.0.iter().map(|(label, patterns)| (*label, patterns.as_slice()))
    }
}

/// Compiled heading recognisers.
#[derive(Debug, Clone)]
pub struct SectionSegmenter {
    headings: Vec<(SectionLabel, Regex)>,
}

impl Default for SectionSegmenter {
    fn default() -> Self {
        // Built-in patterns are known to compile.
        Self::new(&SectionPatterns::default()).unwrap_or(Self { headings: Vec::new() })
    }
}

impl SectionSegmenter {
    /// Compiles one recogniser per label with at least one alternative.
    ///
    /// # Errors
    /// Returns [`SectionError::InvalidPattern`] for a pattern that is not a valid regex.
    pub fn new(patterns: &SectionPatterns) -> Result<Self, SectionError> {
        let mut headings = Vec::new();
        for label in SectionLabel::HEADINGS {
            let alternatives = patterns.get(label);
            if alternatives.is_empty() {
                continue;
            }
            // Each alternative is checked alone so the error names the culprit.
            for alternative in alternatives {
                Regex::new(alternative)
                    .map_err(|source| SectionError::InvalidPattern { label, source })?;
            }
            let pattern = format!(
                r"^[ \t]*(?:(?:\d+(?:\.\d+)*|[ivxlc]+)[.)]?[ \t]+)?(?:{})[ \t]*[:.]?[ \t]*$",
                alternatives
                    .iter()
                    .map(|alternative| format!("(?:{alternative})"))
                    .collect::<Vec<_>>()
                    .join("|")
            );
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| SectionError::InvalidPattern { label, source })?;
            headings.push((label, regex));
        }
        Ok(Self { headings })
    }

    fn heading_label(&self, line: &str) -> Option<SectionLabel> {
        self.headings
            .iter()
            .find(|(_, regex)| regex.is_match(line))
            .map(|(label, _)| *label)
    }

    /// Splits `text` into contiguous sections covering the whole text.
    ///
    /// Heading lines belong to the section they open. Always returns at least
    /// one section.
    #[must_use]
    #[instrument(skip(self, text, weights), fields(text_len = text.len()))]
    pub fn segment(&self, text: &str, weights: &SectionWeights) -> Vec<Section> {
        let mut boundaries: Vec<(usize, SectionLabel)> = vec![(0, SectionLabel::Other)];

        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            if let Some(label) = self.heading_label(line.trim_end_matches(['\n', '\r'])) {
                trace!(%label, offset, "heading found");
                boundaries.push((offset, label));
            }
            offset += line.len();
        }

        let mut sections = Vec::with_capacity(boundaries.len());
        for (i, &(start, label)) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).map_or(text.len(), |&(next, _)| next);
            if end > start {
                sections.push(Section {
                    label,
                    span: start..end,
                    weight: weights.get(label),
                });
            }
        }

        if sections.is_empty() {
            sections.push(Section {
                label: SectionLabel::Other,
                span: 0..text.len(),
                weight: weights.get(SectionLabel::Other),
            });
        }
        sections
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn labels(sections: &[Section]) -> Vec<SectionLabel> {
        sections.iter().map(|section| section.label).collect()
    }

    const PAPER: &str = "Island lizards\nJ. Doe\n\nAbstract\nGene flow shapes adaptation.\n\
        1. Introduction\nLizards colonise islands.\n2 Methods:\nWe sampled twelve islands.\n\
        Results\nGene flow was high.\nIV. Discussion\nGene flow limits divergence.\nReferences\nDoe J. 2020.\n";

    #[test]
    fn test_segment_recognises_numbered_headings() {
        let sections = SectionSegmenter::default().segment(PAPER, &SectionWeights::default());
        assert_eq!(
            labels(&sections),
            vec![
                SectionLabel::Other,
                SectionLabel::Abstract,
                SectionLabel::Introduction,
                SectionLabel::Methods,
                SectionLabel::Results,
                SectionLabel::Discussion,
                SectionLabel::References,
            ]
        );
        assert_eq!(sections[1].weight, 4);
        assert_eq!(sections[5].weight, 3);
    }

    #[test]
    fn test_sections_cover_text_contiguously() {
        let sections = SectionSegmenter::default().segment(PAPER, &SectionWeights::default());
        assert_eq!(sections[0].span.start, 0);
        assert_eq!(sections.last().unwrap().span.end, PAPER.len());
        for pair in sections.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
        assert!(PAPER[sections[1].span.clone()].starts_with("Abstract"));
    }

    #[test]
    fn test_missing_headings_collapse_to_other() {
        let text = "Gene flow in island lizards.\nNo headings here.";
        let sections = SectionSegmenter::default().segment(text, &SectionWeights::default());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].label, SectionLabel::Other);
        assert_eq!(sections[0].span, 0..text.len());
    }

    #[test]
    fn test_empty_text_yields_one_empty_section() {
        let sections = SectionSegmenter::default().segment("", &SectionWeights::default());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].span, 0..0);
    }

    #[test]
    fn test_duplicate_headings_start_new_sections() {
        let text = "Results\nfirst\nDiscussion\nsecond\nResults\nthird\n";
        let sections = SectionSegmenter::default().segment(text, &SectionWeights::default());
        assert_eq!(
            labels(&sections),
            vec![SectionLabel::Results, SectionLabel::Discussion, SectionLabel::Results]
        );
    }

    #[test]
    fn test_heading_words_inside_sentences_are_ignored() {
        let text = "The results of the discussion were inconclusive.\n";
        let sections = SectionSegmenter::default().segment(text, &SectionWeights::default());
        assert_eq!(labels(&sections), vec![SectionLabel::Other]);
    }

    #[test]
    fn test_custom_patterns_replace_defaults() {
        let mut patterns = SectionPatterns::default();
        patterns.set(SectionLabel::Methods, vec!["study area".to_string()]);
        let segmenter = SectionSegmenter::new(&patterns).unwrap();
        let text = "Methods\nignored\nStudy Area\nsampled\n";
        let sections = segmenter.segment(text, &SectionWeights::default());
        assert_eq!(labels(&sections), vec![SectionLabel::Other, SectionLabel::Methods]);
    }

    #[test]
    fn test_invalid_pattern_names_label() {
        let mut patterns = SectionPatterns::default();
        patterns.set(SectionLabel::Results, vec!["(unclosed".to_string()]);
        let err = SectionSegmenter::new(&patterns).unwrap_err();
        assert!(err.to_string().contains("results"));
    }

    #[test]
    fn test_uniform_weights() {
        let weights = SectionWeights::uniform(1);
        for label in SectionLabel::ALL {
            assert_eq!(weights.get(label), 1);
        }
    }
}
