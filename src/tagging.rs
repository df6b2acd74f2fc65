//! Section-weighted matching of vocabulary terms against document text.
//!
//! Every term is compiled into one case-insensitive whole-word pattern in
//! which word separators match any run of whitespace or hyphens, every word
//! may carry a possessive (`Crohn's`) and the last word also matches its
//! plural. Each occurrence scores the weight of the
//! section it starts in; a term is attached to the document when its total
//! reaches the threshold.

use std::cmp::Reverse;

use regex::{Regex, RegexBuilder, escape};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::section::{Section, SectionLabel, SectionSegmenter, SectionWeights};
use crate::text::clean_text;
use crate::vocabulary::Vocabulary;

/// Errors from building a tagging engine.
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("cannot compile pattern for term '{term}': {source}")]
    Pattern {
        term: String,
        #[source]
        source: regex::Error,
    },
}

/// Scoring settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggingOptions {
    /// Minimum score for a term to be attached.
    pub threshold: u32,
    /// When false every occurrence weighs 1 regardless of section.
    pub weighted: bool,
    pub weights: SectionWeights,
}

impl Default for TaggingOptions {
    fn default() -> Self {
        Self {
            threshold: 2,
            weighted: true,
            weights: SectionWeights::default(),
        }
    }
}

impl TaggingOptions {
    /// Weights actually applied to sections.
    #[must_use]
    pub fn effective_weights(&self) -> SectionWeights {
        if self.weighted {
            self.weights.clone()
        } else {
            SectionWeights::uniform(1)
        }
    }
}

/// One keyword attached to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub document_id: String,
    pub keyword: String,
    pub score: u32,
}

/// Every tag attached to one document, with the fingerprint of the settings
/// that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTags {
    pub document_id: String,
    /// Ordered by score descending, then keyword ascending.
    pub tags: Vec<TagAssignment>,
    pub fingerprint: String,
}

impl DocumentTags {
    /// Keywords in tag order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.keyword.as_str())
    }
}

struct TermMatcher {
    keyword: String,
    pattern: Regex,
}

/// Optional possessive after a word; normalized terms carry no apostrophes
/// and cleaned text only straight ones.
const POSSESSIVE: &str = "(?:'s?)?";

/// Builds the whole-word pattern for a normalized term.
fn term_pattern(term: &str) -> String {
    let words: Vec<&str> = term.split_whitespace().collect();
    let Some((last, leading)) = words.split_last() else {
        return String::new();
    };

    let last = if let Some(stem) = last.strip_suffix('y').filter(|stem| !stem.is_empty()) {
        format!("{}(?:y|ies)", escape(stem))
    } else if let Some(stem) = last.strip_suffix("is").filter(|stem| !stem.is_empty()) {
        // analysis, analyses
        format!("{}(?:is|es)", escape(stem))
    } else {
        format!("{}(?:e?s)?", escape(last))
    };

    let mut parts: Vec<String> = leading
        .iter()
        .map(|word| format!("{}{POSSESSIVE}", escape(word)))
        .collect();
    parts.push(format!("{last}{POSSESSIVE}"));
    format!(r"\b{}\b", parts.join(r"[\s\-]+"))
}

/// Matches a fixed vocabulary against documents.
pub struct TaggingEngine {
    matchers: Vec<TermMatcher>,
    segmenter: SectionSegmenter,
    options: TaggingOptions,
    fingerprint: String,
}

impl std::fmt::Debug for TaggingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggingEngine")
            .field("terms", &self.matchers.len())
            .field("options", &self.options)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl TaggingEngine {
    /// Compiles every vocabulary term.
    ///
    /// # Errors
    /// Returns [`TaggingError::Pattern`] if a term cannot be compiled.
    #[instrument(skip_all, fields(terms = vocabulary.len()))]
    pub fn new(
        vocabulary: &Vocabulary,
        segmenter: SectionSegmenter,
        options: TaggingOptions,
    ) -> Result<Self, TaggingError> {
        let mut matchers = Vec::with_capacity(vocabulary.len());
        for term in vocabulary.terms() {
            let source = term_pattern(term);
            if source.is_empty() {
                continue;
            }
            let pattern = RegexBuilder::new(&source)
                .case_insensitive(true)
                .build()
                .map_err(|source| TaggingError::Pattern {
                    term: term.to_string(),
                    source,
                })?;
            matchers.push(TermMatcher {
                keyword: term.to_string(),
                pattern,
            });
        }

        let fingerprint = settings_fingerprint(vocabulary, &options);
        debug!(%fingerprint, "tagging engine ready");
        Ok(Self {
            matchers,
            segmenter,
            options,
            fingerprint,
        })
    }

    /// Fingerprint of the vocabulary and options, stored with every result.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn options(&self) -> &TaggingOptions {
        &self.options
    }

    /// Cleans, segments and tags raw document text.
    #[must_use]
    #[instrument(skip(self, raw_text), fields(text_len = raw_text.len()))]
    pub fn tag(&self, document_id: &str, raw_text: &str) -> DocumentTags {
        let text = clean_text(raw_text);
        let sections = self
            .segmenter
            .segment(&text, &self.options.effective_weights());
        self.tag_sections(document_id, &text, &sections)
    }

    /// Tags already-cleaned text with precomputed sections.
    #[must_use]
    pub fn tag_sections(
        &self,
        document_id: &str,
        text: &str,
        sections: &[Section],
    ) -> DocumentTags {
        let mut tags: Vec<TagAssignment> = self
            .score_terms(text, sections)
            .into_iter()
            .filter(|(_, score)| *score >= self.options.threshold)
            .map(|(keyword, score)| TagAssignment {
                document_id: document_id.to_string(),
                keyword,
                score,
            })
            .collect();
        tags.sort_by(|a, b| {
            Reverse(a.score)
                .cmp(&Reverse(b.score))
                .then_with(|| a.keyword.cmp(&b.keyword))
        });

        debug!(document_id, tags = tags.len(), "document tagged");
        DocumentTags {
            document_id: document_id.to_string(),
            tags,
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Scores every term with at least one occurrence, in vocabulary order.
    #[must_use]
    pub fn score_terms(&self, text: &str, sections: &[Section]) -> Vec<(String, u32)> {
        let unweighted = !self.options.weighted;
        self.matchers
            .iter()
            .filter_map(|matcher| {
                let mut found_any = false;
                let mut score = 0u32;
                for found in matcher.pattern.find_iter(text) {
                    found_any = true;
                    let weight = if unweighted {
                        1
                    } else {
                        section_weight_at(sections, found.start())
                    };
                    score = score.saturating_add(weight);
                }
                found_any.then(|| (matcher.keyword.clone(), score))
            })
            .collect()
    }
}

/// Weight of the section containing byte `offset`.
fn section_weight_at(sections: &[Section], offset: usize) -> u32 {
    let index = sections.partition_point(|section| section.span.start <= offset);
    index
        .checked_sub(1)
        .and_then(|i| sections.get(i))
        .map_or(0, |section| section.weight)
}

fn settings_fingerprint(vocabulary: &Vocabulary, options: &TaggingOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(vocabulary.fingerprint().as_bytes());
    hasher.update(format!("threshold={};weighted={}", options.threshold, options.weighted));
    let weights = options.effective_weights();
    for label in SectionLabel::ALL {
        hasher.update(format!(";{label}={}", weights.get(label)));
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vocabulary::KeywordOrigin;

    fn vocabulary(terms: &[&str]) -> Vocabulary {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(terms, KeywordOrigin::KeywordFile);
        vocabulary
    }

    fn engine(terms: &[&str], options: TaggingOptions) -> TaggingEngine {
        TaggingEngine::new(&vocabulary(terms), SectionSegmenter::default(), options).unwrap()
    }

    fn options(threshold: u32, weighted: bool) -> TaggingOptions {
        TaggingOptions {
            threshold,
            weighted,
            weights: SectionWeights::default(),
        }
    }

    const PAPER: &str =
        "Abstract\nGene flow in island lizards.\nIntroduction\nGene-flow is common.\n";

    #[test]
    fn test_term_pattern_matches_plurals_and_separators() {
        let pattern = RegexBuilder::new(&term_pattern("gene flow"))
            .case_insensitive(true)
            .build()
            .unwrap();
        assert!(pattern.is_match("Gene  Flows"));
        assert!(pattern.is_match("gene-flow"));
        assert!(pattern.is_match("gene\nflow"));
        assert!(!pattern.is_match("genes flow"));
        assert!(!pattern.is_match("gene flowing"));

        let study = Regex::new(&term_pattern("study")).unwrap();
        assert!(study.is_match("two studies"));
    }

    #[test]
    fn test_term_pattern_matches_is_es_plurals() {
        let analysis = Regex::new(&term_pattern("meta analysis")).unwrap();
        assert!(analysis.is_match("two meta-analyses"));
        assert!(analysis.is_match("a meta analysis"));
        assert!(!analysis.is_match("meta analysts"));
    }

    #[test]
    fn test_possessive_author_keyword_matches_document_text() {
        let vocabulary = vocabulary(&["Crohn's disease"]);
        assert_eq!(vocabulary.terms().collect::<Vec<_>>(), vec!["crohn disease"]);

        let engine = TaggingEngine::new(&vocabulary, SectionSegmenter::default(), options(1, false))
            .unwrap();
        let tagged = engine.tag(
            "doc",
            "Crohn's disease is chronic. Patients with Crohn\u{2019}s disease were sampled.",
        );
        assert_eq!(tagged.keywords().collect::<Vec<_>>(), vec!["crohn disease"]);
        assert_eq!(tagged.tags[0].score, 2);
    }

    #[test]
    fn test_huge_section_weight_saturates_instead_of_overflowing() {
        let mut weights = SectionWeights::default();
        weights.set(SectionLabel::Abstract, u32::MAX);
        let engine = engine(
            &["gene flow"],
            TaggingOptions {
                threshold: u32::MAX,
                weighted: true,
                weights,
            },
        );
        let tagged = engine.tag("doc", "Abstract\ngene flow and gene flow\n");
        assert_eq!(tagged.tags.len(), 1);
        assert_eq!(tagged.tags[0].score, u32::MAX);
    }

    #[test]
    fn test_abstract_and_introduction_matches_score_five() {
        let tagged = engine(&["gene flow"], options(5, true)).tag("doc", PAPER);
        assert_eq!(tagged.tags.len(), 1);
        assert_eq!(tagged.tags[0].score, 5);

        let strict = engine(&["gene flow"], options(6, true)).tag("doc", PAPER);
        assert!(strict.tags.is_empty());
    }

    #[test]
    fn test_unweighted_equals_uniform_weights() {
        let unweighted = engine(&["gene flow", "lizard"], options(1, false)).tag("doc", PAPER);
        let uniform = engine(
            &["gene flow", "lizard"],
            TaggingOptions {
                threshold: 1,
                weighted: true,
                weights: SectionWeights::uniform(1),
            },
        )
        .tag("doc", PAPER);

        let scores = |tags: &DocumentTags| -> Vec<(String, u32)> {
            tags.tags.iter().map(|t| (t.keyword.clone(), t.score)).collect()
        };
        assert_eq!(scores(&unweighted), scores(&uniform));
        assert_eq!(
            scores(&unweighted),
            vec![("gene flow".to_string(), 2), ("lizard".to_string(), 1)]
        );
    }

    #[test]
    fn test_threshold_zero_requires_an_occurrence() {
        let text = "References\nGene flow reviewed.\n";
        let tagged = engine(&["gene flow", "phylogeny"], options(0, true)).tag("doc", text);
        let keywords: Vec<_> = tagged.keywords().collect();
        assert_eq!(keywords, vec!["gene flow"]);
        assert_eq!(tagged.tags[0].score, 0);
    }

    #[test]
    fn test_tags_ordered_by_score_then_keyword() {
        let text = "Abstract\nlizard gecko\nDiscussion\nskink gecko\n";
        let tagged = engine(&["skink", "lizard", "gecko"], options(1, true)).tag("doc", text);
        let keywords: Vec<_> = tagged.keywords().collect();
        assert_eq!(keywords, vec!["gecko", "lizard", "skink"]);
        assert_eq!(tagged.tags[0].score, 7);
    }

    #[test]
    fn test_fingerprint_changes_with_options() {
        let a = engine(&["gecko"], options(2, true));
        let b = engine(&["gecko"], options(3, true));
        let c = engine(&["gecko"], options(2, true));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_tagging_is_deterministic() {
        let engine = engine(&["gene flow", "lizard", "island"], options(1, true));
        assert_eq!(engine.tag("doc", PAPER), engine.tag("doc", PAPER));
    }

    #[test]
    fn test_section_weight_at_uses_containing_section() {
        let sections = vec![
            Section {
                label: SectionLabel::Other,
                span: 0..5,
                weight: 0,
            },
            Section {
                label: SectionLabel::Abstract,
                span: 5..10,
                weight: 4,
            },
        ];
        assert_eq!(section_weight_at(&sections, 0), 0);
        assert_eq!(section_weight_at(&sections, 5), 4);
        assert_eq!(section_weight_at(&sections, 9), 4);
    }
}
