//! Cross-algorithm keyword consensus.
//!
//! Every record's extractor outputs are folded into per-phrase tallies keyed
//! by the normalized phrase. A phrase survives when the number of distinct
//! algorithms that proposed it falls inside the configured
//! [`AgreementRange`]. Author keywords and existing tags bypass the filter and
//! are appended after the consensus terms.
//!
//! All state lives in ordered maps, so the resulting vocabulary depends only on
//! the records and settings, never on hashing or iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::extract::{Algorithm, ExtractorOutputs};
use crate::text::normalize_phrase;
use crate::vocabulary::{KeywordOrigin, Vocabulary, VocabularyEntry};

/// Errors raised when building consensus settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// The lower bound is zero.
    #[error("agreement minimum must be at least 1, got {min}")]
    ZeroMinimum { min: usize },

    /// The bounds are reversed.
    #[error("agreement minimum {min} is greater than maximum {max}")]
    InvertedRange { min: usize, max: usize },
}

/// Inclusive bounds on the number of agreeing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgreementRange {
    min: usize,
    max: usize,
}

impl AgreementRange {
    /// Creates a range, rejecting `min == 0` and `min > max`.
    ///
    /// # Errors
    /// Returns [`ConsensusError`] when the bounds are invalid.
    pub fn new(min: usize, max: usize) -> Result<Self, ConsensusError> {
        if min == 0 {
            return Err(ConsensusError::ZeroMinimum { min });
        }
        if min > max {
            return Err(ConsensusError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> usize {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Whether `count` lies inside the inclusive range.
    #[must_use]
    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl Default for AgreementRange {
    fn default() -> Self {
        Self { min: 2, max: 4 }
    }
}

impl fmt::Display for AgreementRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Where agreement is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementScope {
    /// Distinct algorithms across all records.
    #[default]
    Corpus,
    /// Highest number of distinct algorithms within any single record.
    Document,
}

impl AgreementScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Corpus => "corpus",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for AgreementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgreementScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corpus" => Ok(Self::Corpus),
            "document" | "record" => Ok(Self::Document),
            other => Err(format!("unknown agreement scope: {other}")),
        }
    }
}

/// One normalized phrase proposed for a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKeyword {
    /// First surface form seen for this record.
    pub surface: String,
    pub normalized: String,
    /// Number of proposals per algorithm; several surface forms may fold together.
    pub hits: BTreeMap<Algorithm, u32>,
}

impl CandidateKeyword {
    /// Number of distinct algorithms that proposed this phrase.
    #[must_use]
    pub fn agreement(&self) -> usize {
        self.hits.len()
    }
}

/// Folds one record's extractor outputs into candidates keyed by normalized form.
#[must_use]
pub fn collect_candidates(outputs: &ExtractorOutputs) -> Vec<CandidateKeyword> {
    let mut by_form: BTreeMap<String, CandidateKeyword> = BTreeMap::new();

    for (algorithm, phrases) in outputs {
        for scored in phrases {
            let normalized = normalize_phrase(&scored.phrase);
            if normalized.is_empty() {
                continue;
            }
            let candidate = by_form
                .entry(normalized.clone())
                .or_insert_with(|| CandidateKeyword {
                    surface: scored.phrase.clone(),
                    normalized,
                    hits: BTreeMap::new(),
                });
            *candidate.hits.entry(*algorithm).or_insert(0) += 1;
        }
    }

    by_form.into_values().collect()
}

/// A phrase that passed the agreement filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusKeyword {
    pub normalized: String,
    pub agreement_count: usize,
    /// Number of (record, algorithm) proposals of this phrase.
    pub frequency: usize,
}

#[derive(Debug, Default)]
struct Tally {
    algorithms: BTreeSet<Algorithm>,
    best_record_agreement: usize,
    frequency: usize,
}

/// Accumulates candidates record by record and produces the consensus vocabulary.
#[derive(Debug)]
pub struct ConsensusBuilder {
    range: AgreementRange,
    scope: AgreementScope,
    tallies: BTreeMap<String, Tally>,
    author_keywords: Vec<String>,
    existing_tags: Vec<String>,
    records: usize,
}

impl ConsensusBuilder {
    #[must_use]
    pub fn new(range: AgreementRange, scope: AgreementScope) -> Self {
        Self {
            range,
            scope,
            tallies: BTreeMap::new(),
            author_keywords: Vec::new(),
            existing_tags: Vec::new(),
            records: 0,
        }
    }

    /// Number of records folded in so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Adds one record's candidates.
    pub fn add_record(&mut self, candidates: &[CandidateKeyword]) {
        self.records += 1;
        for candidate in candidates {
            let tally = self.tallies.entry(candidate.normalized.clone()).or_default();
            tally.algorithms.extend(candidate.hits.keys().copied());
            tally.best_record_agreement = tally.best_record_agreement.max(candidate.agreement());
            tally.frequency += candidate.agreement();
        }
    }

    /// Convenience for [`collect_candidates`] followed by [`Self::add_record`].
    pub fn add_outputs(&mut self, outputs: &ExtractorOutputs) {
        let candidates = collect_candidates(outputs);
        self.add_record(&candidates);
    }

    /// Queues author keywords for merging after consensus.
    pub fn add_author_keywords<S: AsRef<str>>(&mut self, keywords: impl IntoIterator<Item = S>) {
        push_normalized(&mut self.author_keywords, keywords);
    }

    /// Queues existing tags for merging after consensus.
    pub fn add_existing_tags<S: AsRef<str>>(&mut self, tags: impl IntoIterator<Item = S>) {
        push_normalized(&mut self.existing_tags, tags);
    }

    fn agreement(&self, tally: &Tally) -> usize {
        match self.scope {
            AgreementScope::Corpus => tally.algorithms.len(),
            AgreementScope::Document => tally.best_record_agreement,
        }
    }

    /// Phrases whose agreement lies in range, ranked by agreement descending,
    /// then frequency descending, then phrase ascending.
    #[must_use]
    pub fn consensus(&self) -> Vec<ConsensusKeyword> {
        let mut kept: Vec<ConsensusKeyword> = self
            .tallies
            .iter()
            .filter_map(|(normalized, tally)| {
                let agreement_count = self.agreement(tally);
                self.range.contains(agreement_count).then(|| ConsensusKeyword {
                    normalized: normalized.clone(),
                    agreement_count,
                    frequency: tally.frequency,
                })
            })
            .collect();

        kept.sort_by(|a, b| {
            b.agreement_count
                .cmp(&a.agreement_count)
                .then_with(|| b.frequency.cmp(&a.frequency))
                .then_with(|| a.normalized.cmp(&b.normalized))
        });
        kept
    }

    /// Produces the vocabulary: consensus terms first, then author keywords,
    /// then existing tags.
    #[must_use]
    #[instrument(skip(self), fields(records = self.records, range = %self.range, scope = %self.scope))]
    pub fn build(&self) -> Vocabulary {
        let consensus = self.consensus();
        debug!(
            candidates = self.tallies.len(),
            kept = consensus.len(),
            "agreement filter applied"
        );

        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_entries(consensus.into_iter().map(|keyword| VocabularyEntry {
            keyword: keyword.normalized,
            agreement_count: keyword.agreement_count,
            frequency: keyword.frequency,
            origin: KeywordOrigin::Consensus,
        }));

        let authors = vocabulary.merge_entries(
            self.external_entries(&self.author_keywords, KeywordOrigin::AuthorKeyword),
        );
        let tags = vocabulary
            .merge_entries(self.external_entries(&self.existing_tags, KeywordOrigin::ExistingTag));

        info!(
            terms = vocabulary.len(),
            author_keywords = authors,
            existing_tags = tags,
            "consensus vocabulary built"
        );
        vocabulary
    }

    fn external_entries<'a>(
        &'a self,
        terms: &'a [String],
        origin: KeywordOrigin,
    ) -> impl Iterator<Item = VocabularyEntry> + 'a {
        terms.iter().map(move |term| {
            let (agreement_count, frequency) = self
                .tallies
                .get(term)
                .map_or((0, 0), |tally| (self.agreement(tally), tally.frequency));
            VocabularyEntry {
                keyword: term.clone(),
                agreement_count,
                frequency,
                origin,
            }
        })
    }
}

fn push_normalized<S: AsRef<str>>(target: &mut Vec<String>, terms: impl IntoIterator<Item = S>) {
    for term in terms {
        let normalized = normalize_phrase(term.as_ref());
        if !normalized.is_empty() && !target.contains(&normalized) {
            target.push(normalized);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::ScoredPhrase;

    fn outputs(entries: &[(Algorithm, &[&str])]) -> ExtractorOutputs {
        entries
            .iter()
            .map(|(algorithm, phrases)| {
                (
                    *algorithm,
                    phrases
                        .iter()
                        .map(|phrase| ScoredPhrase {
                            phrase: (*phrase).to_string(),
                            score: 1.0,
                        })
                        .collect(),
                )
            })
            .collect()
    }

    fn terms(vocabulary: &Vocabulary) -> Vec<&str> {
        vocabulary.terms().collect()
    }

    #[test]
    fn test_agreement_range_validates_bounds() {
        assert!(AgreementRange::new(2, 4).is_ok());
        assert!(AgreementRange::new(3, 3).is_ok());
        assert_eq!(
            AgreementRange::new(5, 3),
            Err(ConsensusError::InvertedRange { min: 5, max: 3 })
        );
        assert_eq!(
            AgreementRange::new(0, 3),
            Err(ConsensusError::ZeroMinimum { min: 0 })
        );
    }

    #[test]
    fn test_agreement_range_is_inclusive() {
        let range = AgreementRange::new(2, 4).unwrap();
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_collect_candidates_folds_surface_forms() {
        let candidates = collect_candidates(&outputs(&[
            (Algorithm::Rake, &["gene flows", "Gene Flow"]),
            (Algorithm::Yake, &["gene flow"]),
        ]));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].normalized, "gene flow");
        assert_eq!(candidates[0].agreement(), 2);
        assert_eq!(candidates[0].hits[&Algorithm::Rake], 2);
    }

    #[test]
    fn test_two_of_three_algorithms_survive_range_two_to_three() {
        let mut builder =
            ConsensusBuilder::new(AgreementRange::new(2, 3).unwrap(), AgreementScope::Corpus);
        builder.add_outputs(&outputs(&[
            (Algorithm::Rake, &["gene flow"]),
            (Algorithm::TextRank, &["gene flow", "phylogeny"]),
            (Algorithm::Yake, &["phylogeny", "island biogeography"]),
        ]));
        let vocabulary = builder.build();
        assert_eq!(terms(&vocabulary), vec!["gene flow", "phylogeny"]);
        assert!(!vocabulary.contains("island biogeography"));
    }

    #[test]
    fn test_agreement_filter_boundaries() {
        // lizard is proposed by 1 algorithm, gecko 2, iguana 3, skink 4.
        let mut builder =
            ConsensusBuilder::new(AgreementRange::new(2, 3).unwrap(), AgreementScope::Corpus);
        builder.add_outputs(&outputs(&[
            (Algorithm::Rake, &["lizard", "gecko", "iguana", "skink"]),
            (Algorithm::TextRank, &["gecko", "iguana", "skink"]),
            (Algorithm::Yake, &["iguana", "skink"]),
            (Algorithm::Bigram, &["skink"]),
        ]));
        let consensus = builder.consensus();
        let kept: Vec<_> = consensus.iter().map(|k| k.normalized.as_str()).collect();
        assert_eq!(kept, vec!["iguana", "gecko"]);
    }

    #[test]
    fn test_corpus_scope_counts_across_records() {
        let mut corpus =
            ConsensusBuilder::new(AgreementRange::new(2, 4).unwrap(), AgreementScope::Corpus);
        let mut document = ConsensusBuilder::new(
            AgreementRange::new(2, 4).unwrap(),
            AgreementScope::Document,
        );
        for builder in [&mut corpus, &mut document] {
            builder.add_outputs(&outputs(&[(Algorithm::Rake, &["gene flow"])]));
            builder.add_outputs(&outputs(&[(Algorithm::Yake, &["gene flow"])]));
        }
        assert_eq!(terms(&corpus.build()), vec!["gene flow"]);
        assert!(document.build().is_empty());
    }

    #[test]
    fn test_ranking_uses_frequency_then_phrase() {
        let mut builder = ConsensusBuilder::new(AgreementRange::default(), AgreementScope::Corpus);
        builder.add_outputs(&outputs(&[
            (Algorithm::Rake, &["phylogeny", "gene flow", "adaptation"]),
            (Algorithm::Yake, &["phylogeny", "gene flow", "adaptation"]),
        ]));
        builder.add_outputs(&outputs(&[
            (Algorithm::Rake, &["gene flow"]),
            (Algorithm::Yake, &["gene flow"]),
        ]));
        let consensus = builder.consensus();
        assert_eq!(consensus[0].normalized, "gene flow");
        assert_eq!(consensus[0].frequency, 4);
        assert_eq!(consensus[1].normalized, "adaptation");
        assert_eq!(consensus[2].normalized, "phylogeny");
    }

    #[test]
    fn test_external_keywords_bypass_filter() {
        let mut builder =
            ConsensusBuilder::new(AgreementRange::new(2, 3).unwrap(), AgreementScope::Corpus);
        builder.add_outputs(&outputs(&[
            (Algorithm::Rake, &["gene flow", "microsatellites"]),
            (Algorithm::Yake, &["gene flow"]),
        ]));
        builder.add_author_keywords(["Microsatellites", "Island Lizards"]);
        builder.add_existing_tags(["gene flow", "to read"]);
        let vocabulary = builder.build();

        assert_eq!(
            terms(&vocabulary),
            vec!["gene flow", "microsatellite", "island lizard", "to read"]
        );
        let micro = vocabulary.get("microsatellite").unwrap();
        assert_eq!(micro.origin, KeywordOrigin::AuthorKeyword);
        assert_eq!(micro.agreement_count, 1);
        assert_eq!(vocabulary.get("gene flow").unwrap().origin, KeywordOrigin::Consensus);
    }

    #[test]
    fn test_build_is_deterministic() {
        let build = || {
            let mut builder =
                ConsensusBuilder::new(AgreementRange::default(), AgreementScope::Corpus);
            builder.add_outputs(&outputs(&[
                (Algorithm::Rake, &["b", "a", "c"]),
                (Algorithm::Yake, &["c", "a", "b"]),
            ]));
            builder.build()
        };
        assert_eq!(build(), build());
        assert_eq!(build().fingerprint(), build().fingerprint());
    }

    #[test]
    fn test_scope_parses_from_str() {
        assert_eq!("corpus".parse::<AgreementScope>().unwrap(), AgreementScope::Corpus);
        assert_eq!("Document".parse::<AgreementScope>().unwrap(), AgreementScope::Document);
        assert!("global".parse::<AgreementScope>().is_err());
    }
}
