//! Folding of conjugated single-word terms into their longer forms.
//!
//! `genetic` and `genetics`, or `evolution` and `evolutionary`, end up as
//! separate consensus terms even though they tag the same documents. A
//! single-word term that is a prefix of a longer kept single-word term, with
//! at most [`MAX_SUFFIX_CHARS`] extra characters, is folded into the longer
//! term.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::Vocabulary;

/// Shortest term that can be folded into another.
const MIN_STEM_CHARS: usize = 4;
/// Longest suffix separating a folded term from its target.
const MAX_SUFFIX_CHARS: usize = 3;

/// One term folded into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPair {
    pub merged: String,
    pub into: String,
}

fn folds_into(short: &str, long: &str) -> bool {
    let short_len = short.chars().count();
    let long_len = long.chars().count();
    short_len >= MIN_STEM_CHARS
        && long_len > short_len
        && long_len - short_len <= MAX_SUFFIX_CHARS
        && long.starts_with(short)
}

impl Vocabulary {
    /// Folds conjugated single-word terms into their longest kept form.
    ///
    /// The surviving entry accumulates the folded entry's frequency and keeps
    /// the higher agreement count. Returns the folded pairs in the order they
    /// were found.
    #[instrument(skip(self), fields(terms = self.len()))]
    pub fn merge_conjugations(&mut self) -> Vec<MergedPair> {
        let mut single: Vec<String> = self
            .terms()
            .filter(|term| !term.contains(' '))
            .map(String::from)
            .collect();
        single.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let mut kept: Vec<String> = Vec::new();
        let mut pairs: Vec<MergedPair> = Vec::new();
        for word in single {
            let target = kept.iter().find(|longer| folds_into(&word, longer)).cloned();
            match target {
                Some(into) => pairs.push(MergedPair { merged: word, into }),
                None => kept.push(word),
            }
        }

        for pair in &pairs {
            let Some((frequency, agreement)) = self
                .get(&pair.merged)
                .map(|entry| (entry.frequency, entry.agreement_count))
            else {
                continue;
            };
            if let Some(target) = self.entry_mut(&pair.into) {
                target.frequency += frequency;
                target.agreement_count = target.agreement_count.max(agreement);
            }
        }

        self.retain(|entry| !pairs.iter().any(|pair| pair.merged == entry.keyword));
        debug!(merged = pairs.len(), "conjugations merged");
        pairs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::vocabulary::{KeywordOrigin, VocabularyEntry};

    fn entry(keyword: &str, agreement_count: usize, frequency: usize) -> VocabularyEntry {
        VocabularyEntry {
            keyword: keyword.to_string(),
            agreement_count,
            frequency,
            origin: KeywordOrigin::Consensus,
        }
    }

    #[test]
    fn test_folds_into_limits() {
        assert!(folds_into("genetic", "genetics"));
        assert!(folds_into("evolution", "evolutionary"));
        assert!(!folds_into("adapt", "adaptation"));
        assert!(!folds_into("gen", "gene"));
        assert!(!folds_into("gecko", "gecko"));
    }

    #[test]
    fn test_merge_conjugations_folds_into_longer_form() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_entries([
            entry("genetic", 3, 5),
            entry("phylogeny", 2, 4),
            entry("genetics", 2, 2),
            entry("gene flow", 2, 9),
        ]);

        let pairs = vocabulary.merge_conjugations();
        assert_eq!(
            pairs,
            vec![MergedPair {
                merged: "genetic".to_string(),
                into: "genetics".to_string()
            }]
        );
        assert_eq!(
            vocabulary.terms().collect::<Vec<_>>(),
            vec!["phylogeny", "genetics", "gene flow"]
        );
        let genetics = vocabulary.get("genetics").unwrap();
        assert_eq!(genetics.frequency, 7);
        assert_eq!(genetics.agreement_count, 3);
        assert!(!vocabulary.contains("genetic"));
    }

    #[test]
    fn test_merge_conjugations_ignores_multi_word_terms() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(["gene flow", "gene flowing"], KeywordOrigin::Consensus);
        assert!(vocabulary.merge_conjugations().is_empty());
        assert_eq!(vocabulary.len(), 2);
    }

    #[test]
    fn test_merge_conjugations_is_idempotent() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.merge_terms(["evolution", "evolutionary"], KeywordOrigin::Consensus);
        assert_eq!(vocabulary.merge_conjugations().len(), 1);
        assert!(vocabulary.merge_conjugations().is_empty());
    }
}
