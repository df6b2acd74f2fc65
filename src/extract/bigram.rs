//! Bigram collocations scored by count-weighted pointwise mutual information.

use std::collections::BTreeMap;

use tracing::instrument;

use super::candidates::PreparedText;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};

/// Frequency-based ranking of adjacent content-word pairs.
#[derive(Debug, Clone, Default)]
pub struct BigramExtractor;

impl KeywordExtractor for BigramExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Bigram
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };

        let mut unigrams: BTreeMap<&str, usize> = BTreeMap::new();
        let mut bigrams: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        let mut total = 0usize;

        for sentence in &prepared.sentences {
            for (i, word) in sentence.iter().enumerate() {
                if !word.is_content() {
                    continue;
                }
                total += 1;
                *unigrams.entry(word.text.as_str()).or_insert(0) += 1;

                if let Some(next) = sentence.get(i + 1)
                    && next.is_content()
                    && !next.break_before
                {
                    *bigrams
                        .entry((word.text.as_str(), next.text.as_str()))
                        .or_insert(0) += 1;
                }
            }
        }

        let total = total as f64;
        let scored = bigrams.into_iter().map(|((first, second), count)| {
            let count = count as f64;
            let expected = unigrams[first] as f64 * unigrams[second] as f64;
            let pmi = (total * count / expected).ln().max(0.0);
            (format!("{first} {second}"), count * (1.0 + pmi))
        });

        rank_phrases(scored, top_k)
    }
}
