//! TF-IDF ranking with sentences as pseudo-documents.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use super::candidates::PreparedText;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};

/// Frequency-based ranking: phrases frequent overall but concentrated in few
/// sentences score highest.
#[derive(Debug, Clone, Default)]
pub struct TfIdfExtractor;

impl KeywordExtractor for TfIdfExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TfIdf
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };
        let candidates = prepared.candidates();
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut term_frequency: BTreeMap<String, usize> = BTreeMap::new();
        let mut sentence_sets: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for candidate in &candidates {
            let phrase = candidate.phrase();
            *term_frequency.entry(phrase.clone()).or_insert(0) += 1;
            sentence_sets.entry(phrase).or_default().insert(candidate.sentence);
        }

        let total_terms = candidates.len() as f64;
        let documents = prepared.sentences.len() as f64;

        let scored = term_frequency.into_iter().map(|(phrase, count)| {
            let df = sentence_sets.get(&phrase).map_or(1, BTreeSet::len) as f64;
            let tf = count as f64 / total_terms;
            let idf = ((1.0 + documents) / (1.0 + df)).ln() + 1.0;
            (phrase, tf * idf)
        });

        rank_phrases(scored, top_k)
    }
}
