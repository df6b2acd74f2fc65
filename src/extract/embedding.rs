//! Embedding-similarity ranking in the style of KeyBERT.
//!
//! Candidates and the whole document are embedded as character-trigram
//! frequency vectors; candidates closest to the document by cosine similarity
//! rank first. No model weights are involved, so the ranking is a pure
//! function of the text.

use std::collections::BTreeMap;

use tracing::instrument;

use super::candidates::PreparedText;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};

type SparseVector = BTreeMap<String, f64>;

/// Embedding-similarity ranking.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingExtractor;

fn add_word(vector: &mut SparseVector, word: &str) {
    let padded: Vec<char> = format!("#{word}#").chars().collect();
    for window in padded.windows(3) {
        *vector.entry(window.iter().collect()).or_insert(0.0) += 1.0;
    }
}

fn embed<'a>(words: impl IntoIterator<Item = &'a str>) -> SparseVector {
    let mut vector = SparseVector::new();
    for word in words {
        add_word(&mut vector, word);
    }
    vector
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(key, value)| large.get(key).map(|other| value * other))
        .sum();
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl KeywordExtractor for EmbeddingExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::KeyBert
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };

        let document = embed(prepared.content_words().into_iter().flatten());

        let mut phrases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for candidate in prepared.candidates() {
            phrases
                .entry(candidate.phrase())
                .or_insert(candidate.words);
        }

        let scored = phrases.into_iter().map(|(phrase, words)| {
            let vector = embed(words.iter().map(String::as_str));
            let similarity = cosine(&vector, &document);
            (phrase, similarity)
        });

        rank_phrases(scored, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_of_identical_vectors_is_one() {
        let v = embed(["lizard"]);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_of_disjoint_vectors_is_zero() {
        assert!(cosine(&embed(["abc"]), &embed(["xyz"])).abs() < f64::EPSILON);
    }

    #[test]
    fn test_embedding_prefers_central_vocabulary() {
        let text = "Lizard populations. Lizard adaptation. Lizard phylogeny. Quantum chromodynamics.";
        let phrases = EmbeddingExtractor.extract(text, 10);
        let quantum = phrases.iter().position(|p| p.phrase.starts_with("quantum"));
        let lizard = phrases.iter().position(|p| p.phrase.starts_with("lizard"));
        assert!(lizard < quantum || quantum.is_none(), "got {phrases:?}");
    }
}
