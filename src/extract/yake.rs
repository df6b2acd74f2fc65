//! YAKE: unsupervised keyword scoring from per-word statistical features.
//!
//! Lower YAKE scores are better; the adapter reports `1 / (1 + yake)` so that
//! higher is better like every other extractor.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use super::candidates::PreparedText;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};

#[derive(Debug, Default)]
struct WordStats {
    frequency: usize,
    capitalized: usize,
    acronym: usize,
    sentences: BTreeSet<usize>,
    left: BTreeSet<String>,
    left_total: usize,
    right: BTreeSet<String>,
    right_total: usize,
}

/// Graph/statistical hybrid keyword ranking.
#[derive(Debug, Clone, Default)]
pub struct YakeExtractor;

impl YakeExtractor {
    fn word_scores(prepared: &PreparedText) -> BTreeMap<String, f64> {
        let mut stats: BTreeMap<String, WordStats> = BTreeMap::new();

        for (sentence_index, sentence) in prepared.sentences.iter().enumerate() {
            for (i, word) in sentence.iter().enumerate() {
                if !word.is_content() {
                    continue;
                }
                let entry = stats.entry(word.text.clone()).or_default();
                entry.frequency += 1;
                entry.sentences.insert(sentence_index);

                let is_acronym = word.surface.chars().filter(|c| c.is_alphabetic()).count() > 1
                    && word.surface.chars().all(|c| !c.is_lowercase());
                if is_acronym {
                    entry.acronym += 1;
                } else if i > 0
                    && word
                        .surface
                        .chars()
                        .find(|c| c.is_alphabetic())
                        .is_some_and(char::is_uppercase)
                {
                    entry.capitalized += 1;
                }

                if i > 0 && sentence[i - 1].is_content() {
                    entry.left.insert(sentence[i - 1].text.clone());
                    entry.left_total += 1;
                }
                if let Some(next) = sentence.get(i + 1)
                    && next.is_content()
                {
                    entry.right.insert(next.text.clone());
                    entry.right_total += 1;
                }
            }
        }

        if stats.is_empty() {
            return BTreeMap::new();
        }

        let frequencies: Vec<f64> = stats.values().map(|s| s.frequency as f64).collect();
        let count = frequencies.len() as f64;
        let mean = frequencies.iter().sum::<f64>() / count;
        let variance = frequencies.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / count;
        let spread = mean + variance.sqrt();
        let max_frequency = frequencies.iter().copied().fold(0.0, f64::max);
        let total_sentences = prepared.sentences.len().max(1) as f64;

        stats
            .into_iter()
            .map(|(word, s)| {
                let tf = s.frequency as f64;
                let casing = s.capitalized.max(s.acronym) as f64 / (1.0 + tf.ln());
                let mut sentence_indices: Vec<f64> =
                    s.sentences.iter().map(|&i| i as f64).collect();
                sentence_indices.sort_by(f64::total_cmp);
                let median = sentence_indices[sentence_indices.len() / 2];
                let position = (3.0 + median).ln().ln();
                let frequency = tf / spread;
                let left = if s.left_total == 0 {
                    0.0
                } else {
                    s.left.len() as f64 / s.left_total as f64
                };
                let right = if s.right_total == 0 {
                    0.0
                } else {
                    s.right.len() as f64 / s.right_total as f64
                };
                let relatedness = 1.0 + (left + right) * tf / max_frequency;
                let different = s.sentences.len() as f64 / total_sentences;

                let score = (relatedness * position)
                    / (casing + frequency / relatedness + different / relatedness);
                (word, score)
            })
            .collect()
    }
}

impl KeywordExtractor for YakeExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Yake
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };
        let word_scores = Self::word_scores(&prepared);

        let mut phrase_frequency: BTreeMap<String, (Vec<String>, usize)> = BTreeMap::new();
        for candidate in prepared.candidates() {
            phrase_frequency
                .entry(candidate.phrase())
                .or_insert_with(|| (candidate.words.clone(), 0))
                .1 += 1;
        }

        let scored = phrase_frequency.into_iter().map(|(phrase, (words, tf))| {
            let values: Vec<f64> = words
                .iter()
                .map(|w| word_scores.get(w).copied().unwrap_or(1.0))
                .collect();
            let product: f64 = values.iter().product();
            let sum: f64 = values.iter().sum();
            let yake = product / (tf as f64 * (1.0 + sum));
            (phrase, 1.0 / (1.0 + yake))
        });

        rank_phrases(scored, top_k)
    }
}
