//! Keyword extraction using RAKE (Rapid Automatic Keyword Extraction) algorithm.

use rake::{Rake, StopWords};
use tracing::instrument;

use super::candidates::PreparedText;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};
use crate::text::{STOP_WORDS, clean_text};

/// RAKE phrases longer than this are sentence fragments rather than keywords.
const MAX_RAKE_WORDS: usize = 4;

/// Statistical co-occurrence ranking via the `rake` crate.
pub struct RakeExtractor {
    /// Cached RAKE instance with pre-built stop words.
    rake: Rake,
}

impl std::fmt::Debug for RakeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RakeExtractor").finish()
    }
}

impl Default for RakeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RakeExtractor {
    /// Creates a RAKE extractor with English stop words.
    #[must_use]
    pub fn new() -> Self {
        let mut sw = StopWords::new();
        for word in STOP_WORDS.iter() {
            sw.insert(word.clone());
        }
        Self {
            rake: Rake::new(sw),
        }
    }
}

impl KeywordExtractor for RakeExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Rake
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        if PreparedText::new(text).is_none() {
            return Vec::new();
        }
        let cleaned = clean_text(text);

        // RAKE's internal HashMap ordering is non-deterministic; rank_phrases
        // re-sorts by score then phrase.
        let scored = self
            .rake
            .run(&cleaned)
            .into_iter()
            .filter(|keyword_score| {
                let words = keyword_score.keyword.split_whitespace().count();
                (1..=MAX_RAKE_WORDS).contains(&words)
                    && keyword_score
                        .keyword
                        .chars()
                        .any(char::is_alphabetic)
            })
            .map(|keyword_score| (keyword_score.keyword, keyword_score.score));

        rank_phrases(scored, top_k)
    }
}
