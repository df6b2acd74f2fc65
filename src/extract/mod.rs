//! Keyword extraction adapters.
//!
//! Seven independent algorithms sit behind the [`KeywordExtractor`] trait.
//! Each one is a pure function of its input text: it cleans decoding
//! artifacts, lowercases its output, and returns an empty list instead of
//! failing when the text is empty or too short to rank.
//!
//! | Algorithm | Family |
//! |---|---|
//! | [`Algorithm::Rake`] | statistical co-occurrence |
//! | [`Algorithm::TextRank`] | graph ranking |
//! | [`Algorithm::KeyBert`] | embedding similarity |
//! | [`Algorithm::TfIdf`] | frequency |
//! | [`Algorithm::Bigram`] | frequency (collocations) |
//! | [`Algorithm::TopicRank`] | graph/statistical hybrid |
//! | [`Algorithm::Yake`] | graph/statistical hybrid |

mod bigram;
mod candidates;
mod embedding;
mod graph;
mod rake;
mod textrank;
mod tfidf;
mod topicrank;
mod yake;

pub use bigram::BigramExtractor;
pub use embedding::EmbeddingExtractor;
pub use rake::RakeExtractor;
pub use textrank::TextRankExtractor;
pub use tfidf::TfIdfExtractor;
pub use topicrank::TopicRankExtractor;
pub use yake::YakeExtractor;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default number of phrases kept per algorithm and record.
pub const DEFAULT_TOP_K: usize = 10;

/// Identifies one extraction algorithm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Rake,
    TextRank,
    KeyBert,
    TfIdf,
    Bigram,
    TopicRank,
    Yake,
}

impl Algorithm {
    /// Every algorithm, in a stable order.
    pub const ALL: [Algorithm; 7] = [
        Self::Rake,
        Self::TextRank,
        Self::KeyBert,
        Self::TfIdf,
        Self::Bigram,
        Self::TopicRank,
        Self::Yake,
    ];

    /// Returns the stable string label used in config files and caches.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rake => "rake",
            Self::TextRank => "text_rank",
            Self::KeyBert => "key_bert",
            Self::TfIdf => "tf_idf",
            Self::Bigram => "bigram",
            Self::TopicRank => "topic_rank",
            Self::Yake => "yake",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|algorithm| {
                algorithm.as_str() == key || algorithm.as_str().replace('_', "") == key
            })
            .ok_or_else(|| format!("unknown extraction algorithm: {s}"))
    }
}

/// A ranked phrase; higher scores rank first for every algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPhrase {
    pub phrase: String,
    pub score: f64,
}

/// Per-algorithm ranked phrases for one text.
pub type ExtractorOutputs = BTreeMap<Algorithm, Vec<ScoredPhrase>>;

/// Uniform interface over the extraction algorithms.
pub trait KeywordExtractor: Send + Sync {
    /// Which algorithm this extractor implements.
    fn algorithm(&self) -> Algorithm;

    /// Returns up to `top_k` phrases ranked by descending score.
    ///
    /// Never fails: degenerate input yields an empty list.
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase>;
}

/// Orders scored phrases deterministically and keeps the best `top_k`.
///
/// Duplicate phrases keep their best score; non-finite scores are dropped.
/// Ties are broken by phrase so hash ordering inside an algorithm never leaks out.
pub(crate) fn rank_phrases(
    scored: impl IntoIterator<Item = (String, f64)>,
    top_k: usize,
) -> Vec<ScoredPhrase> {
    let mut best: BTreeMap<String, f64> = BTreeMap::new();
    for (phrase, score) in scored {
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() || !score.is_finite() {
            continue;
        }
        best.entry(phrase)
            .and_modify(|existing| {
                if score > *existing {
                    *existing = score;
                }
            })
            .or_insert(score);
    }

    let mut ranked: Vec<ScoredPhrase> = best
        .into_iter()
        .map(|(phrase, score)| ScoredPhrase { phrase, score })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.phrase.cmp(&b.phrase))
    });
    ranked.truncate(top_k);
    ranked
}

/// A fixed ensemble of extractors run over the same text.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn KeywordExtractor>>,
}

impl fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorSet")
            .field("algorithms", &self.algorithms())
            .finish()
    }
}

impl ExtractorSet {
    /// All seven algorithms.
    #[must_use]
    pub fn standard() -> Self {
        Self::with_algorithms(&Algorithm::ALL)
    }

    /// Only the listed algorithms; duplicates are ignored.
    #[must_use]
    pub fn with_algorithms(algorithms: &[Algorithm]) -> Self {
        let mut selected: Vec<Algorithm> = algorithms.to_vec();
        selected.sort();
        selected.dedup();

        let extractors = selected
            .into_iter()
            .map(|algorithm| -> Box<dyn KeywordExtractor> {
                match algorithm {
                    Algorithm::Rake => Box::new(RakeExtractor::new()),
                    Algorithm::TextRank => Box::new(TextRankExtractor::default()),
                    Algorithm::KeyBert => Box::new(EmbeddingExtractor::default()),
                    Algorithm::TfIdf => Box::new(TfIdfExtractor::default()),
                    Algorithm::Bigram => Box::new(BigramExtractor::default()),
                    Algorithm::TopicRank => Box::new(TopicRankExtractor::default()),
                    Algorithm::Yake => Box::new(YakeExtractor::default()),
                }
            })
            .collect();

        Self { extractors }
    }

    /// Wraps arbitrary extractors, e.g. fakes in tests.
    #[must_use]
    pub fn from_extractors(extractors: Vec<Box<dyn KeywordExtractor>>) -> Self {
        Self { extractors }
    }

    /// Algorithms in this set, in run order.
    #[must_use]
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.extractors.iter().map(|e| e.algorithm()).collect()
    }

    /// Runs every extractor over `text`.
    #[must_use]
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn extract_all(&self, text: &str, top_k: usize) -> ExtractorOutputs {
        let mut outputs = ExtractorOutputs::new();
        for extractor in &self.extractors {
            let phrases = extractor.extract(text, top_k);
            debug!(
                algorithm = %extractor.algorithm(),
                phrases = phrases.len(),
                "extractor finished"
            );
            outputs.insert(extractor.algorithm(), phrases);
        }
        outputs
    }
}
