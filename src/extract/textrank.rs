//! TextRank: PageRank over a word co-occurrence graph.

use std::collections::BTreeMap;

use tracing::instrument;

use super::candidates::PreparedText;
use super::graph::WeightedGraph;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};

/// Graph-based ranking; a phrase scores the sum of its words' PageRank.
#[derive(Debug, Clone)]
pub struct TextRankExtractor {
    /// Co-occurrence window over consecutive content words.
    window: usize,
}

impl Default for TextRankExtractor {
    fn default() -> Self {
        Self { window: 2 }
    }
}

impl KeywordExtractor for TextRankExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TextRank
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };

        let content = prepared.content_words();
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for &word in content.iter().flatten() {
            let next = index.len();
            index.entry(word).or_insert(next);
        }

        let mut graph = WeightedGraph::with_nodes(index.len());
        for sentence in &content {
            for (i, word) in sentence.iter().enumerate() {
                for other in sentence.iter().skip(i + 1).take(self.window.saturating_sub(1)) {
                    graph.add_edge(index[word], index[other], 1.0);
                }
            }
        }
        let scores = graph.pagerank();

        let scored = prepared.candidates().into_iter().map(|candidate| {
            let score = candidate
                .words
                .iter()
                .filter_map(|word| index.get(word.as_str()).map(|&i| scores[i]))
                .sum::<f64>();
            (candidate.phrase(), score)
        });

        rank_phrases(scored, top_k)
    }
}
