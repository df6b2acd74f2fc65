//! TopicRank: candidates are clustered into topics, topics are ranked with
//! PageRank over a graph weighted by positional proximity, and each topic is
//! represented by its earliest candidate.

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use super::candidates::PreparedText;
use super::graph::WeightedGraph;
use super::{Algorithm, KeywordExtractor, ScoredPhrase, rank_phrases};
use crate::text::singularize;

/// Graph/statistical hybrid ranking over topic clusters.
#[derive(Debug, Clone)]
pub struct TopicRankExtractor {
    /// Minimum word-set Jaccard overlap for two candidates to share a topic.
    similarity: f64,
}

impl Default for TopicRankExtractor {
    fn default() -> Self {
        Self { similarity: 0.25 }
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Joins two sets; the smaller index stays root so topic order follows first appearance.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[merge] = keep;
        }
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let shared = a.intersection(b).count();
    let total = a.union(b).count();
    if total == 0 {
        0.0
    } else {
        shared as f64 / total as f64
    }
}

impl KeywordExtractor for TopicRankExtractor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TopicRank
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn extract(&self, text: &str, top_k: usize) -> Vec<ScoredPhrase> {
        let Some(prepared) = PreparedText::new(text) else {
            return Vec::new();
        };

        // Unique phrases in order of first appearance, with all their positions.
        let mut order: BTreeMap<String, usize> = BTreeMap::new();
        let mut phrases: Vec<String> = Vec::new();
        let mut positions: Vec<Vec<usize>> = Vec::new();
        for candidate in prepared.candidates() {
            let phrase = candidate.phrase();
            let slot = *order.entry(phrase.clone()).or_insert_with(|| {
                phrases.push(phrase);
                positions.push(Vec::new());
                phrases.len() - 1
            });
            positions[slot].push(candidate.position);
        }

        let word_sets: Vec<BTreeSet<String>> = phrases
            .iter()
            .map(|phrase| phrase.split(' ').map(singularize).collect())
            .collect();

        let mut clusters = UnionFind::new(phrases.len());
        for i in 0..phrases.len() {
            for j in (i + 1)..phrases.len() {
                if jaccard(&word_sets[i], &word_sets[j]) >= self.similarity {
                    clusters.union(i, j);
                }
            }
        }

        // Topic ids follow the first appearance of their root phrase.
        let mut topic_of_root: BTreeMap<usize, usize> = BTreeMap::new();
        let mut representatives: Vec<usize> = Vec::new();
        let mut topic_positions: Vec<Vec<usize>> = Vec::new();
        for phrase_index in 0..phrases.len() {
            let root = clusters.find(phrase_index);
            let topic = *topic_of_root.entry(root).or_insert_with(|| {
                representatives.push(root);
                topic_positions.push(Vec::new());
                representatives.len() - 1
            });
            topic_positions[topic].extend(&positions[phrase_index]);
        }

        let mut graph = WeightedGraph::with_nodes(representatives.len());
        for a in 0..topic_positions.len() {
            for b in (a + 1)..topic_positions.len() {
                let weight: f64 = topic_positions[a]
                    .iter()
                    .flat_map(|&pa| {
                        topic_positions[b]
                            .iter()
                            .filter(move |&&pb| pb != pa)
                            .map(move |&pb| 1.0 / pa.abs_diff(pb) as f64)
                    })
                    .sum();
                graph.add_edge(a, b, weight);
            }
        }
        let scores = graph.pagerank();

        let scored = representatives
            .iter()
            .enumerate()
            .map(|(topic, &phrase_index)| (phrases[phrase_index].clone(), scores[topic]));

        rank_phrases(scored, top_k)
    }
}
