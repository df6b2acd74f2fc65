//! Weighted undirected graph with PageRank, used by TextRank and TopicRank.

use std::collections::BTreeMap;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE: f64 = 1e-6;

/// Undirected graph over dense node indices.
#[derive(Debug, Clone, Default)]
pub(crate) struct WeightedGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
}

impl WeightedGraph {
    pub fn with_nodes(count: usize) -> Self {
        Self {
            adjacency: vec![BTreeMap::new(); count],
        }
    }

    /// Adds `weight` to the edge between `a` and `b`; self-loops are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        if a == b || weight <= 0.0 {
            return;
        }
        *self.adjacency[a].entry(b).or_insert(0.0) += weight;
        *self.adjacency[b].entry(a).or_insert(0.0) += weight;
    }

    /// Weighted PageRank scores, one per node.
    pub fn pagerank(&self) -> Vec<f64> {
        let n = self.adjacency.len();
        if n == 0 {
            return Vec::new();
        }

        let out_weight: Vec<f64> = self
            .adjacency
            .iter()
            .map(|edges| edges.values().sum())
            .collect();
        let mut scores = vec![1.0; n];

        for _ in 0..MAX_ITERATIONS {
            let mut next = vec![1.0 - DAMPING; n];
            for (node, edges) in self.adjacency.iter().enumerate() {
                for (&neighbor, &weight) in edges {
                    if out_weight[neighbor] > 0.0 {
                        next[node] += DAMPING * weight / out_weight[neighbor] * scores[neighbor];
                    }
                }
            }

            let delta = next
                .iter()
                .zip(&scores)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            scores = next;
            if delta < CONVERGENCE {
                break;
            }
        }

        scores
    }
}
