//! Predefined term lists that can be merged into a vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

const STATISTICS: &[&str] = &[
    "anova",
    "ancova",
    "manova",
    "t-test",
    "chi-square",
    "linear regression",
    "logistic regression",
    "mixed model",
    "generalized linear model",
    "generalized additive model",
    "bayesian inference",
    "maximum likelihood",
    "principal component analysis",
    "cluster analysis",
    "correlation",
    "bootstrap",
    "permutation test",
    "mantel test",
    "markov chain monte carlo",
    "random forest",
    "meta-analysis",
    "structural equation model",
];

const CONTINENTS: &[&str] = &[
    "africa",
    "antarctica",
    "asia",
    "australia",
    "europe",
    "north america",
    "south america",
    "oceania",
];

const COUNTRIES: &[&str] = &[
    "argentina",
    "australia",
    "austria",
    "belgium",
    "bolivia",
    "brazil",
    "canada",
    "chile",
    "china",
    "colombia",
    "costa rica",
    "croatia",
    "denmark",
    "ecuador",
    "egypt",
    "ethiopia",
    "finland",
    "france",
    "germany",
    "greece",
    "iceland",
    "india",
    "indonesia",
    "ireland",
    "israel",
    "italy",
    "japan",
    "kenya",
    "madagascar",
    "malaysia",
    "mexico",
    "morocco",
    "netherlands",
    "new zealand",
    "nigeria",
    "norway",
    "panama",
    "peru",
    "philippines",
    "poland",
    "portugal",
    "russia",
    "south africa",
    "spain",
    "sweden",
    "switzerland",
    "tanzania",
    "thailand",
    "turkey",
    "united kingdom",
    "united states",
    "venezuela",
    "vietnam",
];

const SEQUENCING: &[&str] = &[
    "sanger sequencing",
    "illumina",
    "nanopore",
    "pacbio",
    "whole genome sequencing",
    "exome sequencing",
    "rna-seq",
    "chip-seq",
    "atac-seq",
    "metabarcoding",
    "metagenomics",
    "amplicon sequencing",
    "rad-seq",
    "genotyping by sequencing",
    "microsatellite",
    "snp",
    "pcr",
    "qpcr",
];

const HABITATS: &[&str] = &[
    "forest",
    "rainforest",
    "grassland",
    "savanna",
    "desert",
    "tundra",
    "wetland",
    "mangrove",
    "coral reef",
    "estuary",
    "lake",
    "river",
    "island",
    "mountain",
    "cave",
    "urban",
    "agricultural land",
    "deep sea",
];

/// A predefined list selectable by name in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternateList {
    Statistics,
    Countries,
    Continents,
    Sequencing,
    Habitats,
}

impl AlternateList {
    pub const ALL: [AlternateList; 5] = [
        Self::Statistics,
        Self::Countries,
        Self::Continents,
        Self::Sequencing,
        Self::Habitats,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::Countries => "countries",
            Self::Continents => "continents",
            Self::Sequencing => "sequencing",
            Self::Habitats => "habitats",
        }
    }

    /// Terms in this list.
    #[must_use]
    pub fn terms(self) -> &'static [&'static str] {
        match self {
            Self::Statistics => STATISTICS,
            Self::Countries => COUNTRIES,
            Self::Continents => CONTINENTS,
            Self::Sequencing => SEQUENCING,
            Self::Habitats => HABITATS,
        }
    }

    /// Resolves list names; `all` selects every list.
    ///
    /// The result is sorted and free of duplicates.
    ///
    /// # Errors
    /// Returns the first unknown name.
    pub fn parse_selection<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, String> {
        let mut selected = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("all") {
                selected.extend(Self::ALL);
            } else {
                selected.push(name.parse()?);
            }
        }
        selected.sort();
        selected.dedup();
        Ok(selected)
    }
}

impl fmt::Display for AlternateList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlternateList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|list| list.as_str() == key)
            .ok_or_else(|| format!("unknown alternate list: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_expands_all() {
        let lists = AlternateList::parse_selection(&["all"]).unwrap();
        assert_eq!(lists, AlternateList::ALL.to_vec());
    }

    #[test]
    fn test_parse_selection_sorts_and_deduplicates() {
        let lists =
            AlternateList::parse_selection(&["habitats", "Statistics", "habitats"]).unwrap();
        assert_eq!(lists, vec![AlternateList::Statistics, AlternateList::Habitats]);
    }

    #[test]
    fn test_parse_selection_rejects_unknown_name() {
        let err = AlternateList::parse_selection(&["countries", "planets"]).unwrap_err();
        assert!(err.contains("planets"));
    }

    #[test]
    fn test_every_list_is_non_empty() {
        for list in AlternateList::ALL {
            assert!(!list.terms().is_empty(), "{list} is empty");
        }
    }
}
