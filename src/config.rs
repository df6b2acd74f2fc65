//! Configuration loading and validation.
//!
//! Settings come from a TOML file, are overridden by command-line flags, and
//! are then validated into a [`TaggerConfig`] before any record or document
//! is touched. The file is found in this order:
//!
//! 1. an explicit `--config` path (which must exist)
//! 2. `$XDG_CONFIG_HOME/aparts/config.toml`
//! 3. `$HOME/.config/aparts/config.toml`
//!
//! A missing default file means built-in defaults.
//!
//! ```toml
//! alternate_lists = ["continents", "habitats"]
//! threshold = 3
//! agreement_range = { min = 2, max = 5 }
//! algorithms = ["rake", "yake", "text_rank"]
//!
//! [section_weights]
//! abstract = 5
//! references = 0
//!
//! [section_patterns]
//! methods = ["methods?", "study design"]
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::consensus::{AgreementRange, AgreementScope, ConsensusError};
use crate::extract::{Algorithm, DEFAULT_TOP_K};
use crate::pipeline::VocabularyOptions;
use crate::section::{SectionError, SectionLabel, SectionPatterns, SectionSegmenter, SectionWeights};
use crate::tagging::TaggingOptions;
use crate::vocabulary::{AlternateList, VocabularyError, load_keyword_file};

/// Directory name under the user config directory.
const CONFIG_DIR: &str = "aparts";
const CONFIG_FILE: &str = "config.toml";

/// Configuration errors, all raised before processing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("config file '{path}' does not exist")]
    Missing { path: PathBuf },

    #[error("invalid config value for `{field}`: {value}\n  Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("invalid `agreement_range`: {0}")]
    Agreement(#[from] ConsensusError),

    #[error("invalid `section_patterns`: {0}")]
    SectionPattern(#[from] SectionError),

    #[error("cannot load keyword file: {0}")]
    KeywordFile(#[from] VocabularyError),
}

impl ConfigError {
    fn invalid(field: &str, value: impl ToString, expected: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// Either one name or a list of names, so `alternate_lists = "all"` works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl NameList {
    fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

/// Agreement bounds as written in the file; validated into [`AgreementRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAgreementRange {
    pub min: i64,
    pub max: i64,
}

/// The configuration file as written, before validation.
///
/// Every field is optional; integers are signed so negative values reach
/// validation and get a proper message instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_lists: Option<NameList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_range: Option<RawAgreementRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_author_keywords: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_existing_tags: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_conjugations: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyword_files: Vec<PathBuf>,
    /// State database holding the processed set and record cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_db: Option<PathBuf>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub section_weights: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub section_patterns: BTreeMap<String, Vec<String>>,
}

/// Where the raw configuration came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, whether or not it exists.
    pub path: Option<PathBuf>,
    pub config: RawConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(CONFIG_DIR).join(CONFIG_FILE));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if it exists.
///
/// # Errors
/// Returns [`ConfigError`] when an explicit file is missing, or a file cannot
/// be read or parsed.
#[instrument]
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: RawConfig::from_file(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default) if default.exists() => Ok(LoadedConfig {
            config: RawConfig::from_file(default)?,
            path,
            loaded_from_file: true,
        }),
        _ => {
            debug!("no config file, using defaults");
            Ok(LoadedConfig {
                path,
                config: RawConfig::default(),
                loaded_from_file: false,
            })
        }
    }
}

impl RawConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Applies `overrides` on top of `self`: every value set in `overrides`
    /// wins, keyword files and per-label maps are merged.
    #[must_use]
    pub fn overridden_by(mut self, overrides: RawConfig) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if overrides.$field.is_some() {
                    self.$field = overrides.$field;
                })*
            };
        }
        take!(
            alternate_lists,
            weighted,
            threshold,
            agreement_range,
            agreement_scope,
            top_k,
            algorithms,
            include_author_keywords,
            include_existing_tags,
            merge_conjugations,
            state_db
        );
        for file in overrides.keyword_files {
            if !self.keyword_files.contains(&file) {
                self.keyword_files.push(file);
            }
        }
        self.section_weights.extend(overrides.section_weights);
        self.section_patterns.extend(overrides.section_patterns);
        self
    }

    /// Validates every value and resolves names into typed settings.
    ///
    /// Keyword files are read here so a missing file stops the run before
    /// any processing.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<TaggerConfig, ConfigError> {
        let threshold = match self.threshold {
            None => TaggingOptions::default().threshold,
            Some(value) => u32::try_from(value)
                .map_err(|_| ConfigError::invalid("threshold", value, "an integer >= 0"))?,
        };

        let agreement_range = match self.agreement_range {
            None => AgreementRange::default(),
            Some(RawAgreementRange { min, max }) => {
                let to_count = |field: &str, value: i64| {
                    usize::try_from(value)
                        .map_err(|_| ConfigError::invalid(field, value, "an integer >= 1"))
                };
                AgreementRange::new(
                    to_count("agreement_range.min", min)?,
                    to_count("agreement_range.max", max)?,
                )?
            }
        };

        let agreement_scope = match &self.agreement_scope {
            None => AgreementScope::default(),
            Some(name) => name
                .parse()
                .map_err(|_| ConfigError::invalid("agreement_scope", name, "corpus or document"))?,
        };

        let top_k = match self.top_k {
            None => DEFAULT_TOP_K,
            Some(value) => usize::try_from(value)
                .ok()
                .filter(|top_k| *top_k >= 1)
                .ok_or_else(|| ConfigError::invalid("top_k", value, "an integer >= 1"))?,
        };

        let algorithms = match &self.algorithms {
            None => Algorithm::ALL.to_vec(),
            Some(names) if names.is_empty() => {
                return Err(ConfigError::invalid(
                    "algorithms",
                    "[]",
                    "at least one algorithm",
                ));
            }
            Some(names) => names
                .iter()
                .map(|name| {
                    name.parse::<Algorithm>().map_err(|_| {
                        ConfigError::invalid("algorithms", name, expected_names(&Algorithm::ALL))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let alternate_lists = match &self.alternate_lists {
            None => Vec::new(),
            Some(names) => AlternateList::parse_selection(names.names()).map_err(|message| {
                ConfigError::invalid(
                    "alternate_lists",
                    message,
                    format!("all, or {}", expected_names(&AlternateList::ALL)),
                )
            })?,
        };

        let mut weights = SectionWeights::default();
        for (name, value) in &self.section_weights {
            let label = parse_label(&format!("section_weights.{name}"), name)?;
            let weight = u32::try_from(*value).map_err(|_| {
                ConfigError::invalid(&format!("section_weights.{name}"), value, "an integer >= 0")
            })?;
            weights.set(label, weight);
        }

        let mut section_patterns = SectionPatterns::default();
        for (name, patterns) in &self.section_patterns {
            let label = parse_label(&format!("section_patterns.{name}"), name)?;
            if label == SectionLabel::Other {
                return Err(ConfigError::invalid(
                    "section_patterns",
                    name,
                    "a label other than `other`, which has no heading",
                ));
            }
            section_patterns.set(label, patterns.clone());
        }
        let segmenter = SectionSegmenter::new(&section_patterns)?;

        let mut keyword_terms = Vec::new();
        for file in &self.keyword_files {
            keyword_terms.extend(load_keyword_file(file)?);
        }

        let defaults = VocabularyOptions::default();
        Ok(TaggerConfig {
            algorithms,
            vocabulary: VocabularyOptions {
                agreement_range,
                agreement_scope,
                top_k,
                include_author_keywords: self
                    .include_author_keywords
                    .unwrap_or(defaults.include_author_keywords),
                include_existing_tags: self
                    .include_existing_tags
                    .unwrap_or(defaults.include_existing_tags),
                alternate_lists,
                keyword_terms,
                merge_conjugations: self.merge_conjugations.unwrap_or(defaults.merge_conjugations),
            },
            tagging: TaggingOptions {
                threshold,
                weighted: self.weighted.unwrap_or(true),
                weights,
            },
            section_patterns,
            segmenter,
            keyword_files: self.keyword_files.clone(),
            state_db: self.state_db.clone(),
        })
    }
}

fn parse_label(field: &str, name: &str) -> Result<SectionLabel, ConfigError> {
    name.parse()
        .map_err(|_| ConfigError::invalid(field, name, expected_names(&SectionLabel::ALL)))
}

fn expected_names<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validated settings for vocabulary builds and tagging runs.
#[derive(Debug, Clone)]
pub struct TaggerConfig {
    pub algorithms: Vec<Algorithm>,
    pub vocabulary: VocabularyOptions,
    pub tagging: TaggingOptions,
    pub section_patterns: SectionPatterns,
    pub segmenter: SectionSegmenter,
    pub keyword_files: Vec<PathBuf>,
    pub state_db: Option<PathBuf>,
}

impl TaggerConfig {
    /// The settings written back in file form, with every default spelled out.
    #[must_use]
    pub fn to_raw(&self) -> RawConfig {
        let vocabulary = &self.vocabulary;
        let to_i64 = |value: usize| i64::try_from(value).unwrap_or(i64::MAX);
        RawConfig {
            alternate_lists: Some(NameList::Many(
                vocabulary
                    .alternate_lists
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            )),
            weighted: Some(self.tagging.weighted),
            threshold: Some(i64::from(self.tagging.threshold)),
            agreement_range: Some(RawAgreementRange {
                min: to_i64(vocabulary.agreement_range.min()),
                max: to_i64(vocabulary.agreement_range.max()),
            }),
            agreement_scope: Some(vocabulary.agreement_scope.to_string()),
            top_k: Some(to_i64(vocabulary.top_k)),
            algorithms: Some(self.algorithms.iter().map(ToString::to_string).collect()),
            include_author_keywords: Some(vocabulary.include_author_keywords),
            include_existing_tags: Some(vocabulary.include_existing_tags),
            merge_conjugations: Some(vocabulary.merge_conjugations),
            keyword_files: self.keyword_files.clone(),
            state_db: self.state_db.clone(),
            section_weights: self
                .tagging
                .weights
                .iter()
                .map(|(label, weight)| (label.to_string(), i64::from(weight)))
                .collect(),
            section_patterns: self
                .section_patterns
                .iter()
                .map(|(label, patterns)| (label.to_string(), patterns.to_vec()))
                .collect(),
        }
    }

    /// Renders [`Self::to_raw`] as TOML.
    ///
    /// # Errors
    /// Returns the serializer error; the raw form always serializes in practice.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.to_raw())
    }
}
