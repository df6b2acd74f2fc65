//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use aparts_core::AgreementRange;
use aparts_core::config::{NameList, RawAgreementRange, RawConfig};
use clap::{Args, Parser, Subcommand};

/// Build a consensus keyword vocabulary from a bibliography and tag
/// academic documents against it.
///
/// Keywords proposed by several extraction algorithms become the vocabulary;
/// documents are then tagged with every term that scores above a threshold,
/// matches in the abstract or discussion counting more than matches elsewhere.
#[derive(Parser, Debug)]
#[command(name = "aparts")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/aparts/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a keyword vocabulary from a BibTeX bibliography
    Vocab(VocabArgs),
    /// Tag a folder of documents against a vocabulary
    Tag(TagArgs),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Args, Debug, Clone)]
pub struct VocabArgs {
    /// BibTeX file with titles and abstracts
    #[arg(long, value_name = "FILE")]
    pub bib: PathBuf,

    /// Extra terms, one per line (repeatable)
    #[arg(long = "keywords-file", value_name = "FILE")]
    pub keywords_files: Vec<PathBuf>,

    /// Predefined lists to add, comma-separated, or `all`
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub alternate_lists: Option<Vec<String>>,

    /// Fewest agreeing algorithms for a keyword to be kept
    #[arg(long, value_name = "N")]
    pub agreement_min: Option<u32>,

    /// Most agreeing algorithms for a keyword to be kept
    #[arg(long, value_name = "N")]
    pub agreement_max: Option<u32>,

    /// Phrases kept per algorithm and record
    #[arg(long, value_name = "N")]
    pub top_k: Option<u32>,

    /// Algorithms to run, comma-separated
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub algorithms: Option<Vec<String>>,

    /// Fold conjugated single-word terms into their longer form
    #[arg(long)]
    pub merge_conjugations: bool,

    /// State database caching extractor outputs per record
    #[arg(long, value_name = "DB")]
    pub state: Option<PathBuf>,

    /// Vocabulary JSON to write
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Also write the vocabulary as CSV
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

impl VocabArgs {
    /// Config values set by these flags, applied over `file`.
    #[must_use]
    pub fn overrides(&self, file: &RawConfig) -> RawConfig {
        let agreement_range = match (self.agreement_min, self.agreement_max) {
            (None, None) => None,
            (min, max) => {
                let base = file.agreement_range.unwrap_or_else(|| {
                    let default = AgreementRange::default();
                    RawAgreementRange {
                        min: i64::try_from(default.min()).unwrap_or(i64::MAX),
                        max: i64::try_from(default.max()).unwrap_or(i64::MAX),
                    }
                });
                Some(RawAgreementRange {
                    min: min.map_or(base.min, i64::from),
                    max: max.map_or(base.max, i64::from),
                })
            }
        };
        RawConfig {
            alternate_lists: self.alternate_lists.clone().map(NameList::Many),
            agreement_range,
            top_k: self.top_k.map(i64::from),
            algorithms: self.algorithms.clone(),
            merge_conjugations: self.merge_conjugations.then_some(true),
            keyword_files: self.keywords_files.clone(),
            state_db: self.state.clone(),
            ..RawConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    /// Vocabulary JSON written by `aparts vocab`
    #[arg(long, value_name = "FILE")]
    pub vocab: PathBuf,

    /// Folder of PDF and text documents, searched recursively
    #[arg(long, value_name = "DIR")]
    pub docs: PathBuf,

    /// Bibliography to enrich with generated tags
    #[arg(long, value_name = "FILE")]
    pub bib: Option<PathBuf>,

    /// Minimum weighted score for a tag
    #[arg(long, value_name = "N")]
    pub threshold: Option<u32>,

    /// Count every match once, whatever its section
    #[arg(long)]
    pub unweighted: bool,

    /// State database of processed documents (default: <out-dir>/aparts-state.db)
    #[arg(long, value_name = "DB")]
    pub state: Option<PathBuf>,

    /// Directory for tags.csv, documents.csv and the other exports
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,
}

impl TagArgs {
    /// Config values set by these flags.
    #[must_use]
    pub fn overrides(&self) -> RawConfig {
        RawConfig {
            threshold: self.threshold.map(i64::from),
            weighted: self.unweighted.then_some(false),
            state_db: self.state.clone(),
            ..RawConfig::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["aparts", "-vv", "config", "show"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["aparts", "config", "show", "-q", "--config", "a.toml"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Cli::try_parse_from(["aparts"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["aparts", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_vocab_args_parse_lists_and_repeated_files() {
        let cli = Cli::try_parse_from([
            "aparts",
            "vocab",
            "--bib",
            "library.bib",
            "--keywords-file",
            "a.txt",
            "--keywords-file",
            "b.txt",
            "--alternate-lists",
            "continents,habitats",
            "--out",
            "vocabulary.json",
        ])
        .unwrap();
        let Command::Vocab(args) = cli.command else {
            panic!("expected vocab command");
        };
        assert_eq!(args.keywords_files.len(), 2);
        assert_eq!(
            args.alternate_lists,
            Some(vec!["continents".to_string(), "habitats".to_string()])
        );
    }

    #[test]
    fn test_vocab_overrides_keep_file_bound_not_given() {
        let cli = Cli::try_parse_from([
            "aparts", "vocab", "--bib", "l.bib", "--out", "v.json", "--agreement-max", "6",
        ])
        .unwrap();
        let Command::Vocab(args) = cli.command else {
            panic!("expected vocab command");
        };
        let file = RawConfig {
            agreement_range: Some(RawAgreementRange { min: 3, max: 4 }),
            ..RawConfig::default()
        };
        let overrides = args.overrides(&file);
        assert_eq!(
            overrides.agreement_range,
            Some(RawAgreementRange { min: 3, max: 6 })
        );
        assert!(overrides.merge_conjugations.is_none());
    }

    #[test]
    fn test_tag_args_overrides() {
        let cli = Cli::try_parse_from([
            "aparts",
            "tag",
            "--vocab",
            "v.json",
            "--docs",
            "papers",
            "--out-dir",
            "out",
            "--threshold",
            "3",
            "--unweighted",
        ])
        .unwrap();
        let Command::Tag(args) = cli.command else {
            panic!("expected tag command");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.threshold, Some(3));
        assert_eq!(overrides.weighted, Some(false));
    }

    #[test]
    fn test_tag_negative_threshold_rejected() {
        let result = Cli::try_parse_from([
            "aparts", "tag", "--vocab", "v.json", "--docs", "d", "--out-dir", "o", "--threshold",
            "-1",
        ]);
        assert!(result.is_err());
    }
}
