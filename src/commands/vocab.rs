//! `aparts vocab`: build a consensus vocabulary from a bibliography.

use std::path::Path;

use anyhow::{Context, Result, bail};
use aparts_core::export::write_vocabulary_csv;
use aparts_core::record::read_bibtex_file;
use aparts_core::tracker::CandidateStore;
use aparts_core::{Database, ExtractorSet, RecordCache, build_vocabulary};
use tracing::{info, warn};

use super::resolve_config;
use crate::cli::VocabArgs;

pub async fn run_vocab_command(args: &VocabArgs, config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path, |file| args.overrides(file))?;

    let import = read_bibtex_file(&args.bib)?;
    for skipped in &import.skipped {
        warn!(bib = %args.bib.display(), "{skipped}");
    }
    if import.records.is_empty() {
        bail!(
            "No usable entries in '{}' ({} found, {} skipped)\n  \
             Suggestion: Export the library as BibTeX with abstracts included",
            args.bib.display(),
            import.total_found,
            import.skipped.len()
        );
    }
    info!(
        records = import.records.len(),
        skipped = import.skipped.len(),
        "bibliography loaded"
    );

    let extractors = ExtractorSet::with_algorithms(&config.algorithms);
    let cache = match &config.state_db {
        Some(path) => Some(RecordCache::new(Database::new(path).await.with_context(
            || format!("Failed to open state database '{}'", path.display()),
        )?)),
        None => None,
    };

    let report = build_vocabulary(
        &import.records,
        &extractors,
        &config.vocabulary,
        cache.as_ref().map(|cache| cache as &dyn CandidateStore),
    )
    .await?;

    for pair in &report.merged {
        info!(merged = %pair.merged, into = %pair.into, "conjugation folded");
    }

    report.vocabulary.save(&args.out)?;
    if let Some(export) = &args.export {
        write_vocabulary_csv(export, &report.vocabulary)?;
    }

    println!(
        "Vocabulary: {} terms from {} records ({} extracted, {} cached, {} without text)",
        report.vocabulary.len(),
        report.records_total,
        report.records_extracted,
        report.records_cached,
        report.records_without_text
    );
    if !report.merged.is_empty() {
        println!("Folded {} conjugated terms", report.merged.len());
    }
    println!("Saved to {}", args.out.display());
    Ok(())
}
