//! `aparts tag`: tag a folder of documents and write the exports.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use aparts_core::export::{
    DOCUMENTS_FILE, FAILURES_FILE, RECORDS_FILE, TAG_COUNTS_FILE, TAGS_FILE, write_document_table,
    write_failures, write_records_jsonl, write_tag_counts, write_tag_triples,
};
use aparts_core::record::{Record, read_bibtex_file, write_bibtex_file};
use aparts_core::{
    AutoTextSource, Database, DocumentOutcome, RunReport, SqliteProcessedSet, TaggingEngine,
    TaggingRun, Vocabulary, collect_documents, enrich_records,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::resolve_config;
use crate::ProcessExit;
use crate::cli::TagArgs;

const STATE_FILE: &str = "aparts-state.db";
/// Enriched bibliography written next to the other exports when `--bib` is given.
const ENRICHED_BIB_FILE: &str = "records.bib";

pub async fn run_tag_command(
    args: &TagArgs,
    config_path: Option<&Path>,
    quiet: bool,
) -> Result<ProcessExit> {
    let config = resolve_config(config_path, |_| args.overrides())?;

    let vocabulary = Vocabulary::load(&args.vocab)?;
    let records = match &args.bib {
        Some(bib) => {
            let import = read_bibtex_file(bib)?;
            for skipped in &import.skipped {
                warn!(bib = %bib.display(), "{skipped}");
            }
            Some(import.records)
        }
        None => None,
    };

    let documents = collect_documents(&args.docs)
        .with_context(|| format!("Failed to list documents in '{}'", args.docs.display()))?;
    if documents.is_empty() {
        warn!(folder = %args.docs.display(), "no PDF or text documents found");
    }

    std::fs::create_dir_all(&args.out_dir).with_context(|| {
        format!("Failed to create output directory '{}'", args.out_dir.display())
    })?;
    let state_path = config
        .state_db
        .clone()
        .unwrap_or_else(|| args.out_dir.join(STATE_FILE));
    let db = Database::new(&state_path)
        .await
        .with_context(|| format!("Failed to open state database '{}'", state_path.display()))?;
    let processed = SqliteProcessedSet::new(db.clone());

    let engine = TaggingEngine::new(&vocabulary, config.segmenter.clone(), config.tagging.clone())?;
    let source = AutoTextSource::default();

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let progress = progress_bar(documents.len(), quiet);
    let report = TaggingRun::new(&engine, &source, &processed)
        .run_with_observer(&documents, &interrupted, |document, outcome| {
            if let Some(bar) = &progress {
                let verb = match outcome {
                    DocumentOutcome::Tagged(_) => "tagged",
                    DocumentOutcome::Reused(_) => "reused",
                    DocumentOutcome::Failed(_) => "failed",
                };
                bar.set_message(format!("{verb} {}", document.id));
                bar.inc(1);
            }
        })
        .await?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    db.close().await;

    write_exports(&args.out_dir, &report, records)?;
    print_summary(&report, &args.out_dir);

    if report.interrupted {
        warn!(
            tagged = report.newly_tagged,
            total = documents.len(),
            "Interrupted. Run again to resume."
        );
    }
    Ok(if report.is_success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    })
}

fn progress_bar(total: usize, quiet: bool) -> Option<ProgressBar> {
    if quiet || !io::stderr().is_terminal() || is_dumb_terminal() {
        return None;
    }
    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    Some(bar)
}

fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

fn write_exports(out_dir: &Path, report: &RunReport, records: Option<Vec<Record>>) -> Result<()> {
    let path = |name: &str| -> PathBuf { out_dir.join(name) };

    write_tag_triples(&path(TAGS_FILE), &report.results)?;
    write_tag_counts(&path(TAG_COUNTS_FILE), &report.tag_counts())?;
    write_failures(&path(FAILURES_FILE), &report.failures)?;

    let records = match records {
        Some(mut records) => {
            let enriched = enrich_records(&mut records, &report.results);
            info!(enriched, records = records.len(), "records enriched");
            write_records_jsonl(&path(RECORDS_FILE), &records)?;
            write_bibtex_file(&path(ENRICHED_BIB_FILE), &records)?;
            records
        }
        None => Vec::new(),
    };
    write_document_table(&path(DOCUMENTS_FILE), &report.results, &records)?;
    Ok(())
}

fn print_summary(report: &RunReport, out_dir: &Path) {
    println!(
        "Tagged {} new, reused {}, failed {}{}",
        report.newly_tagged,
        report.reused,
        report.failures.len(),
        if report.interrupted { " (interrupted)" } else { "" }
    );
    for failure in &report.failures {
        println!("  {} [{}]: {}", failure.document_id, failure.kind, failure.message);
    }
    println!("Exports written to {}", out_dir.display());
}
