//! Ingestion pipeline orchestration.
//!
//! Coordinates the full run: discovery → change detection against the
//! manifest → (per file) stale-chunk deletion → PDF extraction → splitting →
//! de-duplication → embedding and storage → manifest update. Files are
//! processed one at a time, in discovery order.
//!
//! A file that fails to load, embed, or store is logged, reported, and left
//! out of the manifest so the next run retries it; the rest of the batch
//! continues. The manifest is written once, at the end of the run.

use anyhow::Result;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::dedup::ChunkDeduplicator;
use crate::discovery;
use crate::extract;
use crate::index::VectorIndex;
use crate::manifest::{hash_file, manifest_key, Manifest};
use crate::models::DiscoveredFile;
use crate::progress::{format_number, IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::splitter::TextSplitter;
use crate::store::DeleteOutcome;

pub const NO_PDFS_MESSAGE: &str = "No PDFs found in KB folders.";
pub const NOTHING_TO_INGEST_MESSAGE: &str = "No new or modified PDFs detected. Nothing to ingest.";

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Ignore the manifest and treat every file as changed.
    pub full: bool,
    /// Plan only; touch neither the store nor the manifest.
    pub dry_run: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    NoFiles,
    NothingChanged,
    DryRun,
    Completed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub outcome: RunOutcome,
    pub files_found: usize,
    pub files_to_ingest: usize,
    pub files_ingested: usize,
    pub chunks_created: u64,
    pub chunks_stored: u64,
    pub duplicates_skipped: u64,
    pub tokens_est: u64,
    pub failed: Vec<FailedFile>,
    /// Files that would be ingested; filled for dry runs.
    pub planned: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl IngestReport {
    fn new(outcome: RunOutcome, files_found: usize) -> Self {
        Self {
            outcome,
            files_found,
            files_to_ingest: 0,
            files_ingested: 0,
            chunks_created: 0,
            chunks_stored: 0,
            duplicates_skipped: 0,
            tokens_est: 0,
            failed: Vec::new(),
            planned: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// A changed or new file, with the manifest key and digest it will be
/// recorded under once stored.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub file: DiscoveredFile,
    pub key: String,
    pub hash: String,
}

/// Result of discovery plus change detection.
#[derive(Debug)]
pub struct IngestPlan {
    pub files_found: usize,
    pub pending: Vec<PlannedFile>,
    /// Files that could not be hashed; reported as failures.
    pub unreadable: Vec<FailedFile>,
    pub manifest: Manifest,
}

/// Discovers PDFs and keeps those whose content changed since the last run.
pub fn plan(config: &Config, full: bool) -> Result<IngestPlan> {
    let files = discovery::discover(&config.paths)?;
    let manifest = Manifest::load(&config.paths.manifest);

    let mut pending = Vec::new();
    let mut unreadable = Vec::new();
    for file in &files {
        let hashed = manifest_key(&file.path).and_then(|key| Ok((key, hash_file(&file.path)?)));
        match hashed {
            Ok((key, hash)) => {
                if full || !manifest.is_current(&key, &hash) {
                    pending.push(PlannedFile {
                        file: file.clone(),
                        key,
                        hash,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "cannot hash file");
                unreadable.push(FailedFile {
                    path: file.path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(IngestPlan {
        files_found: files.len(),
        pending,
        unreadable,
        manifest,
    })
}

/// Runs a complete ingestion against the given index.
pub async fn ingest(
    config: &Config,
    index: &VectorIndex,
    options: IngestOptions,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let started = Instant::now();
    progress.report(IngestProgressEvent::Scanning);
    let plan = plan(config, options.full)?;

    if let Some(mut report) = early_exit(&plan, options) {
        report.elapsed = started.elapsed();
        return Ok(report);
    }

    let mut report = execute(config, plan, index, progress).await?;
    report.elapsed = started.elapsed();
    Ok(report)
}

/// Report for runs that stop before touching the store, if this one does.
fn early_exit(plan: &IngestPlan, options: IngestOptions) -> Option<IngestReport> {
    if plan.files_found == 0 {
        return Some(IngestReport::new(RunOutcome::NoFiles, 0));
    }
    if plan.pending.is_empty() && plan.unreadable.is_empty() {
        return Some(IngestReport::new(
            RunOutcome::NothingChanged,
            plan.files_found,
        ));
    }
    if options.dry_run {
        let mut report = IngestReport::new(RunOutcome::DryRun, plan.files_found);
        report.files_to_ingest = plan.pending.len();
        report.planned = plan
            .pending
            .iter()
            .map(|p| format!("{} [{}:{}]", p.key, p.file.scope, p.file.org_id))
            .collect();
        report.failed = plan.unreadable.clone();
        return Some(report);
    }
    None
}

/// Processes every pending file and persists the manifest.
pub async fn execute(
    config: &Config,
    plan: IngestPlan,
    index: &VectorIndex,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let mut dedup = ChunkDeduplicator::new();
    let mut manifest = plan.manifest;

    let mut report = IngestReport::new(RunOutcome::Completed, plan.files_found);
    report.files_to_ingest = plan.pending.len();
    report.failed = plan.unreadable;

    let total = plan.pending.len() as u64;
    for (i, planned) in plan.pending.into_iter().enumerate() {
        let name = planned.file.file_name();
        progress.report(IngestProgressEvent::File {
            n: i as u64 + 1,
            total,
            name: name.clone(),
        });

        match ingest_file(&planned, index, &splitter, &mut dedup).await {
            Ok(counts) => {
                tracing::info!(
                    file = %name,
                    org_id = %planned.file.org_id,
                    created = counts.created,
                    stored = counts.stored,
                    duplicates = counts.duplicates,
                    "ingested"
                );
                report.files_ingested += 1;
                report.chunks_created += counts.created;
                report.chunks_stored += counts.stored;
                report.duplicates_skipped += counts.duplicates;
                report.tokens_est += counts.tokens_est;
                manifest.record(planned.key, planned.hash);
                progress.report(IngestProgressEvent::FileDone {
                    name,
                    stored: counts.stored,
                });
            }
            Err(e) => {
                tracing::warn!(file = %planned.key, error = %e, "ingestion failed; will retry next run");
                progress.report(IngestProgressEvent::FileFailed {
                    name,
                    error: e.to_string(),
                });
                report.failed.push(FailedFile {
                    path: planned.key,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    if report.files_ingested > 0 {
        manifest.save(&config.paths.manifest)?;
    }

    Ok(report)
}

#[derive(Debug, Default)]
struct FileCounts {
    created: u64,
    stored: u64,
    duplicates: u64,
    tokens_est: u64,
}

async fn ingest_file(
    planned: &PlannedFile,
    index: &VectorIndex,
    splitter: &TextSplitter,
    dedup: &mut ChunkDeduplicator,
) -> Result<FileCounts> {
    let name = planned.file.file_name();

    match index.delete_source(&name).await {
        Ok(DeleteOutcome::Deleted(n)) => {
            tracing::info!(file = %name, deleted = n, "removed stale chunks")
        }
        Ok(DeleteOutcome::NothingToDelete) => {}
        Err(e) => tracing::warn!(file = %name, error = %e, "could not delete stale chunks"),
    }

    let path = planned.file.path.clone();
    let pages = tokio::task::spawn_blocking(move || extract::load_pdf(&path)).await??;

    let chunks = splitter.split_document(&planned.file, &planned.key, &pages);
    let created = chunks.len() as u64;
    let batch = dedup.filter(chunks);
    let stored = index.add_documents(&batch.unique).await?;

    Ok(FileCounts {
        created,
        stored,
        duplicates: batch.duplicates,
        tokens_est: batch.tokens_est,
    })
}

/// `kb ingest`: plans, runs and prints the summary to stdout.
pub async fn run_ingest(config: &Config, options: IngestOptions, mode: ProgressMode) -> Result<()> {
    let started = Instant::now();
    let progress = mode.reporter();
    progress.report(IngestProgressEvent::Scanning);
    let plan = plan(config, options.full)?;

    let report = match early_exit(&plan, options) {
        Some(report) => report,
        None => {
            let index = VectorIndex::open(config).await?;
            execute(config, plan, &index, progress.as_ref()).await?
        }
    };

    print_report(&report, started.elapsed());
    Ok(())
}

fn print_report(report: &IngestReport, elapsed: Duration) {
    match report.outcome {
        RunOutcome::NoFiles => {
            println!("{}", NO_PDFS_MESSAGE);
            return;
        }
        RunOutcome::NothingChanged => {
            println!("{}", NOTHING_TO_INGEST_MESSAGE);
            return;
        }
        RunOutcome::DryRun => {
            println!("ingest (dry-run)");
            println!("  files found: {}", report.files_found);
            println!("  files to ingest: {}", report.files_to_ingest);
            for path in &report.planned {
                println!("    {}", path);
            }
            print_failures(report);
            return;
        }
        RunOutcome::Completed => {}
    }

    println!("ingest");
    println!("  files found: {}", report.files_found);
    println!("  files to ingest: {}", report.files_to_ingest);
    println!("  files ingested: {}", report.files_ingested);
    println!("  chunks created: {}", format_number(report.chunks_created));
    println!("  chunks stored: {}", format_number(report.chunks_stored));
    println!(
        "  duplicates skipped: {}",
        format_number(report.duplicates_skipped)
    );
    println!("  estimated tokens: {}", format_number(report.tokens_est));
    print_failures(report);
    println!("  elapsed: {:.2}s", elapsed.as_secs_f64());
    if report.failed.is_empty() {
        println!("ok");
    }
}

fn print_failures(report: &IngestReport) {
    if report.failed.is_empty() {
        return;
    }
    println!("  failed files: {}", report.failed.len());
    for f in &report.failed {
        println!("    {}: {}", f.path, f.error);
    }
}
