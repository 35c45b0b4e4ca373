//! Exposure ingestion pipeline
//!
//! Discovery, header extraction and insertion into the index, with the
//! `add` / `force` / `replace` duplicate policies.
//!
//! Two phases:
//! - **Parallel extraction**: headers are read on a rayon pool inside
//!   `spawn_blocking`, one file per task.
//! - **Serial insertion**: records are written one at a time from the
//!   orchestrating task, so filename uniqueness is decided by a single writer.
//!
//! Per-file failures during a batch, panics during extraction included, are
//! recorded in the [`IngestReport`] and never abort the batch.

use crate::db::ExposureStore;
use crate::models::ExposureRecord;
use crate::services::file_scanner::FileScanner;
use crate::services::metadata_extractor::MetadataExtractor;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use reftest_common::config::IngestConfig;
use reftest_common::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Duplicate-handling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Skip files whose configuration is already indexed
    Add,
    /// Insert regardless of configuration duplicates
    Force,
    /// Replace an indexed exposure with the same configuration
    Replace,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestMode::Add => "add",
            IngestMode::Force => "force",
            IngestMode::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IngestOutcome {
    Added,
    /// Replaced the named exposure sharing this configuration
    Replaced { old: String },
    /// Force mode overwrote a record with the same filename
    Overwritten,
    /// Configuration already indexed under the named exposure
    SkippedDuplicate { existing: String },
    /// Filename already indexed; headers were not read
    SkippedIndexed,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of a batch ingest
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub added: usize,
    pub replaced: usize,
    pub overwritten: usize,
    pub skipped_duplicate: usize,
    pub skipped_indexed: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Added => self.added += 1,
            IngestOutcome::Replaced { .. } => self.replaced += 1,
            IngestOutcome::Overwritten => self.overwritten += 1,
            IngestOutcome::SkippedDuplicate { .. } => self.skipped_duplicate += 1,
            IngestOutcome::SkippedIndexed => self.skipped_indexed += 1,
        }
    }

    fn fail(&mut self, path: &Path, error: &Error) {
        warn!(file = %path.display(), "Ingest failed: {}", error);
        self.failures.push(IngestFailure {
            path: path.to_path_buf(),
            error: error.to_string(),
        });
    }

    /// Files examined, including failures
    pub fn total(&self) -> usize {
        self.added
            + self.replaced
            + self.overwritten
            + self.skipped_duplicate
            + self.skipped_indexed
            + self.failures.len()
    }
}

/// Ingestion pipeline over one exposure store
pub struct IngestPipeline {
    store: ExposureStore,
    extractor: MetadataExtractor,
    scanner: FileScanner,
    mode: IngestMode,
    force_overwrite: bool,
    workers: usize,
}

impl IngestPipeline {
    pub fn new(store: ExposureStore, mode: IngestMode, config: &IngestConfig) -> Self {
        Self {
            store,
            extractor: MetadataExtractor::new(),
            scanner: FileScanner::new(config.suffixes.clone()),
            mode,
            force_overwrite: config.force_overwrite,
            workers: config.workers,
        }
    }

    /// Ingest a single file; every error propagates to the caller
    pub async fn add_file(&self, file_path: &Path) -> Result<IngestOutcome> {
        let filename = basename(file_path);
        if self.short_circuits() && self.store.contains_filename(&filename).await? {
            info!(file = %filename, "Already indexed, skipping");
            return Ok(IngestOutcome::SkippedIndexed);
        }

        let extractor = self.extractor.clone();
        let path = file_path.to_path_buf();
        let record = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))??;

        self.process_record(&record).await
    }

    /// Discover and ingest every exposure under `location`
    pub async fn ingest(&self, location: &Path) -> Result<IngestReport> {
        let start = Instant::now();
        let candidates = self.scanner.scan(location)?;
        let mut report = IngestReport {
            started_at: Some(Utc::now()),
            ..IngestReport::default()
        };

        // Filename-only checks first: cheap, and spares header reads
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(candidates.len());
        for path in candidates {
            let filename = basename(&path);
            if !seen.insert(filename.clone()) {
                warn!(file = %path.display(), "Duplicate filename within batch, skipping");
                report.record(&IngestOutcome::SkippedIndexed);
                continue;
            }
            if self.short_circuits() && self.store.contains_filename(&filename).await? {
                debug!(file = %filename, "Already indexed, skipping");
                report.record(&IngestOutcome::SkippedIndexed);
                continue;
            }
            pending.push(path);
        }

        info!(
            "Extracting headers from {} files ({} already indexed)",
            pending.len(),
            report.skipped_indexed
        );

        let extracted = self.extract_parallel(pending).await?;

        for (path, result) in extracted {
            let outcome = match result {
                Ok(record) => self.process_record(&record).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(outcome) => report.record(&outcome),
                Err(e) => report.fail(&path, &e),
            }
        }

        report.finished_at = Some(Utc::now());
        info!(
            mode = %self.mode,
            "Ingest of {} files complete in {:?} | Added: {} | Replaced: {} | Overwritten: {} | Duplicates: {} | Indexed: {} | Failed: {}",
            report.total(),
            start.elapsed(),
            report.added,
            report.replaced,
            report.overwritten,
            report.skipped_duplicate,
            report.skipped_indexed,
            report.failures.len()
        );

        Ok(report)
    }

    /// Read headers of `paths` on a rayon pool, preserving input order
    async fn extract_parallel(
        &self,
        paths: Vec<PathBuf>,
    ) -> Result<Vec<(PathBuf, Result<ExposureRecord>)>> {
        let extractor = self.extractor.clone();
        let workers = self.workers;

        tokio::task::spawn_blocking(move || -> Result<Vec<(PathBuf, Result<ExposureRecord>)>> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| Error::Internal(format!("Cannot build worker pool: {}", e)))?;

            Ok(pool.install(|| {
                paths
                    .into_par_iter()
                    .map(|path| {
                        let record = extract_isolated(&extractor, &path);
                        (path, record)
                    })
                    .collect()
            }))
        })
        .await
        .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))?
    }

    /// Apply the duplicate policy to one extracted record
    pub async fn process_record(&self, record: &ExposureRecord) -> Result<IngestOutcome> {
        match self.mode {
            IngestMode::Add => {
                let configuration = record.configuration();
                if self.store.exists(record.family, &configuration).await? > 0 {
                    let existing = self
                        .store
                        .find(record.family, &configuration)
                        .await?
                        .into_iter()
                        .next()
                        .map(|r| r.filename)
                        .unwrap_or_default();
                    warn!(
                        file = %record.filename,
                        existing = %existing,
                        "Configuration already indexed, skipping"
                    );
                    return Ok(IngestOutcome::SkippedDuplicate { existing });
                }
                self.store.insert(record).await?;
                info!(file = %record.filename, "Added");
                Ok(IngestOutcome::Added)
            }
            IngestMode::Replace => {
                let configuration = record.configuration();
                match self.store.find(record.family, &configuration).await?.first() {
                    Some(existing) => {
                        self.store.replace(&existing.filename, record).await?;
                        info!(file = %record.filename, old = %existing.filename, "Replaced");
                        Ok(IngestOutcome::Replaced {
                            old: existing.filename.clone(),
                        })
                    }
                    None => {
                        self.store.insert(record).await?;
                        info!(file = %record.filename, "Added");
                        Ok(IngestOutcome::Added)
                    }
                }
            }
            IngestMode::Force if self.force_overwrite => {
                let existed = self.store.contains_filename(&record.filename).await?;
                self.store.upsert(record).await?;
                if existed {
                    info!(file = %record.filename, "Overwritten");
                    Ok(IngestOutcome::Overwritten)
                } else {
                    info!(file = %record.filename, "Added");
                    Ok(IngestOutcome::Added)
                }
            }
            IngestMode::Force => {
                self.store.insert(record).await?;
                info!(file = %record.filename, "Added");
                Ok(IngestOutcome::Added)
            }
        }
    }

    /// Force mode reaches the store even for indexed filenames
    fn short_circuits(&self) -> bool {
        self.mode != IngestMode::Force
    }
}

/// Extract one file; a panic becomes that file's error
fn extract_isolated(extractor: &MetadataExtractor, path: &Path) -> Result<ExposureRecord> {
    catch_unwind(AssertUnwindSafe(|| extractor.extract(path))).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(Error::parse(path, format!("extraction panicked: {}", reason)))
    })
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
