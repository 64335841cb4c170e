//! Bounded-parallel file-system scanner.
//!
//! One walker on the calling thread feeds discovered file paths into a
//! bounded channel; a fixed number of workers on a dedicated rayon pool each
//! take a path, run the whole detection pipeline for it, and send the result
//! back. Result order is not defined.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::error::{DetectorError, Result};
use crate::pipeline::Registry;
use crate::types::{DetectorOptions, FormatSummary, RecognizedFile};

/// Queued paths per worker before the walker waits.
const PATHS_PER_WORKER: usize = 64;

/// Scanner configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Number of files processed concurrently.
    pub workers: usize,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            recursive: false,
            follow_links: false,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DetectorError::config("worker count must be at least 1"));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// One entry per file examined, in no particular order.
    pub files: Vec<RecognizedFile>,
    /// The scan stopped early on request.
    pub cancelled: bool,
    /// Entries skipped for lack of permission.
    pub skipped: usize,
}

impl ScanReport {
    /// Count of files per distinct summary, most frequent first.
    pub fn histogram(&self) -> Vec<(FormatSummary, usize)> {
        let mut counts: HashMap<&FormatSummary, usize> = HashMap::new();
        for file in &self.files {
            *counts.entry(&file.summary).or_insert(0) += 1;
        }
        let mut rows: Vec<_> = counts
            .into_iter()
            .map(|(summary, count)| (summary.clone(), count))
            .collect();
        rows.sort_by(|(a, ca), (b, cb)| {
            cb.cmp(ca).then_with(|| a.to_string().cmp(&b.to_string()))
        });
        rows
    }

    pub fn recognized(&self) -> usize {
        self.files.iter().filter(|f| !f.summary.is_unknown()).count()
    }

    pub fn unrecognized(&self) -> usize {
        self.files.len() - self.recognized()
    }

    /// Sort files by path, for stable output.
    pub fn sort_by_path(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Parallel file-system scanner over a shared detector registry.
#[derive(Debug)]
pub struct Scanner {
    registry: Registry,
    detector_options: DetectorOptions,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(registry: Registry, detector_options: DetectorOptions, options: ScanOptions) -> Self {
        Self {
            registry,
            detector_options,
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Walk `paths` and identify every file found.
    ///
    /// A file that fails detection is recorded as unrecognized with its fault
    /// attached; it never aborts the scan.
    pub fn scan(&self, paths: &[PathBuf], cancel: &CancellationToken) -> Result<ScanReport> {
        self.options.validate()?;
        self.detector_options.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| DetectorError::config(format!("cannot start worker pool: {}", e)))?;

        let (path_tx, path_rx) =
            crossbeam_channel::bounded::<PathBuf>(self.options.workers * PATHS_PER_WORKER);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<RecognizedFile>();
        let skipped = AtomicUsize::new(0);

        pool.in_place_scope(|scope| {
            for _ in 0..self.options.workers {
                let paths = path_rx.clone();
                let results = result_tx.clone();
                let skipped = &skipped;
                scope.spawn(move |_| self.work(&paths, &results, skipped, cancel));
            }
            drop(path_rx);
            // The walk stays on the calling thread, outside the pool; every
            // pool thread is a detection worker.
            self.walk(paths, &path_tx, &result_tx, &skipped, cancel);
            drop(path_tx);
        });
        drop(result_tx);

        let files: Vec<_> = result_rx.into_iter().collect();
        let report = ScanReport {
            files,
            cancelled: cancel.is_cancelled(),
            skipped: skipped.load(Ordering::Relaxed),
        };
        debug!(
            files = report.files.len(),
            skipped = report.skipped,
            cancelled = report.cancelled,
            "scan finished"
        );
        Ok(report)
    }

    fn walk(
        &self,
        roots: &[PathBuf],
        paths: &Sender<PathBuf>,
        results: &Sender<RecognizedFile>,
        skipped: &AtomicUsize,
        cancel: &CancellationToken,
    ) {
        let max_depth = if self.options.recursive { usize::MAX } else { 1 };
        for root in roots {
            let walker = WalkDir::new(root)
                .follow_links(self.options.follow_links)
                .max_depth(max_depth);
            for entry in walker {
                if cancel.is_cancelled() {
                    return;
                }
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        // every worker has stopped
                        if paths.send(entry.into_path()).is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                        let err = DetectorError::Io(io::Error::from(e));
                        if err.is_access_denied() {
                            trace!(path = %path.display(), "access denied, skipping");
                            skipped.fetch_add(1, Ordering::Relaxed);
                        } else {
                            warn!("Error walking {}: {}", path.display(), err);
                            let _ = results.send(RecognizedFile::failed(path, &err));
                        }
                    }
                }
            }
        }
    }

    fn work(
        &self,
        paths: &Receiver<PathBuf>,
        results: &Sender<RecognizedFile>,
        skipped: &AtomicUsize,
        cancel: &CancellationToken,
    ) {
        while let Ok(path) = paths.recv() {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(file) = self.identify(&path, skipped) {
                let _ = results.send(file);
            }
        }
    }

    fn identify(&self, path: &Path, skipped: &AtomicUsize) -> Option<RecognizedFile> {
        match self.registry.recognize(path, &self.detector_options) {
            Ok(file) => Some(file),
            Err(e) if e.is_access_denied() => {
                trace!(path = %path.display(), "access denied, skipping");
                skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                Some(RecognizedFile::failed(path, &e))
            }
        }
    }
}

/// Scan `paths` with the default registry.
pub fn scan_paths(
    paths: &[PathBuf],
    detector_options: DetectorOptions,
    options: ScanOptions,
) -> Result<ScanReport> {
    Scanner::new(Registry::default(), detector_options, options).scan(paths, &CancellationToken::new())
}
