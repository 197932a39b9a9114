use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::tally::source::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Counters shared by every worker of a run. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    // Work metrics
    units_processed: Arc<AtomicU64>,
    lines_scanned: Arc<AtomicU64>,
    tokens_counted: Arc<AtomicU64>,
    merges: Arc<AtomicU64>,
    sources_skipped: Arc<AtomicU64>,

    // Read metrics
    bytes_read: Arc<AtomicU64>,
    small_files_read: Arc<AtomicU64>,
    buffered_files_read: Arc<AtomicU64>,
    mmap_files_read: Arc<AtomicU64>,
}

impl RunMetrics {
    /// Creates a new RunMetrics instance
    pub fn new() -> Self {
        Self {
            units_processed: Arc::new(AtomicU64::new(0)),
            lines_scanned: Arc::new(AtomicU64::new(0)),
            tokens_counted: Arc::new(AtomicU64::new(0)),
            merges: Arc::new(AtomicU64::new(0)),
            sources_skipped: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            small_files_read: Arc::new(AtomicU64::new(0)),
            buffered_files_read: Arc::new(AtomicU64::new(0)),
            mmap_files_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a finished work unit
    pub fn record_unit(&self, lines: u64, tokens: u64) {
        self.units_processed.fetch_add(1, Ordering::Relaxed);
        self.lines_scanned.fetch_add(lines, Ordering::Relaxed);
        self.tokens_counted.fetch_add(tokens, Ordering::Relaxed);
    }

    /// Records one merge into the global aggregation
    pub fn record_merge(&self) {
        let merges = self.merges.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Merged local tally #{}", merges);
    }

    pub fn record_skip(&self) {
        self.sources_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file read and the strategy its size selects
    pub fn record_file_read(&self, size: u64) {
        self.bytes_read.fetch_add(size, Ordering::Relaxed);
        if size < SMALL_FILE_THRESHOLD {
            self.small_files_read.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_read.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files_read.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> RunStats {
        RunStats {
            units_processed: self.units_processed.load(Ordering::Relaxed),
            lines_scanned: self.lines_scanned.load(Ordering::Relaxed),
            tokens_counted: self.tokens_counted.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            sources_skipped: self.sources_skipped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            small_files: self.small_files_read.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_read.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_read.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Tally stats:\n\
             Units processed: {}\n\
             Lines scanned: {}\n\
             Tokens counted: {}\n\
             Merges: {}\n\
             Sources skipped: {}\n\
             Bytes read: {}\n\
             Files read (small/buffered/mmap): {}/{}/{}",
            stats.units_processed,
            stats.lines_scanned,
            stats.tokens_counted,
            stats.merges,
            stats.sources_skipped,
            stats.bytes_read,
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub units_processed: u64,
    pub lines_scanned: u64,
    pub tokens_counted: u64,
    pub merges: u64,
    pub sources_skipped: u64,
    pub bytes_read: u64,
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
}
