use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::worker::LocalTally;
use crate::metrics::RunMetrics;
use crate::results::WordRecord;

/// The global word → record mapping of one run.
///
/// Counts are independent of the order local tallies are absorbed in. Line
/// numbers are appended in absorb order, so they are only deterministic after
/// [`Aggregation::sort_locations`].
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    records: HashMap<String, WordRecord>,
    total_tokens: u64,
    units_merged: usize,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one worker's local tally into the aggregation.
    ///
    /// New words are moved in; known words add their counts and append
    /// their line numbers per source.
    pub fn absorb(&mut self, local: LocalTally) {
        self.total_tokens += local.tokens();
        self.units_merged += 1;
        for (word, record) in local.into_records() {
            match self.records.entry(word) {
                Entry::Occupied(mut existing) => existing.get_mut().absorb(record),
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
    }

    /// Sorts every word's line numbers ascending
    pub fn sort_locations(&mut self) {
        self.records
            .values_mut()
            .for_each(WordRecord::sort_locations);
    }

    pub fn get(&self, word: &str) -> Option<&WordRecord> {
        self.records.get(word)
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total tokens absorbed
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Sum of all record counts
    pub fn total_count(&self) -> u64 {
        self.records.values().map(|r| r.count).sum()
    }

    /// Number of local tallies absorbed
    pub fn units_merged(&self) -> usize {
        self.units_merged
    }

    pub fn records(&self) -> impl Iterator<Item = &WordRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<WordRecord> {
        self.records.into_values().collect()
    }
}

/// Owns the [`Aggregation`] while workers are running.
///
/// Workers hand in finished local tallies through [`Aggregator::merge`];
/// merges are serialized by a single lock, taken once per completed unit
/// rather than once per token.
#[derive(Debug, Default)]
pub struct Aggregator {
    global: Mutex<Aggregation>,
    metrics: RunMetrics,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: RunMetrics) -> Self {
        Self {
            global: Mutex::new(Aggregation::new()),
            metrics,
        }
    }

    /// Merges a completed worker's tally. Only one merge runs at a time.
    pub fn merge(&self, local: LocalTally) {
        let tokens = local.tokens();
        // A merge either completes or never starts mutating, so the data
        // behind a poisoned lock is still whole.
        let mut global = self.global.lock().unwrap_or_else(PoisonError::into_inner);
        global.absorb(local);
        drop(global);

        self.metrics.record_merge();
        debug!("Merged local tally with {} tokens", tokens);
    }

    /// Number of local tallies merged so far
    pub fn merged_units(&self) -> usize {
        self.global
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .units_merged()
    }

    /// Ends the concurrent phase and hands the aggregation over
    pub fn into_aggregation(self) -> Aggregation {
        self.global
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
