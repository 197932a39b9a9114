use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

use super::partition::WorkUnit;
use super::tokenizer::Tokenizer;
use crate::errors::{TallyError, TallyResult};
use crate::metrics::RunMetrics;
use crate::results::{LocationDetail, SourceId, WordRecord};

// Lines between deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Point in time after which outstanding work is abandoned
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Fails with a timeout once the deadline has passed
    pub fn check(&self) -> TallyResult<()> {
        if self.is_expired() {
            Err(TallyError::timeout(self.limit))
        } else {
            Ok(())
        }
    }
}

/// One worker's private partial aggregation
#[derive(Debug, Clone, Default)]
pub struct LocalTally {
    records: HashMap<String, WordRecord>,
    tokens: u64,
    lines: u64,
}

impl LocalTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence of `word` at `line_number` of `source`
    pub fn record(
        &mut self,
        word: String,
        source: &SourceId,
        line_number: usize,
        detail: LocationDetail,
    ) {
        self.tokens += 1;
        match self.records.get_mut(&word) {
            Some(record) => record.record(source, line_number),
            None => {
                let mut record = WordRecord::new(word.clone(), detail);
                record.record(source, line_number);
                self.records.insert(word, record);
            }
        }
    }

    pub fn get(&self, word: &str) -> Option<&WordRecord> {
        self.records.get(word)
    }

    /// Number of tokens counted
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Number of lines scanned
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn distinct_words(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = (String, WordRecord)> {
        self.records.into_iter()
    }
}

/// Turns one work unit into a [`LocalTally`].
///
/// A worker never touches shared aggregation state; it only reads the lines
/// it is handed and returns an independent map.
#[derive(Debug, Clone)]
pub struct Worker {
    tokenizer: Tokenizer,
    detail: LocationDetail,
    deadline: Option<Deadline>,
    metrics: RunMetrics,
}

impl Worker {
    pub fn new(tokenizer: Tokenizer, detail: LocationDetail) -> Self {
        Self {
            tokenizer,
            detail,
            deadline: None,
            metrics: RunMetrics::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn deadline(&self) -> Option<&Deadline> {
        self.deadline.as_ref()
    }

    /// Tokenizes the unit's lines. `lines` holds the whole source; the unit's
    /// range selects which of them this worker owns, and line numbers are
    /// reported relative to the start of the source.
    pub fn process(&self, unit: &WorkUnit, lines: &[String]) -> TallyResult<LocalTally> {
        let (start, end) = unit.range.bounds(lines.len());
        trace!(
            "Processing {} lines {}..{}",
            unit.source.display(),
            start,
            end
        );

        let mut tally = LocalTally::new();
        for (offset, line) in lines[start..end].iter().enumerate() {
            if offset % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = &self.deadline {
                    deadline.check()?;
                }
            }

            let line_number = start + offset + 1;
            for token in self.tokenizer.tokens(line) {
                tally.record(token, &unit.source, line_number, self.detail);
            }
        }
        tally.lines = (end - start) as u64;

        self.metrics.record_unit(tally.lines, tally.tokens);
        trace!(
            "Finished {}: {} tokens, {} distinct",
            unit.source.display(),
            tally.tokens,
            tally.distinct_words()
        );
        Ok(tally)
    }
}
