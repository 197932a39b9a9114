//! Result types: per-word records and the final report.
//!
//! A [`WordRecord`] is created the first time a worker sees a word and only
//! ever grows afterwards: counts increase and location sets gain entries.
//! Records are never removed during a run.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::metrics::RunStats;

/// Identifies one input source. Cloning is a reference-count bump, so every
/// record and work unit can hold its own handle.
pub type SourceId = Arc<Path>;

/// How much location detail is tracked per word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationDetail {
    /// Every occurrence is recorded with its 1-based line number
    #[default]
    Lines,
    /// Only the set of sources containing the word is recorded
    Files,
}

/// Where a word occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locations {
    /// Line numbers per source, one entry per occurrence
    Lines(BTreeMap<SourceId, Vec<usize>>),
    /// Sources the word appears in
    Files(BTreeSet<SourceId>),
}

impl Locations {
    pub fn new(detail: LocationDetail) -> Self {
        match detail {
            LocationDetail::Lines => Locations::Lines(BTreeMap::new()),
            LocationDetail::Files => Locations::Files(BTreeSet::new()),
        }
    }

    fn record(&mut self, source: &SourceId, line_number: usize) {
        match self {
            Locations::Lines(lines) => lines.entry(source.clone()).or_default().push(line_number),
            Locations::Files(files) => {
                if !files.contains(source) {
                    files.insert(source.clone());
                }
            }
        }
    }

    /// Appends `other` into `self`. Line lists are concatenated in call
    /// order; mixing detail levels degrades to a file set.
    fn absorb(&mut self, other: Locations) {
        let ours = std::mem::replace(self, Locations::Files(BTreeSet::new()));
        *self = match (ours, other) {
            (Locations::Lines(mut ours), Locations::Lines(theirs)) => {
                for (source, mut lines) in theirs {
                    ours.entry(source).or_default().append(&mut lines);
                }
                Locations::Lines(ours)
            }
            (Locations::Files(mut ours), Locations::Files(theirs)) => {
                ours.extend(theirs);
                Locations::Files(ours)
            }
            (Locations::Files(mut ours), Locations::Lines(theirs)) => {
                ours.extend(theirs.into_keys());
                Locations::Files(ours)
            }
            (Locations::Lines(ours), Locations::Files(theirs)) => {
                let mut files: BTreeSet<SourceId> = ours.into_keys().collect();
                files.extend(theirs);
                Locations::Files(files)
            }
        };
    }

    /// Iterates the sources this word was seen in, in path order.
    pub fn sources(&self) -> Box<dyn Iterator<Item = &Path> + '_> {
        match self {
            Locations::Lines(lines) => Box::new(lines.keys().map(|s| s.as_ref())),
            Locations::Files(files) => Box::new(files.iter().map(|s| s.as_ref())),
        }
    }

    /// Line numbers recorded for `source`, or `None` in file-set mode or when
    /// the word never appeared there.
    pub fn lines_in(&self, source: &Path) -> Option<&[usize]> {
        match self {
            Locations::Lines(lines) => lines.get(source).map(Vec::as_slice),
            Locations::Files(_) => None,
        }
    }

    pub fn contains_source(&self, source: &Path) -> bool {
        match self {
            Locations::Lines(lines) => lines.contains_key(source),
            Locations::Files(files) => files.contains(source),
        }
    }

    /// Number of line entries recorded, if line detail is tracked.
    pub fn occurrences(&self) -> Option<u64> {
        match self {
            Locations::Lines(lines) => Some(lines.values().map(|l| l.len() as u64).sum()),
            Locations::Files(_) => None,
        }
    }
}

/// Aggregated count and locations for one distinct word
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordRecord {
    /// The lowercase word
    pub word: String,
    /// Total number of occurrences
    pub count: u64,
    /// Where the word occurred
    pub locations: Locations,
}

impl WordRecord {
    /// Creates an empty record for `word`
    pub fn new(word: impl Into<String>, detail: LocationDetail) -> Self {
        Self {
            word: word.into(),
            count: 0,
            locations: Locations::new(detail),
        }
    }

    /// Records one occurrence of the word
    pub fn record(&mut self, source: &SourceId, line_number: usize) {
        self.count += 1;
        self.locations.record(source, line_number);
    }

    /// Merges another record for the same word into this one
    pub fn absorb(&mut self, other: WordRecord) {
        debug_assert_eq!(self.word, other.word);
        self.count += other.count;
        self.locations.absorb(other.locations);
    }

    /// Sorts each source's line numbers ascending
    pub fn sort_locations(&mut self) {
        if let Locations::Lines(lines) = &mut self.locations {
            lines.values_mut().for_each(|l| l.sort_unstable());
        }
    }

    /// Checks `count == sum(len(lines[f]))` when line detail is tracked
    pub fn is_consistent(&self) -> bool {
        self.locations
            .occurrences()
            .map_or(true, |occurrences| occurrences == self.count)
    }
}

/// A source that was skipped under the skip read-failure policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// The complete outcome of a tally run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TallyReport {
    /// The ranked top-N records
    pub top_words: Vec<WordRecord>,
    /// Total number of tokens counted across all sources
    pub total_tokens: u64,
    /// Number of distinct words seen
    pub distinct_words: usize,
    /// Number of sources that contributed
    pub sources_processed: usize,
    /// Number of work units merged
    pub units_processed: usize,
    /// Sources dropped under the skip policy. Non-empty means the counts are
    /// partial.
    pub skipped: Vec<SkippedSource>,
    /// Run statistics
    pub stats: RunStats,
}

impl TallyReport {
    /// Whether every discovered source contributed to the counts
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
