use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::aggregator::{Aggregation, Aggregator};
use super::partition::{partition, Granularity, SourceSpec};
use super::ranker::rank;
use super::source::{FsLineSource, LineSource};
use super::tokenizer::Tokenizer;
use super::worker::{Deadline, LocalTally, Worker};
use crate::config::{ReadFailurePolicy, TallyConfig};
use crate::errors::{TallyError, TallyResult};
use crate::filters::discover_sources;
use crate::metrics::{RunMetrics, RunStats};
use crate::results::{SkippedSource, SourceId, TallyReport};

/// Everything the aggregation phase produced, before ranking
#[derive(Debug)]
pub struct AggregationOutcome {
    /// The merged counts. No writers remain once this is returned.
    pub aggregation: Aggregation,
    /// Number of sources that contributed
    pub sources_processed: usize,
    /// Sources dropped under the skip policy
    pub skipped: Vec<SkippedSource>,
    pub stats: RunStats,
}

/// Runs one tally over a fixed set of sources.
///
/// Each run owns its aggregation; nothing survives between runs, so an
/// engine can be invoked repeatedly.
pub struct TallyEngine<'a> {
    config: &'a TallyConfig,
    line_source: &'a dyn LineSource,
    metrics: RunMetrics,
}

impl<'a> TallyEngine<'a> {
    pub fn new(config: &'a TallyConfig, line_source: &'a dyn LineSource) -> Self {
        Self {
            config,
            line_source,
            metrics: RunMetrics::new(),
        }
    }

    /// Shares `metrics` with the engine, e.g. the ones a line source records into
    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Counts every word of `sources` on a bounded worker pool.
    ///
    /// Configuration problems and an empty source list fail before any
    /// worker is spawned.
    pub fn aggregate(&self, sources: &[PathBuf]) -> TallyResult<AggregationOutcome> {
        self.config.validate()?;
        if sources.is_empty() {
            return Err(TallyError::NoInputProvided);
        }

        let started = Instant::now();
        let granularity = self.config.partition_granularity();
        info!(
            "Starting tally of {} sources ({:?}, {} threads)",
            sources.len(),
            granularity,
            self.config.thread_count
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count.get())
            .build()
            .map_err(|e| {
                TallyError::invalid_configuration(format!("failed to build worker pool: {}", e))
            })?;

        let worker = Worker::new(
            Tokenizer::new(self.config.tokenization_rule),
            self.config.location_detail,
        )
        .with_deadline(self.config.timeout.map(Deadline::after))
        .with_metrics(self.metrics.clone());

        let run = Run {
            worker,
            aggregator: Aggregator::with_metrics(self.metrics.clone()),
            line_source: self.line_source,
            policy: self.config.on_read_failure,
            skipped: Mutex::new(Vec::new()),
            planned_units: AtomicUsize::new(0),
            metrics: self.metrics.clone(),
            progress: progress_bar(self.config.show_progress),
        };

        let ids: Vec<SourceId> = sources.iter().map(|p| SourceId::from(p.as_path())).collect();
        let result = pool.install(|| match granularity {
            Granularity::File => run.by_file(&ids),
            Granularity::LineChunk(_) => run.by_chunk(&ids, granularity),
        });

        let Run {
            aggregator,
            skipped,
            planned_units,
            progress,
            ..
        } = run;
        progress.finish_and_clear();

        if let Err(err) = result {
            let err = err.with_progress(aggregator.merged_units(), planned_units.into_inner());
            error!("Tally aborted: {}", err);
            return Err(err);
        }

        let mut aggregation = aggregator.into_aggregation();
        if self.config.sort_locations {
            aggregation.sort_locations();
        }

        let mut skipped = skipped.into_inner().unwrap_or_else(PoisonError::into_inner);
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        self.metrics.log_stats();
        info!(
            "Tally complete in {:?}: {} tokens, {} distinct words, {} units",
            started.elapsed(),
            aggregation.total_tokens(),
            aggregation.len(),
            aggregation.units_merged()
        );

        Ok(AggregationOutcome {
            aggregation,
            sources_processed: sources.len() - skipped.len(),
            skipped,
            stats: self.metrics.get_stats(),
        })
    }

    /// Aggregates `sources` and ranks the result
    pub fn run(&self, sources: &[PathBuf]) -> TallyResult<TallyReport> {
        let outcome = self.aggregate(sources)?;
        let total_tokens = outcome.aggregation.total_tokens();
        let distinct_words = outcome.aggregation.len();
        let units_processed = outcome.aggregation.units_merged();
        let top_words = rank(outcome.aggregation, self.config.top_n)?;

        Ok(TallyReport {
            top_words,
            total_tokens,
            distinct_words,
            sources_processed: outcome.sources_processed,
            units_processed,
            skipped: outcome.skipped,
            stats: self.metrics.get_stats(),
        })
    }
}

/// Counts and ranks `sources` read through `line_source`
pub fn tally_sources(
    sources: &[PathBuf],
    config: &TallyConfig,
    line_source: &dyn LineSource,
) -> TallyResult<TallyReport> {
    TallyEngine::new(config, line_source).run(sources)
}

/// Discovers the configured inputs on the filesystem, then counts and ranks
/// them
pub fn tally(config: &TallyConfig) -> TallyResult<TallyReport> {
    config.validate()?;
    let sources = discover_sources(
        &config.inputs,
        &config.file_extensions,
        &config.ignore_patterns,
    )?;

    let metrics = RunMetrics::new();
    let line_source = FsLineSource::new(config.encoding_mode).with_metrics(metrics.clone());
    TallyEngine::new(config, &line_source)
        .with_metrics(metrics)
        .run(&sources)
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} units")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}

/// Runs `work` and turns a panic into an error attributed to `source`
fn guarded<T>(source: &Path, work: impl FnOnce() -> TallyResult<T>) -> TallyResult<T> {
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| {
        error!("Worker panicked while processing {}", source.display());
        Err(TallyError::worker_panicked(source))
    })
}

/// State shared by the workers of one run
struct Run<'a> {
    worker: Worker,
    aggregator: Aggregator,
    line_source: &'a dyn LineSource,
    policy: ReadFailurePolicy,
    skipped: Mutex<Vec<SkippedSource>>,
    planned_units: AtomicUsize,
    metrics: RunMetrics,
    progress: ProgressBar,
}

impl Run<'_> {
    /// One unit per source; each worker reads its own file
    fn by_file(&self, ids: &[SourceId]) -> TallyResult<()> {
        let specs: Vec<SourceSpec> = ids.iter().cloned().map(SourceSpec::unread).collect();
        let units = partition(&specs, Granularity::File)?;
        self.plan(units.len());

        units.par_iter().try_for_each(|unit| {
            self.check_deadline()?;
            let outcome = guarded(&unit.source, || {
                let lines = self.line_source.read_lines(&unit.source)?;
                self.worker.process(unit, &lines)
            });
            self.settle(&unit.source, outcome)
        })
    }

    /// Loads every source first, since chunking needs line counts, then
    /// runs the chunks against the loaded lines
    fn by_chunk(&self, ids: &[SourceId], granularity: Granularity) -> TallyResult<()> {
        let loaded: Vec<(SourceId, Vec<String>)> = ids
            .par_iter()
            .map(|id| -> TallyResult<Option<(SourceId, Vec<String>)>> {
                self.check_deadline()?;
                match guarded(id, || self.line_source.read_lines(id)) {
                    Ok(lines) => Ok(Some((id.clone(), lines))),
                    Err(err) => self.tolerate(id, err).map(|()| None),
                }
            })
            .collect::<TallyResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let specs: Vec<SourceSpec> = loaded
            .iter()
            .map(|(id, lines)| SourceSpec::with_line_count(id.clone(), lines.len()))
            .collect();
        let units = partition(&specs, granularity)?;
        self.plan(units.len());

        let by_source: HashMap<&Path, &[String]> = loaded
            .iter()
            .map(|(id, lines)| (id.as_ref(), lines.as_slice()))
            .collect();

        units.par_iter().try_for_each(|unit| {
            self.check_deadline()?;
            let lines = by_source.get(&*unit.source).copied().unwrap_or_default();
            let outcome = guarded(&unit.source, || self.worker.process(unit, lines));
            self.settle(&unit.source, outcome)
        })
    }

    fn plan(&self, units: usize) {
        debug!("Scheduling {} work units", units);
        self.planned_units.fetch_add(units, Ordering::Relaxed);
        self.progress.inc_length(units as u64);
    }

    fn check_deadline(&self) -> TallyResult<()> {
        match self.worker.deadline() {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }

    /// Merges a finished unit or applies the read-failure policy
    fn settle(&self, source: &Path, outcome: TallyResult<LocalTally>) -> TallyResult<()> {
        let result = match outcome {
            Ok(local) => {
                self.aggregator.merge(local);
                Ok(())
            }
            Err(err) => self.tolerate(source, err),
        };
        self.progress.inc(1);
        result
    }

    fn tolerate(&self, source: &Path, err: TallyError) -> TallyResult<()> {
        if self.policy != ReadFailurePolicy::Skip || !err.is_read_failure() {
            return Err(err);
        }

        warn!("Skipping {}: {}", source.display(), err);
        self.metrics.record_skip();
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SkippedSource {
                path: source.to_path_buf(),
                reason: err.to_string(),
            });
        Ok(())
    }
}
