/// Concurrent word counting.
///
/// A run flows through five stages:
///
/// 1. **Partitioning** splits the sources into independent work units, one
///    per file or one per block of `chunk_size` lines.
/// 2. **Workers** tokenize their unit and count into a private
///    [`LocalTally`]. Nothing is shared while a worker runs.
/// 3. **Aggregation** merges each finished local tally into the single global
///    table under one lock acquisition per unit.
/// 4. **Ranking** picks the top N records once every worker has joined,
///    ordered by count descending with ties broken by word.
/// 5. The **engine** drives the stages on a bounded rayon pool and applies
///    the read-failure policy and the optional deadline.
///
/// ```rust,ignore
/// let report = tally(&config)?;
/// for record in &report.top_words {
///     println!("{} - {}", record.word, record.count);
/// }
/// ```
pub mod aggregator;
pub mod engine;
pub mod partition;
pub mod ranker;
pub mod source;
pub mod tokenizer;
pub mod worker;

pub use aggregator::{Aggregation, Aggregator};
pub use engine::{tally, tally_sources, AggregationOutcome, TallyEngine};
pub use partition::{partition, Granularity, LineRange, SourceSpec, WorkUnit};
pub use ranker::{rank, rank_records};
pub use source::{FsLineSource, LineSource, MemoryLineSource};
pub use tokenizer::{TokenRule, Tokenizer};
pub use worker::{Deadline, LocalTally, Worker};
