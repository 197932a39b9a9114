pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod results;
pub mod tally;

pub use config::{ConfigOverrides, EncodingMode, GranularityMode, ReadFailurePolicy, TallyConfig};
pub use errors::{TallyError, TallyResult};
pub use metrics::{RunMetrics, RunStats};
pub use results::{LocationDetail, Locations, SkippedSource, SourceId, TallyReport, WordRecord};
pub use tally::{tally, tally_sources, TallyEngine, TokenRule};
