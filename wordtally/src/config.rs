use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{TallyError, TallyResult};
use crate::results::LocationDetail;
use crate::tally::partition::Granularity;
use crate::tally::tokenizer::TokenRule;

/// Default number of lines per work unit in line-chunk mode
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default number of ranked words
pub const DEFAULT_TOP_N: usize = 20;

/// Configuration for a tally run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.wordtally.yaml` in the current directory
/// 3. Global `$HOME/.config/wordtally/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Files and/or directories to count
/// inputs: ["corpus"]
///
/// # Extensions kept when walking directories (null keeps everything)
/// file_extensions: ["txt", "md"]
///
/// # Glob patterns to skip while walking directories
/// ignore_patterns: ["**/drafts/**"]
///
/// top_n: 20
///
/// # file | line-chunk
/// granularity: line-chunk
/// chunk_size: 10000
///
/// # word-boundary | non-letter
/// tokenization_rule: word-boundary
///
/// # lines | files
/// location_detail: lines
///
/// # abort | skip
/// on_read_failure: abort
///
/// # failfast | lossy
/// encoding_mode: failfast
///
/// thread_count: 4
/// timeout: "30s"
/// log_level: "info"
/// ```
///
/// When using the CLI, command-line arguments take precedence over config
/// file values; see [`TallyConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Files and directories to count
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Extensions kept when walking directories. `None` keeps every file.
    /// Explicitly listed files are never filtered.
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Option<Vec<String>>,

    /// Glob patterns to skip while walking directories
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Number of words to rank
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Whether work units are whole files or line chunks
    #[serde(default)]
    pub granularity: GranularityMode,

    /// Maximum lines per work unit in line-chunk mode
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Word-splitting rule, fixed for the whole run
    #[serde(default)]
    pub tokenization_rule: TokenRule,

    /// Track line numbers or only the files each word occurs in
    #[serde(default)]
    pub location_detail: LocationDetail,

    /// What to do when a source cannot be read
    #[serde(default)]
    pub on_read_failure: ReadFailurePolicy,

    /// Sort each word's line numbers once all workers have joined
    #[serde(default = "default_sort_locations")]
    pub sort_locations: bool,

    /// How to handle invalid UTF-8
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Size of the worker pool. Defaults to the number of CPU cores.
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Abort the run once this much time has passed
    #[serde(default, with = "timeout_format")]
    pub timeout: Option<Duration>,

    /// Draw a progress bar over work units
    #[serde(default)]
    pub show_progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Work unit granularity as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GranularityMode {
    /// One unit per file
    #[default]
    File,
    /// Files split into units of at most `chunk_size` lines
    LineChunk,
}

/// What happens when a source fails to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFailurePolicy {
    /// Fail the whole run, naming the source
    #[default]
    Abort,
    /// Drop the source, log a warning and list it in the report
    Skip,
}

/// How to handle invalid UTF-8 sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Invalid UTF-8 is a read failure
    #[default]
    FailFast,
    /// Invalid sequences are replaced with U+FFFD
    Lossy,
}

fn default_file_extensions() -> Option<Vec<String>> {
    Some(vec!["txt".to_string()])
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_sort_locations() -> bool {
    true
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            file_extensions: default_file_extensions(),
            ignore_patterns: Vec::new(),
            top_n: default_top_n(),
            granularity: GranularityMode::default(),
            chunk_size: default_chunk_size(),
            tokenization_rule: TokenRule::default(),
            location_detail: LocationDetail::default(),
            on_read_failure: ReadFailurePolicy::default(),
            sort_locations: default_sort_locations(),
            encoding_mode: EncodingMode::default(),
            thread_count: default_thread_count(),
            timeout: None,
            show_progress: false,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line. `None` and empty fields leave the
/// file configuration untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub inputs: Vec<PathBuf>,
    pub file_extensions: Option<Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub top_n: Option<usize>,
    pub granularity: Option<GranularityMode>,
    pub chunk_size: Option<usize>,
    pub tokenization_rule: Option<TokenRule>,
    pub location_detail: Option<LocationDetail>,
    pub on_read_failure: Option<ReadFailurePolicy>,
    pub unsorted_locations: bool,
    pub encoding_mode: Option<EncodingMode>,
    pub thread_count: Option<NonZeroUsize>,
    pub timeout: Option<Duration>,
    pub show_progress: bool,
    pub log_level: Option<String>,
}

impl TallyConfig {
    /// Loads configuration from the default locations
    pub fn load() -> TallyResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an explicit file,
    /// which must exist
    pub fn load_from(config_path: Option<&Path>) -> TallyResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("wordtally/config.yaml")),
            // Local config
            Some(PathBuf::from(".wordtally.yaml")),
        ];

        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if !cli.inputs.is_empty() {
            self.inputs = cli.inputs;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        if let Some(top_n) = cli.top_n {
            self.top_n = top_n;
        }
        if let Some(granularity) = cli.granularity {
            self.granularity = granularity;
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(rule) = cli.tokenization_rule {
            self.tokenization_rule = rule;
        }
        if let Some(detail) = cli.location_detail {
            self.location_detail = detail;
        }
        if let Some(policy) = cli.on_read_failure {
            self.on_read_failure = policy;
        }
        if cli.unsorted_locations {
            self.sort_locations = false;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if cli.timeout.is_some() {
            self.timeout = cli.timeout;
        }
        if cli.show_progress {
            self.show_progress = true;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Rejects values no run could honor. Called before any work is
    /// scheduled.
    pub fn validate(&self) -> TallyResult<()> {
        if self.top_n == 0 {
            return Err(TallyError::invalid_configuration(
                "top_n must be greater than zero",
            ));
        }
        if self.chunk_size == 0 {
            return Err(TallyError::invalid_configuration(
                "chunk_size must be greater than zero",
            ));
        }
        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                TallyError::invalid_configuration(format!(
                    "invalid ignore pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }
        Ok(())
    }

    /// The partition policy these settings describe
    pub fn partition_granularity(&self) -> Granularity {
        match self.granularity {
            GranularityMode::File => Granularity::File,
            GranularityMode::LineChunk => Granularity::LineChunk(self.chunk_size),
        }
    }
}

fn unknown_value(kind: &str, value: &str, expected: &str) -> TallyError {
    TallyError::invalid_configuration(format!(
        "unknown {} '{}' (expected {})",
        kind, value, expected
    ))
}

impl FromStr for GranularityMode {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "line-chunk" | "chunk" => Ok(Self::LineChunk),
            _ => Err(unknown_value("granularity", s, "file|line-chunk")),
        }
    }
}

impl FromStr for ReadFailurePolicy {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(unknown_value("read failure policy", s, "abort|skip")),
        }
    }
}

impl FromStr for EncodingMode {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "failfast" => Ok(Self::FailFast),
            "lossy" => Ok(Self::Lossy),
            _ => Err(unknown_value("encoding mode", s, "failfast|lossy")),
        }
    }
}

impl FromStr for TokenRule {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "word-boundary" | "regex" => Ok(Self::WordBoundary),
            "non-letter" => Ok(Self::NonLetter),
            _ => Err(unknown_value(
                "tokenization rule",
                s,
                "word-boundary|non-letter",
            )),
        }
    }
}

impl FromStr for LocationDetail {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lines" => Ok(Self::Lines),
            "files" => Ok(Self::Files),
            _ => Err(unknown_value("location detail", s, "lines|files")),
        }
    }
}

/// Timeouts are written as humantime strings such as `"30s"` or `"2m 30s"`.
mod timeout_format {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(limit) => s.serialize_some(&humantime::format_duration(*limit).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| humantime::parse_duration(&raw).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        config_path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            &dir,
            r#"
            inputs: ["corpus", "notes.txt"]
            file_extensions: ["txt", "md"]
            ignore_patterns: ["**/drafts/**"]
            top_n: 5
            granularity: line-chunk
            chunk_size: 250
            tokenization_rule: non-letter
            location_detail: files
            on_read_failure: skip
            sort_locations: false
            encoding_mode: lossy
            thread_count: 4
            timeout: "1m 30s"
            show_progress: true
            log_level: "debug"
        "#,
        );

        let config = TallyConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(
            config.inputs,
            vec![PathBuf::from("corpus"), PathBuf::from("notes.txt")]
        );
        assert_eq!(
            config.file_extensions,
            Some(vec!["txt".to_string(), "md".to_string()])
        );
        assert_eq!(config.ignore_patterns, vec!["**/drafts/**".to_string()]);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.granularity, GranularityMode::LineChunk);
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.tokenization_rule, TokenRule::NonLetter);
        assert_eq!(config.location_detail, LocationDetail::Files);
        assert_eq!(config.on_read_failure, ReadFailurePolicy::Skip);
        assert!(!config.sort_locations);
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert!(config.show_progress);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.partition_granularity(), Granularity::LineChunk(250));
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = write_config(&dir, "inputs: [\".\"]\n");

        let config = TallyConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from(".")]);
        assert_eq!(config.file_extensions, Some(vec!["txt".to_string()]));
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert_eq!(config.granularity, GranularityMode::File);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.tokenization_rule, TokenRule::WordBoundary);
        assert_eq!(config.location_detail, LocationDetail::Lines);
        assert_eq!(config.on_read_failure, ReadFailurePolicy::Abort);
        assert!(config.sort_locations);
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.timeout, None);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.partition_granularity(), Granularity::File);
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = TallyConfig {
            inputs: vec![PathBuf::from("corpus")],
            top_n: 10,
            ignore_patterns: vec!["*.tmp".to_string()],
            ..TallyConfig::default()
        };

        let merged = file_config.merge_with_cli(ConfigOverrides {
            inputs: vec![PathBuf::from("other")],
            top_n: Some(3),
            granularity: Some(GranularityMode::LineChunk),
            chunk_size: Some(100),
            unsorted_locations: true,
            thread_count: NonZeroUsize::new(8),
            timeout: Some(Duration::from_secs(5)),
            log_level: Some("debug".to_string()),
            ..ConfigOverrides::default()
        });

        assert_eq!(merged.inputs, vec![PathBuf::from("other")]); // CLI value
        assert_eq!(merged.top_n, 3); // CLI value
        assert_eq!(merged.ignore_patterns, vec!["*.tmp".to_string()]); // File value
        assert_eq!(merged.file_extensions, Some(vec!["txt".to_string()])); // File value
        assert_eq!(merged.partition_granularity(), Granularity::LineChunk(100));
        assert!(!merged.sort_locations);
        assert_eq!(merged.thread_count, NonZeroUsize::new(8).unwrap());
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.log_level, "debug");
    }

    #[test]
    fn test_validate() {
        assert!(TallyConfig::default().validate().is_ok());

        let config = TallyConfig {
            top_n: 0,
            ..TallyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TallyError::InvalidConfiguration(_))
        ));

        let config = TallyConfig {
            chunk_size: 0,
            ..TallyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TallyError::InvalidConfiguration(_))
        ));

        let config = TallyConfig {
            ignore_patterns: vec!["[unclosed".to_string()],
            ..TallyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TallyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_parse_cli_values() {
        assert_eq!(
            "line-chunk".parse::<GranularityMode>().unwrap(),
            GranularityMode::LineChunk
        );
        assert_eq!("SKIP".parse::<ReadFailurePolicy>().unwrap(), ReadFailurePolicy::Skip);
        assert_eq!("lossy".parse::<EncodingMode>().unwrap(), EncodingMode::Lossy);
        assert_eq!("non-letter".parse::<TokenRule>().unwrap(), TokenRule::NonLetter);
        assert_eq!("files".parse::<LocationDetail>().unwrap(), LocationDetail::Files);
        assert!("sometimes".parse::<ReadFailurePolicy>().is_err());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            &dir,
            r#"
            top_n: "many"
            timeout: "soon"
        "#,
        );

        let result = TallyConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = TallyConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(matches!(result, Err(TallyError::ConfigError(_))));
    }
}
