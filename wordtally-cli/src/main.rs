use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use itertools::Itertools;
use std::{io, num::NonZeroUsize, path::PathBuf, process};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wordtally::{
    tally, ConfigOverrides, EncodingMode, GranularityMode, LocationDetail, Locations,
    ReadFailurePolicy, TallyConfig, TallyReport, TallyResult, TokenRule,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliTallyConfig {
    /// Files and directories to count
    paths: Vec<PathBuf>,

    /// Number of words to report
    #[arg(short = 'n', long = "top")]
    top: Option<usize>,

    /// File extensions to include when walking directories (e.g. txt,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Work unit granularity (file|line-chunk)
    #[arg(long)]
    granularity: Option<GranularityMode>,

    /// Lines per work unit in line-chunk mode
    #[arg(short = 'c', long)]
    chunk_size: Option<usize>,

    /// Tokenization rule (word-boundary|non-letter)
    #[arg(long)]
    rule: Option<TokenRule>,

    /// Location detail to track (lines|files)
    #[arg(long)]
    detail: Option<LocationDetail>,

    /// What to do when a source cannot be read (abort|skip)
    #[arg(long)]
    on_read_failure: Option<ReadFailurePolicy>,

    /// Keep line numbers in merge order instead of sorting them
    #[arg(long)]
    unsorted_locations: bool,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Abort the run after this long (e.g. 30s, 2m)
    #[arg(long)]
    timeout: Option<humantime::Duration>,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<EncodingMode>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,

    /// Show only totals, not the ranked words
    #[arg(short, long)]
    stats: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Count words and report the most frequent ones
    Count(Box<CliTallyConfig>),

    /// Print the effective configuration as JSON
    Config(Box<CliTallyConfig>),
}

impl CliTallyConfig {
    fn overrides(&self, log_level: Option<String>) -> ConfigOverrides {
        ConfigOverrides {
            inputs: self.paths.clone(),
            file_extensions: self.extensions.as_ref().map(|e| {
                e.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            ignore_patterns: self.ignore.clone(),
            top_n: self.top,
            granularity: self.granularity,
            chunk_size: self.chunk_size,
            tokenization_rule: self.rule,
            location_detail: self.detail,
            on_read_failure: self.on_read_failure,
            unsorted_locations: self.unsorted_locations,
            encoding_mode: self.encoding,
            thread_count: self.threads,
            timeout: self.timeout.map(Into::into),
            show_progress: self.progress,
            log_level,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> TallyResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Count(args) => {
            let config = TallyConfig::load_from(cli.config.as_deref())?
                .merge_with_cli(args.overrides(cli.log_level));
            init_logging(&config.log_level);
            debug!("Effective configuration: {:?}", config);

            let report = tally(&config)?;
            match args.format {
                OutputFormat::Text => print_report(&report, args.stats),
                OutputFormat::Json => print_json(&report)?,
            }
            Ok(())
        }
        Commands::Config(args) => {
            let config = TallyConfig::load_from(cli.config.as_deref())?
                .merge_with_cli(args.overrides(cli.log_level));
            config.validate()?;
            print_json(&config)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_json<T: serde::Serialize>(value: &T) -> TallyResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
    println!("{}", json);
    Ok(())
}

fn print_report(report: &TallyReport, stats_only: bool) {
    if !stats_only {
        println!("{}", format!("Top {} words:", report.top_words.len()).bold());
        for record in &report.top_words {
            println!(
                "{} - {} occurrences",
                record.word.green().bold(),
                record.count
            );
            match &record.locations {
                Locations::Lines(lines) => {
                    for (source, numbers) in lines {
                        println!("  File: {}", source.display().to_string().blue());
                        println!("    Lines: {}", numbers.iter().join(", "));
                    }
                }
                Locations::Files(files) => {
                    for source in files {
                        println!("  File: {}", source.display().to_string().blue());
                    }
                }
            }
        }
        println!();
    }

    println!(
        "Counted {} tokens ({} distinct words) in {} sources",
        report.total_tokens, report.distinct_words, report.sources_processed
    );
    if stats_only {
        println!(
            "Processed {} work units, {} lines, {} bytes",
            report.units_processed, report.stats.lines_scanned, report.stats.bytes_read
        );
    }

    if !report.is_complete() {
        eprintln!(
            "{}",
            format!(
                "Warning: {} sources skipped, counts are partial:",
                report.skipped.len()
            )
            .yellow()
        );
        for skipped in &report.skipped {
            eprintln!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}
