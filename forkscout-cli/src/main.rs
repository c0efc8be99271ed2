use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use forkscout::{
    config::{EncodingMode, OutputFormat, SearchConfig},
    corpus::{load_patterns, Pattern},
    filters::CorpusFilter,
    search::{MatchMode, Searcher},
    SearchError, SearchReport,
};
use std::{num::NonZeroUsize, path::PathBuf};
use tracing::debug;

type Result<T> = std::result::Result<T, SearchError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Phrase to search for (can be specified multiple times)
    #[arg(short = 'p', long = "pattern")]
    patterns: Vec<String>,

    /// File with one phrase per line
    #[arg(long)]
    pattern_file: Option<PathBuf>,

    /// Files or directories holding the documents
    inputs: Vec<PathBuf>,

    /// Separator between documents inside one input file
    #[arg(long, default_value = "@")]
    separator: String,

    /// File extensions to include when walking directories (e.g. txt,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Split the work across threads (default; overrides the config file)
    #[arg(long, conflicts_with = "sequential")]
    parallel: bool,

    /// Run the whole search as a single task
    #[arg(long)]
    sequential: bool,

    /// Do not split the document list
    #[arg(long)]
    no_parallel_input: bool,

    /// Do not split each document's phrase list
    #[arg(long)]
    no_parallel_phrases: bool,

    /// Smallest document range that is still split (default: half the documents)
    #[arg(long)]
    min_split_size: Option<NonZeroUsize>,

    /// Smallest phrase range that is still split (default: half the phrases)
    #[arg(long)]
    phrase_min_split_size: Option<NonZeroUsize>,

    /// Match phrases case-insensitively across any whitespace
    #[arg(long)]
    phrase_mode: bool,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// How to handle invalid UTF-8 sequences (default: failfast)
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    /// Stop at the first invalid sequence
    #[value(name = "failfast")]
    FailFast,
    /// Replace invalid sequences with U+FFFD
    Lossy,
}

impl From<EncodingArg> for EncodingMode {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::FailFast => EncodingMode::FailFast,
            EncodingArg::Lossy => EncodingMode::Lossy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search documents for phrases
    Search(Box<CliSearchConfig>),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => {
            let file_config = SearchConfig::load_from(args.config.as_deref())
                .map_err(|e| SearchError::config_error(e.to_string()))?;
            let config = file_config.merge_with_cli(cli_search_config(*args));
            config.init_logging();
            debug!("Effective configuration: {:?}", config);

            let patterns = collect_patterns(&config)?;
            if config.inputs.is_empty() {
                return Err(SearchError::config_error("no input files given"));
            }
            let filter = CorpusFilter::new(config.file_extensions.clone(), &config.ignore_patterns)?;
            let searcher = Searcher::new(config.search_options())?;
            let documents = searcher.load_documents(
                &config.inputs,
                &config.input_separator,
                &filter,
                config.encoding_mode,
            )?;
            let report = searcher.search_shared(documents.into(), &patterns)?;

            match config.output {
                OutputFormat::Json => println!("{}", report.to_json()?),
                OutputFormat::Text => print_search_results(&report, config.stats_only),
            }
            Ok(())
        }
    }
}

fn cli_search_config(args: CliSearchConfig) -> SearchConfig {
    let defaults = SearchConfig::default();

    let file_extensions = args.extensions.as_ref().map(|e| {
        e.split(',')
            .map(|s| s.trim().to_string())
            .collect::<Vec<_>>()
    });

    // Unset switches leave the config file's choice alone
    let parallel = if args.parallel {
        Some(true)
    } else if args.sequential {
        Some(false)
    } else {
        None
    };

    SearchConfig {
        patterns: args.patterns,
        pattern_file: args.pattern_file,
        inputs: args.inputs,
        input_separator: args.separator,
        file_extensions,
        ignore_patterns: args.ignore,
        parallel,
        parallel_input: args.no_parallel_input.then_some(false),
        parallel_phrases: args.no_parallel_phrases.then_some(false),
        min_split_size: args.min_split_size,
        phrase_min_split_size: args.phrase_min_split_size,
        match_mode: if args.phrase_mode {
            MatchMode::Phrase
        } else {
            MatchMode::Literal
        },
        thread_count: args.threads.unwrap_or(defaults.thread_count),
        log_level: args.log_level.unwrap_or(defaults.log_level),
        stats_only: args.stats,
        output: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        encoding_mode: args.encoding.map(EncodingMode::from).unwrap_or_default(),
    }
}

/// Inline phrases first, then the phrase file, in order
fn collect_patterns(config: &SearchConfig) -> Result<Vec<Pattern>> {
    let mut patterns: Vec<Pattern> = config
        .patterns
        .iter()
        .map(|p| Pattern::from(p.as_str()))
        .collect();
    if let Some(path) = &config.pattern_file {
        patterns.extend(load_patterns(path)?);
    }
    if patterns.is_empty() {
        return Err(SearchError::config_error(
            "no patterns given; use --pattern or --pattern-file",
        ));
    }
    Ok(patterns)
}

fn print_search_results(report: &SearchReport, stats_only: bool) {
    if stats_only {
        println!(
            "Found {} matches of {} phrases in {} documents",
            report.total_matches, report.patterns_with_matches, report.documents_with_matches
        );
        return;
    }

    for (title, sets) in report.by_document() {
        println!("\n{}", title.blue());
        for set in sets {
            let offsets = set
                .offsets
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join("|");
            println!(
                "  {} at [{}]",
                format!("\"{}\"", set.pattern).green(),
                offsets
            );
        }
    }

    println!(
        "\nFound {} matches of {} phrases in {} documents",
        report.total_matches, report.patterns_with_matches, report.documents_with_matches
    );
}
