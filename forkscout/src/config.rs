use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::search::{MatchMode, SearchOptions};

/// Configuration for a search session.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.forkscout.yaml` in the current directory
/// 3. Global `$HOME/.config/forkscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Phrases to search for
/// patterns: ["Hamlet", "to be or not to be"]
///
/// # Optional file with one phrase per line
/// pattern_file: "phraseList.txt"
///
/// # Files or directories holding the documents
/// inputs: ["completeWorksOfShakespeare.txt"]
///
/// # Separator between documents inside one input file
/// input_separator: "@"
///
/// # Split the document list and the phrase list across workers
/// parallel: true
/// parallel_input: true
/// parallel_phrases: true
///
/// # Leaf granularity per axis (default: half the collection)
/// min_split_size: 8
/// phrase_min_split_size: 2
///
/// # literal | phrase
/// match_mode: "phrase"
///
/// # Thread count (default: CPU cores)
/// thread_count: 4
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Command-line arguments take precedence over config file values; see
/// [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Phrases to search for
    pub patterns: Vec<String>,

    /// File holding one phrase per line, appended after `patterns`
    pub pattern_file: Option<PathBuf>,

    /// Files or directories holding the documents
    pub inputs: Vec<PathBuf>,

    /// Separator between documents inside one input file
    pub input_separator: String,

    /// Optional list of file extensions to include when walking directories
    pub file_extensions: Option<Vec<String>>,

    /// Glob patterns to skip when walking directories
    pub ignore_patterns: Vec<String>,

    /// Master switch; `Some(false)` forces a fully sequential search.
    /// Unset switches count as on.
    pub parallel: Option<bool>,

    /// Whether the document list is split across workers
    pub parallel_input: Option<bool>,

    /// Whether each document's phrase list is split across workers
    pub parallel_phrases: Option<bool>,

    /// Smallest document range that is still split
    pub min_split_size: Option<NonZeroUsize>,

    /// Smallest phrase range that is still split
    pub phrase_min_split_size: Option<NonZeroUsize>,

    /// How phrases are matched against document bodies
    pub match_mode: MatchMode,

    /// Number of worker threads
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to only show statistics instead of individual matches
    pub stats_only: bool,

    /// Report format
    pub output: OutputFormat,

    /// How invalid UTF-8 in input files is handled
    pub encoding_mode: EncodingMode,
}

/// How to handle invalid UTF-8 in input files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Reject the file with an encoding error
    #[default]
    FailFast,
    /// Replace invalid sequences and keep going
    Lossy,
}

/// Report format used by the command line front end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_separator() -> String {
    "@".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            pattern_file: None,
            inputs: Vec::new(),
            input_separator: default_separator(),
            file_extensions: None,
            ignore_patterns: Vec::new(),
            parallel: None,
            parallel_input: None,
            parallel_phrases: None,
            min_split_size: None,
            phrase_min_split_size: None,
            match_mode: MatchMode::default(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            stats_only: false,
            output: OutputFormat::default(),
            encoding_mode: EncodingMode::default(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("forkscout/config.yaml")),
            Some(PathBuf::from(".forkscout.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: SearchConfig) -> Self {
        let defaults = SearchConfig::default();

        if !cli_config.patterns.is_empty() {
            self.patterns = cli_config.patterns;
        }
        if cli_config.pattern_file.is_some() {
            self.pattern_file = cli_config.pattern_file;
        }
        if !cli_config.inputs.is_empty() {
            self.inputs = cli_config.inputs;
        }
        if cli_config.input_separator != defaults.input_separator {
            self.input_separator = cli_config.input_separator;
        }
        if cli_config.file_extensions.is_some() {
            self.file_extensions = cli_config.file_extensions;
        }
        if !cli_config.ignore_patterns.is_empty() {
            self.ignore_patterns = cli_config.ignore_patterns;
        }
        // Switches given on the command line win in either direction
        if cli_config.parallel.is_some() {
            self.parallel = cli_config.parallel;
        }
        if cli_config.parallel_input.is_some() {
            self.parallel_input = cli_config.parallel_input;
        }
        if cli_config.parallel_phrases.is_some() {
            self.parallel_phrases = cli_config.parallel_phrases;
        }
        if cli_config.min_split_size.is_some() {
            self.min_split_size = cli_config.min_split_size;
        }
        if cli_config.phrase_min_split_size.is_some() {
            self.phrase_min_split_size = cli_config.phrase_min_split_size;
        }
        if cli_config.match_mode != defaults.match_mode {
            self.match_mode = cli_config.match_mode;
        }
        if cli_config.thread_count != defaults.thread_count {
            self.thread_count = cli_config.thread_count;
        }
        if cli_config.log_level != defaults.log_level {
            self.log_level = cli_config.log_level;
        }
        if cli_config.stats_only {
            self.stats_only = true;
        }
        if cli_config.output != defaults.output {
            self.output = cli_config.output;
        }
        if cli_config.encoding_mode != defaults.encoding_mode {
            self.encoding_mode = cli_config.encoding_mode;
        }
        self
    }

    /// Master switch with its default applied
    pub fn is_parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }

    /// Engine options derived from this configuration
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            parallel_input: self.is_parallel() && self.parallel_input.unwrap_or(true),
            parallel_phrases: self.is_parallel() && self.parallel_phrases.unwrap_or(true),
            min_split_size: self.min_split_size,
            phrase_min_split_size: self.phrase_min_split_size,
            thread_count: self.thread_count,
            match_mode: self.match_mode,
        }
    }

    /// Installs a stderr `tracing` subscriber filtered at `log_level`.
    /// `RUST_LOG` wins when set. Safe to call more than once.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new(default_log_level()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            patterns: ["Hamlet", "to be or not to be"]
            inputs: ["works"]
            input_separator: "%%"
            file_extensions: ["txt"]
            parallel_phrases: false
            min_split_size: 4
            match_mode: "phrase"
            thread_count: 4
            log_level: "debug"
            output: "json"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.patterns, vec!["Hamlet", "to be or not to be"]);
        assert_eq!(config.inputs, vec![PathBuf::from("works")]);
        assert_eq!(config.input_separator, "%%");
        assert_eq!(config.file_extensions, Some(vec!["txt".to_string()]));
        assert_eq!(config.parallel, None);
        assert_eq!(config.parallel_phrases, Some(false));
        assert_eq!(config.min_split_size, NonZeroUsize::new(4));
        assert_eq!(config.match_mode, MatchMode::Phrase);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"patterns: [\"test\"]\n").unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.patterns, vec!["test"]);
        assert_eq!(config.input_separator, "@");
        assert!(config.is_parallel());
        assert_eq!(config.parallel_input, None);
        assert_eq!(config.parallel_phrases, None);
        assert_eq!(config.min_split_size, None);
        assert_eq!(config.match_mode, MatchMode::Literal);
        assert_eq!(
            config.thread_count,
            NonZeroUsize::new(num_cpus::get()).unwrap()
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
    }

    #[test]
    fn test_merge_with_cli() {
        let config_file = SearchConfig {
            patterns: vec!["Hamlet".to_string()],
            inputs: vec![PathBuf::from("works")],
            file_extensions: Some(vec!["txt".to_string()]),
            min_split_size: NonZeroUsize::new(8),
            thread_count: NonZeroUsize::new(4).unwrap(),
            ..SearchConfig::default()
        };

        let cli_config = SearchConfig {
            patterns: vec!["Macbeth".to_string()],
            parallel: Some(false),
            match_mode: MatchMode::Phrase,
            log_level: "debug".to_string(),
            ..SearchConfig::default()
        };

        let merged = config_file.merge_with_cli(cli_config);
        assert_eq!(merged.patterns, vec!["Macbeth"]); // CLI value
        assert_eq!(merged.inputs, vec![PathBuf::from("works")]); // File value
        assert_eq!(merged.file_extensions, Some(vec!["txt".to_string()])); // File value
        assert_eq!(merged.min_split_size, NonZeroUsize::new(8)); // File value
        assert_eq!(merged.thread_count, NonZeroUsize::new(4).unwrap()); // File value
        assert!(!merged.is_parallel()); // CLI value
        assert_eq!(merged.match_mode, MatchMode::Phrase); // CLI value
        assert_eq!(merged.log_level, "debug"); // CLI value
    }

    #[test]
    fn test_search_options_respect_master_switch() {
        let config = SearchConfig {
            parallel: Some(false),
            ..SearchConfig::default()
        };
        let options = config.search_options();
        assert!(!options.parallel_input);
        assert!(!options.parallel_phrases);

        let config = SearchConfig {
            parallel_phrases: Some(false),
            ..SearchConfig::default()
        };
        let options = config.search_options();
        assert!(options.parallel_input);
        assert!(!options.parallel_phrases);
    }

    #[test]
    fn test_cli_switch_reenables_parallel() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"parallel: false\nparallel_input: false\n").unwrap();

        let from_file = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert!(!from_file.is_parallel());

        let merged = from_file.clone().merge_with_cli(SearchConfig {
            parallel: Some(true),
            ..SearchConfig::default()
        });
        assert!(merged.is_parallel());
        // The file still turns off the document axis on its own
        assert!(!merged.search_options().parallel_input);
        assert!(merged.search_options().parallel_phrases);

        // No switch on the command line keeps the file value
        let untouched = from_file.merge_with_cli(SearchConfig::default());
        assert!(!untouched.is_parallel());
        assert!(!untouched.search_options().parallel_phrases);
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"thread_count: \"invalid\"\nmatch_mode: \"fuzzy\"\n")
            .unwrap();

        let result = SearchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SearchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
