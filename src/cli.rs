//! Command-line interface for inspecting and maintaining the lookup cache
//!
//! This module handles parsing of CLI arguments using clap, resolves them into
//! a `CacheConfig`, and runs the maintenance commands against an open cache.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cache::{CacheError, CacheManager};
use crate::config::{CacheConfig, ConfigError, DEFAULT_CACHE_FILE, DEFAULT_TTL_SECS};

/// Error types for running CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// The cache settings are invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cache could not be opened, read or written
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The payload given to `put` is not a JSON object
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Output could not be written
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Quick Thesaurus cache - inspect and maintain cached word lookups
#[derive(Parser, Debug)]
#[command(name = "quickthes")]
#[command(about = "Inspect and maintain the Quick Thesaurus lookup cache")]
#[command(version)]
pub struct Cli {
    /// Cache file to use [default: cache.json]
    #[arg(long, value_name = "PATH", env = "QUICKTHES_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Store the cache in the user cache directory; takes precedence over --cache-file
    #[arg(long)]
    pub user_cache: bool,

    /// Seconds an entry stays fresh after it is validated
    #[arg(long, value_name = "SECS", env = "QUICKTHES_TTL", default_value_t = DEFAULT_TTL_SECS)]
    pub ttl: u64,

    /// Show debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Maintenance commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Show the cache file, its size and entry counts
    Stats,
    /// List cached keys and whether each is fresh
    Keys,
    /// Print the cached payload for a word if it is fresh
    Get {
        /// Word to look up
        key: String,
    },
    /// Store a JSON object payload for a word and mark it fresh
    Put {
        /// Word to store
        key: String,
        /// Payload, e.g. '{"synonyms": ["kitty"]}'
        payload: String,
    },
    /// Remove entries from the cache
    Purge {
        /// Only remove entries that are no longer fresh
        #[arg(long)]
        invalid_only: bool,
    },
    /// Mark entries stale without removing them
    Invalidate(Target),
    /// Mark entries fresh again without changing them
    Revalidate(Target),
}

/// Which entries a validity command applies to
#[derive(Args, Debug, PartialEq)]
pub struct Target {
    /// Word to update
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub key: Option<String>,

    /// Update every entry
    #[arg(long)]
    pub all: bool,
}

/// How a command finished, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// `get` found no fresh entry
    NotCached,
}

/// Normalizes a search term the way lookups are keyed: trimmed and lower-cased
pub fn normalize_key(term: &str) -> String {
    term.trim().to_lowercase()
}

impl CacheConfig {
    /// Creates a CacheConfig from parsed CLI arguments.
    ///
    /// The file is chosen in this order: `--user-cache`, then `--cache-file`
    /// (or `QUICKTHES_CACHE_FILE`), then `cache.json` in the working directory.
    ///
    /// # Returns
    /// * `Ok(CacheConfig)` with the chosen file and TTL
    /// * `Err(ConfigError)` if the TTL is zero or no user cache directory exists
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.user_cache {
            return CacheConfig::in_user_cache_dir(cli.ttl);
        }
        let path = cli
            .cache_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));
        CacheConfig::new(path, cli.ttl)
    }
}

/// Parses a `put` payload, which must be a JSON object
pub fn parse_payload(raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::InvalidPayload("expected a JSON object".to_string())),
        Err(e) => Err(CliError::InvalidPayload(e.to_string())),
    }
}

/// Share of invalid entries as a percentage, rounded to one decimal place
pub fn invalid_percent(total: usize, invalid: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (invalid as f64 / total as f64 * 1000.0).round() / 10.0
}

fn write_counts<W: Write>(out: &mut W, cache: &CacheManager) -> io::Result<()> {
    let (total, invalid) = cache.count();
    writeln!(
        out,
        "Entries: {} ({} invalid, {:.1}%)",
        total,
        invalid,
        invalid_percent(total, invalid)
    )
}

/// Runs `command` against `cache`, writing human-readable output to `out`
pub fn execute<W: Write>(
    command: &Command,
    cache: &CacheManager,
    out: &mut W,
) -> Result<Outcome, CliError> {
    match command {
        Command::Stats => {
            writeln!(out, "Cache file: {}", cache.path().display())?;
            writeln!(out, "Size: {}", cache.size()?)?;
            write_counts(out, cache)?;
        }
        Command::Keys => {
            for key in cache.keys() {
                let state = if cache.check(&key) { "fresh" } else { "stale" };
                writeln!(out, "{}\t{}", key, state)?;
            }
        }
        Command::Get { key } => {
            let Some(entry) = cache.get(&normalize_key(key)) else {
                writeln!(out, "not cached")?;
                return Ok(Outcome::NotCached);
            };
            let json = serde_json::to_string_pretty(&entry.payload).map_err(CacheError::from)?;
            writeln!(out, "{}", json)?;
        }
        Command::Put { key, payload } => {
            let payload = parse_payload(payload)?;
            let key = normalize_key(key);
            cache.save(key.as_str(), payload, true)?;
            writeln!(out, "Saved '{}'", key)?;
        }
        Command::Purge { invalid_only } => {
            let before = cache.len();
            cache.purge(*invalid_only)?;
            writeln!(out, "Purged {} entries", before - cache.len())?;
        }
        Command::Invalidate(target) => {
            match &target.key {
                Some(key) => cache.invalidate(&normalize_key(key))?,
                None => cache.invalidate_all()?,
            }
            write_counts(out, cache)?;
        }
        Command::Revalidate(target) => {
            match &target.key {
                Some(key) => cache.revalidate(&normalize_key(key))?,
                None => cache.revalidate_all()?,
            }
            write_counts(out, cache)?;
        }
    }
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_cache() -> (CacheManager, ManualClock, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(1_700_000_000);
        let cache = CacheManager::open_with_clock(
            temp_dir.path().join("cache.json"),
            Duration::from_secs(100),
            clock.clone(),
        )
        .expect("Failed to open cache");
        (cache, clock, temp_dir)
    }

    fn run(command: Command, cache: &CacheManager) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = execute(&command, cache, &mut out).expect("Command should succeed");
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Cat \n"), "cat");
        assert_eq!(normalize_key("DOG"), "dog");
    }

    #[test]
    fn test_parse_payload_accepts_object() {
        let payload = parse_payload(r#"{"def": "a feline"}"#).unwrap();
        assert_eq!(payload["def"], "a feline");
    }

    #[test]
    fn test_parse_payload_rejects_non_object() {
        let err = parse_payload("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("Invalid payload"));
        assert!(parse_payload("{oops").is_err());
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["quickthes", "stats"]);
        assert_eq!(cli.command, Command::Stats);
        assert!(!cli.user_cache);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_purge_invalid_only() {
        let cli = Cli::parse_from(["quickthes", "purge", "--invalid-only"]);
        assert_eq!(cli.command, Command::Purge { invalid_only: true });
    }

    #[test]
    fn test_cli_parse_invalidate_all() {
        let cli = Cli::parse_from(["quickthes", "invalidate", "--all"]);
        assert_eq!(cli.command, Command::Invalidate(Target { key: None, all: true }));
    }

    #[test]
    fn test_cli_rejects_key_and_all_together() {
        assert!(Cli::try_parse_from(["quickthes", "revalidate", "cat", "--all"]).is_err());
        assert!(Cli::try_parse_from(["quickthes", "revalidate"]).is_err());
    }

    #[test]
    fn test_config_from_cli() {
        let cli = Cli::parse_from([
            "quickthes",
            "--cache-file",
            "words.json",
            "--ttl",
            "60",
            "stats",
        ]);
        let config = CacheConfig::from_cli(&cli).unwrap();
        assert_eq!(config, CacheConfig::new("words.json", 60).unwrap());
    }

    #[test]
    fn test_config_from_cli_defaults_to_working_directory_file() {
        let cli = Cli {
            cache_file: None,
            user_cache: false,
            ttl: 60,
            verbose: false,
            command: Command::Stats,
        };
        let config = CacheConfig::from_cli(&cli).unwrap();
        assert_eq!(config.path, PathBuf::from(DEFAULT_CACHE_FILE));
    }

    #[test]
    fn test_user_cache_wins_over_cache_file_from_env() {
        // A path taken from QUICKTHES_CACHE_FILE must not block --user-cache.
        let cli = Cli {
            cache_file: Some(PathBuf::from("/tmp/x.json")),
            user_cache: true,
            ttl: 60,
            verbose: false,
            command: Command::Stats,
        };
        match CacheConfig::from_cli(&cli) {
            Ok(config) => assert_ne!(config.path, PathBuf::from("/tmp/x.json")),
            // No home directory (e.g., in CI)
            Err(e) => assert_eq!(e, ConfigError::NoUserCacheDir),
        }
    }

    #[test]
    fn test_user_cache_parses_alongside_cache_file() {
        let cli = Cli::try_parse_from([
            "quickthes",
            "--user-cache",
            "--cache-file",
            "/tmp/x.json",
            "stats",
        ])
        .expect("--user-cache should not conflict with a cache file");
        assert!(cli.user_cache);
    }

    #[test]
    fn test_invalid_percent() {
        assert_eq!(invalid_percent(0, 0), 0.0);
        assert_eq!(invalid_percent(4, 1), 25.0);
        assert_eq!(invalid_percent(3, 1), 33.3);
        assert_eq!(invalid_percent(3, 3), 100.0);
    }

    #[test]
    fn test_config_from_cli_zero_ttl() {
        let cli = Cli::parse_from(["quickthes", "--ttl", "0", "stats"]);
        assert_eq!(CacheConfig::from_cli(&cli), Err(ConfigError::ZeroTtl));
    }

    #[test]
    fn test_put_then_get_normalizes_key() {
        let (cache, _clock, _temp_dir) = create_test_cache();

        let (outcome, output) = run(
            Command::Put {
                key: " Cat ".to_string(),
                payload: r#"{"def": "a feline"}"#.to_string(),
            },
            &cache,
        );
        assert_eq!(outcome, Outcome::Done);
        assert!(output.contains("Saved 'cat'"));

        let (outcome, output) = run(Command::Get { key: "CAT".to_string() }, &cache);
        assert_eq!(outcome, Outcome::Done);
        assert!(output.contains("a feline"));
    }

    #[test]
    fn test_get_stale_reports_not_cached() {
        let (cache, clock, _temp_dir) = create_test_cache();
        run(
            Command::Put {
                key: "cat".to_string(),
                payload: r#"{"def": "a feline"}"#.to_string(),
            },
            &cache,
        );
        clock.advance(100);

        let (outcome, output) = run(Command::Get { key: "cat".to_string() }, &cache);

        assert_eq!(outcome, Outcome::NotCached);
        assert!(output.contains("not cached"));
    }

    #[test]
    fn test_stats_output() {
        let (cache, _clock, _temp_dir) = create_test_cache();

        let (_, output) = run(Command::Stats, &cache);

        assert!(output.contains("cache.json"));
        assert!(output.contains("Size: 2 bytes"));
        assert!(output.contains("Entries: 0 (0 invalid, 0.0%)"));
    }

    #[test]
    fn test_invalidate_then_keys_and_purge() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.save("cat", parse_payload(r#"{"def": "a feline"}"#).unwrap(), false).unwrap();
        cache.save("dog", parse_payload(r#"{"def": "a canine"}"#).unwrap(), true).unwrap();

        let (_, output) = run(
            Command::Invalidate(Target {
                key: Some("Dog".to_string()),
                all: false,
            }),
            &cache,
        );
        assert!(output.contains("Entries: 2 (1 invalid, 50.0%)"));

        let (_, output) = run(Command::Keys, &cache);
        assert!(output.contains("cat\tfresh"));
        assert!(output.contains("dog\tstale"));

        let (_, output) = run(Command::Purge { invalid_only: true }, &cache);
        assert!(output.contains("Purged 1 entries"));
        assert_eq!(cache.keys(), vec!["cat".to_string()]);
    }

    #[test]
    fn test_revalidate_all() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.save("cat", parse_payload(r#"{"def": "a feline"}"#).unwrap(), true).unwrap();
        cache.invalidate_all().unwrap();

        let (_, output) = run(Command::Revalidate(Target { key: None, all: true }), &cache);

        assert!(output.contains("Entries: 1 (0 invalid, 0.0%)"));
    }
}
