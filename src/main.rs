//! Quick Thesaurus cache maintenance tool
//!
//! Opens the lookup cache and runs one maintenance command against it.

use std::io;
use std::process::ExitCode;

use clap::Parser;

use quickthes::cache::CacheManager;
use quickthes::cli::{self, Cli, CliError, Outcome};
use quickthes::config::CacheConfig;
use quickthes::logging;

/// Exit status when `get` finds no fresh entry
const EXIT_NOT_CACHED: u8 = 1;

/// Exit status for configuration and cache errors
const EXIT_ERROR: u8 = 2;

fn run(cli: &Cli) -> Result<Outcome, CliError> {
    let config = CacheConfig::from_cli(cli)?;
    let cache = CacheManager::from_config(&config)?;
    let mut stdout = io::stdout().lock();
    cli::execute(&cli.command, &cache, &mut stdout)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::NotCached) => ExitCode::from(EXIT_NOT_CACHED),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
