use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use harvest_logging::{harvest_error, DEFAULT_LOG_FILE};
use harvester_cli::cli::{Cli, Command};
use harvester_cli::config_file::{api_token, load_config};
use harvester_cli::runner::{exit_code, inspect_cache, render_check, run_harvest};

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    harvest_logging::initialize(cli.log.into(), cli.level(), Path::new(DEFAULT_LOG_FILE));

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            harvest_error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config = load_config(&cli.config, &cli.overrides())?;

    match cli.command {
        Command::Run { .. } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let report = runtime.block_on(run_harvest(&config, api_token()))?;
            Ok(exit_code(&report))
        }
        Command::Check => {
            print!("{}", render_check(&config));
            Ok(0)
        }
        Command::Inspect { .. } => {
            inspect_cache(&config);
            Ok(0)
        }
    }
}
