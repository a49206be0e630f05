use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use harvest_logging::LogDestination;
use log::LevelFilter;

use crate::config_file::Overrides;

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(about = "Harvest event calendars and account timelines into a report")]
#[command(version)]
pub struct Cli {
    /// Path to the RON config file
    #[arg(short, long, global = true, default_value = "harvest.ron")]
    pub config: PathBuf,

    /// Where log output goes
    #[arg(long, global = true, value_enum, default_value_t = LogTarget::Both)]
    pub log: LogTarget,

    /// Log debug output (twice for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Harvest every configured source and write the report
    Run {
        /// Ignore cached batches and start every source fresh
        #[arg(long)]
        no_cache: bool,

        /// Output directory for report.json and records.csv
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Cache directory for per-source batches
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Validate the config file and list its sources
    Check,

    /// Summarise the cached batch of every configured source
    Inspect {
        /// Cache directory to read instead of the configured one
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Cli {
    pub fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn overrides(&self) -> Overrides {
        match &self.command {
            Command::Run {
                no_cache,
                output,
                cache_dir,
            } => Overrides {
                no_cache: *no_cache,
                output_dir: output.clone(),
                cache_dir: cache_dir.clone(),
            },
            Command::Inspect { cache_dir } => Overrides {
                cache_dir: cache_dir.clone(),
                ..Overrides::default()
            },
            Command::Check => Overrides::default(),
        }
    }
}
