//! Command-line front end of the harvester: config loading, progress logging
//! and the run/check/inspect commands.
pub mod cli;
pub mod config_file;
pub mod progress;
pub mod runner;
