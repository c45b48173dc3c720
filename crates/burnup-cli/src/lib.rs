//! Burn-up CLI library.
//!
//! This crate provides the CLI interface and the file-backed data source.

mod cli;
pub mod commands;
mod config;
pub mod output;
pub mod source;

pub use cli::{Cli, Commands, ExtractArgs, HistoryArgs};
pub use config::Config;
