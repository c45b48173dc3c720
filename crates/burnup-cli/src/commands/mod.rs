//! CLI subcommand implementations.

pub mod events;
pub mod hierarchies;
pub mod history;
pub mod util;
