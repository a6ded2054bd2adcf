//! Application layer: runs one CLI subcommand against a settings root.

pub mod execute;

pub use execute::{execute, Action, CliContext, CliError};
