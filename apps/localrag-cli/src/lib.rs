//! Command-line front end: argument parsing, store wiring and output.

pub mod commands;
pub mod output;
pub mod stack;

pub use commands::{run, Cli};
pub use output::exit_code;
