//! CLI command implementations

pub mod error;
pub mod run;
pub mod serve;

pub use error::CliError;
pub use run::{Cli, Commands, RunArgs};
pub use serve::ServeArgs;
