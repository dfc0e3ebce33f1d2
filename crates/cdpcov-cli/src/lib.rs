//! cdpcov CLI library
//!
//! ## Usage
//!
//! ```bash
//! cdpcov setup --dir cov --print-env    # fresh capture log
//! cdpcov append batch.json              # one test's coverage
//! cdpcov report -r text,lcov -i 'spec/**/*.js'
//! ```

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{AppendArgs, CaptureArgs, Cli, ColorArg, Commands, ConfigArgs, ReportArgs, SetupArgs};
pub use config::{CliConfig, ColorChoice, Verbosity, DEFAULT_CONFIG_FILE};
pub use error::{CliError, CliResult};
pub use output::{summary_line, ProgressReporter};
