//! Command handlers, one module per subcommand

pub mod append;
pub mod config;
pub mod report;
pub mod setup;

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use cdpcov::{CaptureConfig, CaptureSession};

/// Capture log from the environment, or from config
pub(crate) fn resolve_session(config: &CaptureConfig, from_env: bool) -> CliResult<CaptureSession> {
    let session = if from_env {
        CaptureSession::from_env()?
    } else {
        CaptureSession::from_config(config)?
    };
    Ok(session)
}

pub(crate) fn reporter_for(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}
