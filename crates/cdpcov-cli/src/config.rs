//! CLI configuration

use crate::error::{CliError, CliResult};
use cdpcov::{CaptureConfig, CaptureOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "cdpcov.yaml";

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default `tracing` filter directive for this level
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "cdpcov=info,warn",
            Self::Debug => "cdpcov=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Explicit config file
    pub config_file: Option<PathBuf>,
}

impl CliConfig {
    /// Create a new CLI config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set an explicit config file
    #[must_use]
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Config file in effect, if any
    ///
    /// An explicit file must exist; the default one is optional.
    pub fn config_file_in(&self, cwd: &Path) -> CliResult<Option<PathBuf>> {
        match &self.config_file {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(CliError::config(format!(
                "config file {} not found",
                path.display()
            ))),
            None => {
                let default = cwd.join(DEFAULT_CONFIG_FILE);
                Ok(default.is_file().then_some(default))
            }
        }
    }

    /// Effective capture config: defaults, then config file, then flags
    pub fn capture_config(&self, flags: CaptureOptions) -> CliResult<CaptureConfig> {
        let cwd = std::env::current_dir()?;
        let mut config = CaptureConfig::new();
        if let Some(path) = self.config_file_in(&cwd)? {
            tracing::debug!(target: "cdpcov.cli", path = %path.display(), "loading config file");
            config.apply(CaptureOptions::from_path(&path)?);
        }
        config.apply(flags);
        Ok(config)
    }
}
