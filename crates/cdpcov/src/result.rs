//! Result and error types for cdpcov.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for cdpcov operations
pub type CovResult<T> = Result<T, CovError>;

/// Errors that can occur while capturing or reporting coverage
#[derive(Debug, Error)]
pub enum CovError {
    /// Missing or invalid required path or option
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Filesystem failure on a known path
    #[error("I/O error on {}: {source}", path.display())]
    File {
        /// Path the operation was working on
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure without a path
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed batch JSON, source map or config file
    #[error("Parse error in {context}: {message}")]
    Parse {
        /// What was being parsed
        context: String,
        /// Parser message
        message: String,
    },

    /// The browser engine failed to start or stop capture
    #[error("Coverage capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// A report renderer failed
    #[error("Reporter '{reporter}' failed: {message}")]
    Render {
        /// Renderer name
        reporter: String,
        /// Error message
        message: String,
    },
}

impl CovError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a path-carrying I/O error
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a parse error
    #[must_use]
    pub fn parse(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    /// Create a renderer error
    #[must_use]
    pub fn render(reporter: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Render {
            reporter: reporter.into(),
            message: message.to_string(),
        }
    }

    /// Whether this is a configuration error
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Whether this is a parse error
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
