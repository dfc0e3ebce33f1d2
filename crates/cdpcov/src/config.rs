//! Capture and report configuration
//!
//! A [`CaptureConfig`] is built once (defaults, then a config file, then
//! explicit overrides) and passed by reference into every pipeline phase.
//! [`CaptureOptions`] is the partial, deserializable form used for layering:
//! options left unset keep whatever value was configured before.

use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default capture directory
pub const DEFAULT_DIR: &str = "cdpcov";
/// Default capture log file name
pub const DEFAULT_FILE: &str = "cdpcov.json";
/// Default test server origin
pub const DEFAULT_URL: &str = "http://localhost:3000";

/// Process configuration for capture and reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Capture log directory
    pub dir: String,
    /// Capture log file name (or path)
    pub file: String,
    /// Base test-server URL, or a filesystem prefix when it starts with `/`
    pub url: String,
    /// Report renderer names
    pub reporters: Vec<String>,
    /// Compiled output root
    pub out_dir: String,
    /// Original source root
    pub src_dir: String,
    /// Globs selecting compiled files for the report
    pub include: Vec<String>,
    /// Globs removed from the include set
    pub exclude: Vec<String>,
    /// Project root that globs and relative paths resolve against
    pub root: PathBuf,
    /// Extension of compiled files
    pub compiled_ext: String,
    /// Extension of original sources
    pub source_ext: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_DIR.to_string(),
            file: DEFAULT_FILE.to_string(),
            url: DEFAULT_URL.to_string(),
            reporters: vec!["text".to_string()],
            out_dir: "spec".to_string(),
            src_dir: "src".to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            root: PathBuf::from("."),
            compiled_ext: "js".to_string(),
            source_ext: "ts".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Create a config with built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capture directory
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Set the capture log file
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Set the base test-server URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Replace the renderer list
    #[must_use]
    pub fn with_reporters<I, S>(mut self, reporters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reporters = reporters.into_iter().map(Into::into).collect();
        self
    }

    /// Set the compiled output root
    #[must_use]
    pub fn with_out_dir(mut self, dir: impl Into<String>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Set the original source root
    #[must_use]
    pub fn with_src_dir(mut self, dir: impl Into<String>) -> Self {
        self.src_dir = dir.into();
        self
    }

    /// Replace the include globs
    #[must_use]
    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the exclude globs
    #[must_use]
    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the project root
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set compiled and original file extensions (without the dot)
    #[must_use]
    pub fn with_extensions(mut self, compiled: impl Into<String>, source: impl Into<String>) -> Self {
        self.compiled_ext = compiled.into();
        self.source_ext = source.into();
        self
    }

    /// Overlay every option that is set
    pub fn apply(&mut self, options: CaptureOptions) {
        let CaptureOptions {
            dir,
            file,
            url,
            reporters,
            out_dir,
            src_dir,
            include,
            exclude,
            root,
            compiled_ext,
            source_ext,
        } = options;

        if let Some(v) = dir {
            self.dir = v;
        }
        if let Some(v) = file {
            self.file = v;
        }
        if let Some(v) = url {
            self.url = v;
        }
        if let Some(v) = reporters {
            self.reporters = v;
        }
        if let Some(v) = out_dir {
            self.out_dir = v;
        }
        if let Some(v) = src_dir {
            self.src_dir = v;
        }
        if let Some(v) = include {
            self.include = v;
        }
        if let Some(v) = exclude {
            self.exclude = v;
        }
        if let Some(v) = root {
            self.root = v;
        }
        if let Some(v) = compiled_ext {
            self.compiled_ext = v;
        }
        if let Some(v) = source_ext {
            self.source_ext = v;
        }
    }

    /// Builder form of [`CaptureConfig::apply`]
    #[must_use]
    pub fn merged(mut self, options: CaptureOptions) -> Self {
        self.apply(options);
        self
    }

    /// Reject configs that cannot locate a capture log
    pub fn validate(&self) -> CovResult<()> {
        if self.dir.trim().is_empty() {
            return Err(CovError::config("capture directory (dir) must not be empty"));
        }
        if self.file.trim().is_empty() {
            return Err(CovError::config("capture file (file) must not be empty"));
        }
        Ok(())
    }

    /// Resolve a possibly relative path against the project root
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Partial configuration, as read from a config file or flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureOptions {
    /// Capture log directory
    pub dir: Option<String>,
    /// Capture log file
    pub file: Option<String>,
    /// Base test-server URL
    pub url: Option<String>,
    /// Report renderer names
    pub reporters: Option<Vec<String>>,
    /// Compiled output root
    pub out_dir: Option<String>,
    /// Original source root
    pub src_dir: Option<String>,
    /// Include globs
    pub include: Option<Vec<String>>,
    /// Exclude globs
    pub exclude: Option<Vec<String>>,
    /// Project root
    pub root: Option<PathBuf>,
    /// Compiled file extension
    pub compiled_ext: Option<String>,
    /// Original source extension
    pub source_ext: Option<String>,
}

impl CaptureOptions {
    /// Read options from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> CovResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CovError::io(path, e))?;
        let context = path.display().to_string();

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content).map_err(|e| CovError::parse(context, e))
        } else {
            serde_yaml_ng::from_str(&content).map_err(|e| CovError::parse(context, e))
        }
    }
}
