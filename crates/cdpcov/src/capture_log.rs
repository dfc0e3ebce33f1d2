//! Capture Log
//!
//! An append-only journal of capture batches. Each capture cycle appends
//! one JSON array followed by [`BATCH_DELIMITER`]:
//!
//! ```text
//! [{"url":...},{"url":...}]*|FRM_BREAK|*[{"url":...}]*|FRM_BREAK|*
//! ```
//!
//! Every append is a single `write` on a file opened with `O_APPEND`, so
//! concurrent test workers never interleave partial records.

use crate::config::CaptureConfig;
use crate::result::{CovError, CovResult};
use crate::sample::RawCoverageSample;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Separator written after every batch
pub const BATCH_DELIMITER: &str = "*|FRM_BREAK|*";

/// Environment variable carrying the capture directory
pub const ENV_DIR: &str = "CDPCOV_COVERAGE_DIR";

/// Environment variable carrying the capture log path
pub const ENV_FILE: &str = "CDPCOV_COVERAGE_FILE";

/// Subdirectory of the capture directory that receives rendered reports
pub const REPORT_SUBDIR: &str = "coverage-report";

/// Resolved location of a capture log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    dir: PathBuf,
    file: PathBuf,
}

impl CaptureSession {
    /// Resolve the log location from config without touching the filesystem
    pub fn from_config(config: &CaptureConfig) -> CovResult<Self> {
        config.validate()?;
        let dir = absolute(&config.resolve(&config.dir))?;
        let file = dir.join(&config.file);
        Ok(Self { dir, file })
    }

    /// Discover a log published with [`CaptureSession::export_env`]
    pub fn from_env() -> CovResult<Self> {
        let file = env_path(ENV_FILE)?;
        let dir = match std::env::var_os(ENV_DIR) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => file
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| CovError::config(format!("{ENV_FILE} has no parent directory")))?,
        };
        Ok(Self { dir, file })
    }

    /// Use an explicit directory and log path
    #[must_use]
    pub fn from_paths(dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    /// Publish this session for cooperating processes started later
    pub fn export_env(&self) {
        std::env::set_var(ENV_DIR, &self.dir);
        std::env::set_var(ENV_FILE, &self.file);
    }

    /// Environment pairs to hand to a child process
    #[must_use]
    pub fn env_vars(&self) -> [(&'static str, &Path); 2] {
        [(ENV_DIR, self.dir.as_path()), (ENV_FILE, self.file.as_path())]
    }

    /// Capture directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture log path
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Directory that renderers write into
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.dir.join(REPORT_SUBDIR)
    }

    /// Append one batch followed by the delimiter in a single write
    pub fn append_batch(&self, batch: &[RawCoverageSample]) -> CovResult<()> {
        let mut record = serde_json::to_string(batch)
            .map_err(|e| CovError::parse("capture batch", e))?;
        record.push_str(BATCH_DELIMITER);

        let mut log = OpenOptions::new()
            .append(true)
            .open(&self.file)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => CovError::config(format!(
                    "capture log {} does not exist; run setup first",
                    self.file.display()
                )),
                _ => CovError::io(&self.file, e),
            })?;

        log.write_all(record.as_bytes())
            .map_err(|e| CovError::io(&self.file, e))?;

        tracing::debug!(
            target: "cdpcov.capture_log",
            path = %self.file.display(),
            samples = batch.len(),
            bytes = record.len(),
            "appended capture batch"
        );
        Ok(())
    }

    /// Read the whole log as text
    pub fn read(&self) -> CovResult<String> {
        fs::read_to_string(&self.file).map_err(|e| CovError::io(&self.file, e))
    }
}

/// Create an empty capture log, replacing any previous one
pub fn setup(config: &CaptureConfig) -> CovResult<CaptureSession> {
    let session = CaptureSession::from_config(config)?;
    clear(&session.file)?;

    fs::create_dir_all(&session.dir).map_err(|e| CovError::io(&session.dir, e))?;
    if let Some(parent) = session.file.parent() {
        fs::create_dir_all(parent).map_err(|e| CovError::io(parent, e))?;
    }
    fs::File::create(&session.file).map_err(|e| CovError::io(&session.file, e))?;

    tracing::info!(
        target: "cdpcov.capture_log",
        path = %session.file.display(),
        "capture log ready"
    );
    Ok(session)
}

/// Remove a previous log; a missing one is already clean
fn clear(file: &Path) -> CovResult<()> {
    let metadata = match fs::symlink_metadata(file) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(CovError::io(file, e)),
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(file)
    } else {
        fs::remove_file(file)
    };

    match removed {
        Ok(()) => {
            tracing::debug!(target: "cdpcov.capture_log", path = %file.display(), "cleared previous log");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CovError::io(file, e)),
    }
}

fn env_path(name: &str) -> CovResult<PathBuf> {
    match std::env::var_os(name) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(CovError::config(format!(
            "{name} is not set; no capture log has been set up"
        ))),
    }
}

fn absolute(path: &Path) -> CovResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}
