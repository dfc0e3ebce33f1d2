//! Coverage report renderers
//!
//! | name        | output                                   |
//! |-------------|------------------------------------------|
//! | `text`      | `coverage.txt`, also echoed to terminal  |
//! | `lcov`      | `lcov.info`                              |
//! | `html`      | `index.html` plus one page per file      |
//! | `cobertura` | `cobertura-coverage.xml`                 |
//! | `json`      | `coverage-final.json`                    |

mod cobertura;
mod html;
mod json;
mod lcov;
mod text;

pub use cobertura::CoberturaFormatter;
pub use html::HtmlFormatter;
pub use json::JsonFormatter;
pub use lcov::LcovFormatter;
pub use text::TextFormatter;

use crate::model::CoverageMap;
use crate::paths;
use crate::result::{CovError, CovResult};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where reports go and how paths are shown
#[derive(Debug, Clone)]
pub struct ReportContext {
    out_dir: PathBuf,
    base: PathBuf,
    generated_at: DateTime<Local>,
}

impl ReportContext {
    /// Reports under `out_dir`, paths shown relative to `base`
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, base: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.into(),
            base: paths::absolutize(base.as_ref(), Path::new("")),
            generated_at: Local::now(),
        }
    }

    /// Fix the report timestamp
    #[must_use]
    pub const fn with_timestamp(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = at;
        self
    }

    /// Output directory
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Base that displayed paths are relative to
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Report timestamp
    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Local> {
        self.generated_at
    }

    /// A source path as shown in reports
    #[must_use]
    pub fn display(&self, path: &Path) -> String {
        paths::display_relative(path, &self.base)
    }
}

/// A report format selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReporterKind {
    /// Plain-text summary table
    Text,
    /// LCOV trace file
    Lcov,
    /// Browsable HTML
    Html,
    /// Cobertura XML
    Cobertura,
    /// Per-file JSON
    Json,
}

impl ReporterKind {
    /// Every reporter
    pub const ALL: [Self; 5] = [Self::Text, Self::Lcov, Self::Html, Self::Cobertura, Self::Json];

    /// Reporter name as configured
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Lcov => "lcov",
            Self::Html => "html",
            Self::Cobertura => "cobertura",
            Self::Json => "json",
        }
    }

    /// Render into the context's output directory, returning files written
    pub fn write(self, coverage: &CoverageMap, ctx: &ReportContext) -> CovResult<Vec<PathBuf>> {
        let single = |file: &str, content: String| -> CovResult<Vec<PathBuf>> {
            let path = ctx.out_dir().join(file);
            write_file(&path, &content).map_err(|e| CovError::render(self.name(), e))?;
            Ok(vec![path])
        };
        match self {
            Self::Text => single(TextFormatter::FILE_NAME, TextFormatter::new(coverage, ctx).generate()),
            Self::Lcov => single(LcovFormatter::FILE_NAME, LcovFormatter::new(coverage, ctx).generate()),
            Self::Cobertura => single(
                CoberturaFormatter::FILE_NAME,
                CoberturaFormatter::new(coverage, ctx).generate(),
            ),
            Self::Json => {
                let content = JsonFormatter::new(coverage, ctx)
                    .generate()
                    .map_err(|e| CovError::render(self.name(), e))?;
                single(JsonFormatter::FILE_NAME, content)
            }
            Self::Html => HtmlFormatter::new(coverage, ctx)
                .save_all()
                .map_err(|e| CovError::render(self.name(), e)),
        }
    }

    /// Terminal rendering
    #[must_use]
    pub fn console(self, coverage: &CoverageMap, ctx: &ReportContext) -> String {
        TextFormatter::new(coverage, ctx).generate()
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReporterKind {
    type Err = CovError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
                CovError::config(format!("unknown reporter '{s}' (expected one of: {})", known.join(", ")))
            })
    }
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

/// Escape XML and HTML special characters
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
