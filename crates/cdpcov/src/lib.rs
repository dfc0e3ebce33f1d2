//! cdpcov: end-to-end coverage for browser code, reported against original sources
//!
//! Chromium's V8 engine can report precise per-function execution counts for
//! every script a page loads. cdpcov collects those counts across any
//! number of test runs and folds them into one report keyed by the
//! *original* (pre-compilation) source files.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  setup   ┌─────────────┐  append   ┌──────────────┐
//! │  config  │─────────►│ capture log │◄──────────│ capture cycle│◄── browser
//! └──────────┘          └─────────────┘  (per     └──────────────┘    (CDP)
//!                              │          test)
//!                              ▼ load
//!                       ┌─────────────┐ reconcile ┌──────────────┐  render
//!                       │   samples   │──────────►│ coverage map │────────► text/lcov/html/...
//!                       └─────────────┘ + maps    └──────────────┘
//! ```
//!
//! ```no_run
//! use cdpcov::{create_coverage_report, setup, CaptureConfig};
//!
//! # fn main() -> cdpcov::CovResult<()> {
//! let config = CaptureConfig::new().with_include(["spec/**/*.js"]);
//! let session = setup(&config)?;
//! // ... run tests, each calling capture_cycle(...) with this session ...
//! let outcome = create_coverage_report(&config, &session)?;
//! println!("{:.2}% lines", outcome.coverage.summary().lines.percent());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Capture configuration
pub mod config;

/// Error types
pub mod result;

/// Raw V8 coverage samples
pub mod sample;

/// Capture log lifecycle: setup, append, read
pub mod capture_log;

/// Per-test capture cycles behind a probe seam
pub mod capture;

/// Log parsing and URL rewriting
pub mod loader;

/// Lexical path helpers
pub mod paths;

/// Source map discovery and decoding
pub mod source_map;

/// Sample to original-source conversion
pub mod convert;

/// Aggregate coverage model
pub mod model;

/// Working set, zero-coverage synthesis and the report pipeline
pub mod reconcile;

/// Report renderers
pub mod report;

pub use capture::{capture_cycle, capture_cycle_from_env, supports_coverage, CapturePhase, CoverageProbe, MockProbe, CHROMIUM};
#[cfg(feature = "browser")]
pub use capture::ChromiumProbe;
pub use capture_log::{setup, CaptureSession, BATCH_DELIMITER, ENV_DIR, ENV_FILE, REPORT_SUBDIR};
pub use config::{CaptureConfig, CaptureOptions, DEFAULT_DIR, DEFAULT_FILE, DEFAULT_URL};
pub use loader::{load_coverage, parse_log, UrlMode};
pub use model::{CoverageMap, CoverageSummary, FileCoverage, FunctionKey, Position, Tally};
pub use reconcile::{create_coverage_report, reconcile, source_path_for, Reconciler, ReportOutcome, WorkingSet};
pub use report::{ReportContext, ReporterKind};
pub use result::{CovError, CovResult};
pub use sample::{CaptureBatch, CoverageRange, FunctionRange, RawCoverageSample};
pub use source_map::SourceMapping;
