//! Capture cycles
//!
//! A capture cycle brackets one test: `Start` before it runs, `Stop` after,
//! at which point the engine's samples are appended to the capture log as
//! one batch. Only Chromium exposes V8 precise coverage, so every other
//! engine identity turns a cycle into a no-op.
//!
//! ## Usage
//!
//! ```ignore
//! let session = cdpcov::setup(&config)?;
//! let mut probe = ChromiumProbe::new(page);
//!
//! capture_cycle("chromium", &mut probe, CapturePhase::Start, &session).await?;
//! page.goto("http://localhost:3000/demo.html").await?;
//! capture_cycle("chromium", &mut probe, CapturePhase::Stop, &session).await?;
//! ```

use crate::capture_log::CaptureSession;
use crate::result::{CovError, CovResult};
use crate::sample::RawCoverageSample;
use async_trait::async_trait;

/// The only engine identity that produces V8 coverage
pub const CHROMIUM: &str = "chromium";

/// Which half of a capture cycle to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Begin recording
    Start,
    /// Stop recording and append the batch
    Stop,
}

/// Source of V8 coverage for one page or session
#[async_trait]
pub trait CoverageProbe: Send {
    /// Begin precise coverage collection
    async fn start_capture(&mut self) -> CovResult<()>;

    /// End collection and return one sample per script
    async fn stop_capture(&mut self) -> CovResult<Vec<RawCoverageSample>>;
}

/// Whether an engine identity produces coverage
#[must_use]
pub fn supports_coverage(browser_name: &str) -> bool {
    browser_name == CHROMIUM
}

/// Run one half of a capture cycle
pub async fn capture_cycle<P>(
    browser_name: &str,
    probe: &mut P,
    phase: CapturePhase,
    session: &CaptureSession,
) -> CovResult<()>
where
    P: CoverageProbe + ?Sized,
{
    if !supports_coverage(browser_name) {
        tracing::trace!(target: "cdpcov.capture", browser = browser_name, "engine has no V8 coverage; skipping");
        return Ok(());
    }

    match phase {
        CapturePhase::Start => probe.start_capture().await,
        CapturePhase::Stop => {
            let batch = probe.stop_capture().await?;
            session.append_batch(&batch)
        }
    }
}

/// Run one half of a capture cycle against the session published in the environment
pub async fn capture_cycle_from_env<P>(
    browser_name: &str,
    probe: &mut P,
    phase: CapturePhase,
) -> CovResult<()>
where
    P: CoverageProbe + ?Sized,
{
    if !supports_coverage(browser_name) {
        return Ok(());
    }
    let session = CaptureSession::from_env()?;
    capture_cycle(browser_name, probe, phase, &session).await
}

/// Probe that replays a fixed batch, for tests
#[derive(Debug, Default)]
pub struct MockProbe {
    /// Batch returned by every stop
    pub batch: Vec<RawCoverageSample>,
    /// Call history for verification
    pub call_history: Vec<String>,
    /// Fail the next stop with this message
    pub fail_stop: Option<String>,
}

impl MockProbe {
    /// Create a probe returning `batch` on stop
    #[must_use]
    pub fn new(batch: Vec<RawCoverageSample>) -> Self {
        Self {
            batch,
            ..Self::default()
        }
    }

    /// Number of recorded calls to `method`
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.call_history.iter().filter(|c| *c == method).count()
    }
}

#[async_trait]
impl CoverageProbe for MockProbe {
    async fn start_capture(&mut self) -> CovResult<()> {
        self.call_history.push("start".to_string());
        Ok(())
    }

    async fn stop_capture(&mut self) -> CovResult<Vec<RawCoverageSample>> {
        self.call_history.push("stop".to_string());
        if let Some(message) = self.fail_stop.take() {
            return Err(CovError::capture(message));
        }
        Ok(self.batch.clone())
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{async_trait, CovError, CovResult, CoverageProbe, RawCoverageSample};
    use crate::sample::{CoverageRange, FunctionRange};
    use chromiumoxide::cdp::js_protocol::debugger::{
        EnableParams as DebuggerEnableParams, GetScriptSourceParams,
    };
    use chromiumoxide::cdp::js_protocol::profiler::{
        self, EnableParams as ProfilerEnableParams, StartPreciseCoverageParams,
        StopPreciseCoverageParams, TakePreciseCoverageParams,
    };
    use chromiumoxide::page::Page;

    /// Probe driving the CDP Profiler domain of a chromiumoxide page
    #[derive(Debug)]
    pub struct ChromiumProbe {
        page: Page,
        with_source: bool,
    }

    impl ChromiumProbe {
        /// Wrap a page; samples carry their compiled source text
        #[must_use]
        pub fn new(page: Page) -> Self {
            Self {
                page,
                with_source: true,
            }
        }

        /// Skip fetching compiled source text
        #[must_use]
        pub const fn without_source(mut self) -> Self {
            self.with_source = false;
            self
        }

        fn convert(script: profiler::ScriptCoverage) -> RawCoverageSample {
            let functions = script
                .functions
                .into_iter()
                .map(|f| {
                    let ranges = f
                        .ranges
                        .into_iter()
                        .map(|r| {
                            CoverageRange::new(
                                u32::try_from(r.start_offset).unwrap_or(0),
                                u32::try_from(r.end_offset).unwrap_or(u32::MAX),
                                u64::try_from(r.count).unwrap_or(0),
                            )
                        })
                        .collect();
                    FunctionRange::new(f.function_name, f.is_block_coverage, ranges)
                })
                .collect();

            RawCoverageSample {
                url: script.url,
                script_id: script.script_id.inner().clone(),
                source: None,
                functions,
            }
        }
    }

    #[async_trait]
    impl CoverageProbe for ChromiumProbe {
        async fn start_capture(&mut self) -> CovResult<()> {
            if self.with_source {
                self.page
                    .execute(DebuggerEnableParams::default())
                    .await
                    .map_err(|e| CovError::capture(e.to_string()))?;
            }
            self.page
                .execute(ProfilerEnableParams::default())
                .await
                .map_err(|e| CovError::capture(e.to_string()))?;
            self.page
                .execute(
                    StartPreciseCoverageParams::builder()
                        .call_count(true)
                        .detailed(true)
                        .build(),
                )
                .await
                .map_err(|e| CovError::capture(e.to_string()))?;
            Ok(())
        }

        async fn stop_capture(&mut self) -> CovResult<Vec<RawCoverageSample>> {
            let taken = self
                .page
                .execute(TakePreciseCoverageParams::default())
                .await
                .map_err(|e| CovError::capture(e.to_string()))?;
            let scripts = taken.result.result.clone();

            self.page
                .execute(StopPreciseCoverageParams::default())
                .await
                .map_err(|e| CovError::capture(e.to_string()))?;

            let mut batch = Vec::with_capacity(scripts.len());
            for script in scripts {
                // Scripts evaluated without a URL cannot be attributed to a file.
                if script.url.is_empty() {
                    continue;
                }
                let script_id = script.script_id.clone();
                let mut sample = Self::convert(script);
                if self.with_source {
                    let source = self
                        .page
                        .execute(GetScriptSourceParams::new(script_id))
                        .await
                        .map_err(|e| CovError::capture(e.to_string()))?;
                    sample.source = Some(source.result.script_source.clone());
                }
                batch.push(sample);
            }
            Ok(batch)
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumProbe;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capture_log::{setup, BATCH_DELIMITER, ENV_DIR, ENV_FILE};
    use crate::config::CaptureConfig;
    use crate::sample::{CoverageRange, FunctionRange};
    use std::path::Path;
    use tempfile::TempDir;

    fn test_batch() -> Vec<RawCoverageSample> {
        vec![
            RawCoverageSample::new("/script.js", "123")
                .with_source("function test() { console.log('Hello, world!'); }")
                .with_function(FunctionRange::new(
                    "test",
                    true,
                    vec![CoverageRange::new(0, 10, 1), CoverageRange::new(15, 50, 2)],
                )),
            RawCoverageSample::new("http://example.com/other-script.js", "456").with_function(
                FunctionRange::new("otherFunction", false, vec![CoverageRange::new(5, 25, 0)]),
            ),
        ]
    }

    fn session(tmp: &TempDir) -> CaptureSession {
        setup(
            &CaptureConfig::new()
                .with_dir(tmp.path().display().to_string())
                .with_file("testFile.json"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_non_chromium_is_inert() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut probe = MockProbe::new(test_batch());

        for browser in ["webkit", "firefox", "Chromium", ""] {
            capture_cycle(browser, &mut probe, CapturePhase::Start, &session)
                .await
                .unwrap();
            capture_cycle(browser, &mut probe, CapturePhase::Stop, &session)
                .await
                .unwrap();
        }

        assert!(probe.call_history.is_empty());
        assert_eq!(session.read().unwrap(), "");
    }

    #[tokio::test]
    async fn test_start_does_not_touch_log() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut probe = MockProbe::new(test_batch());

        capture_cycle(CHROMIUM, &mut probe, CapturePhase::Start, &session)
            .await
            .unwrap();

        assert_eq!(probe.calls("start"), 1);
        assert_eq!(probe.calls("stop"), 0);
        assert_eq!(session.read().unwrap(), "");
    }

    #[tokio::test]
    async fn test_stop_appends_batch() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut probe = MockProbe::new(test_batch());

        capture_cycle(CHROMIUM, &mut probe, CapturePhase::Stop, &session)
            .await
            .unwrap();

        let expected = serde_json::to_string(&test_batch()).unwrap() + BATCH_DELIMITER;
        assert_eq!(probe.calls("start"), 0);
        assert_eq!(probe.calls("stop"), 1);
        assert_eq!(session.read().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_n_cycles_give_n_batches() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut probe = MockProbe::new(test_batch());

        for _ in 0..4 {
            capture_cycle(CHROMIUM, &mut probe, CapturePhase::Start, &session)
                .await
                .unwrap();
            capture_cycle(CHROMIUM, &mut probe, CapturePhase::Stop, &session)
                .await
                .unwrap();
        }

        let text = session.read().unwrap();
        assert_eq!(text.matches(BATCH_DELIMITER).count(), 4);
        assert!(text.ends_with(BATCH_DELIMITER));
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_log_untouched() {
        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        let mut probe = MockProbe::new(test_batch());
        probe.fail_stop = Some("target closed".to_string());

        let err = capture_cycle(CHROMIUM, &mut probe, CapturePhase::Stop, &session)
            .await
            .unwrap_err();

        assert!(matches!(err, CovError::Capture { .. }));
        assert_eq!(session.read().unwrap(), "");
    }

    #[tokio::test]
    async fn test_stop_without_log_fails() {
        let tmp = TempDir::new().unwrap();
        let session = CaptureSession::from_paths(tmp.path(), tmp.path().join("never-set-up.json"));
        let mut probe = MockProbe::new(test_batch());

        let err = capture_cycle(CHROMIUM, &mut probe, CapturePhase::Stop, &session)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    // The only test that touches the process environment.
    #[tokio::test]
    async fn test_env_session_discovery_and_cycle() {
        std::env::remove_var(ENV_DIR);
        std::env::remove_var(ENV_FILE);
        let err = CaptureSession::from_env().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(ENV_FILE));

        let mut engine = MockProbe::new(test_batch());
        for phase in [CapturePhase::Start, CapturePhase::Stop] {
            let err = capture_cycle_from_env(CHROMIUM, &mut engine, phase).await.unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains("CDPCOV_COVERAGE_FILE"));
        }
        assert!(engine.call_history.is_empty());
        capture_cycle_from_env("webkit", &mut engine, CapturePhase::Stop).await.unwrap();

        let published = CaptureSession::from_paths("/cov", "/cov/log.json");
        published.export_env();
        assert_eq!(CaptureSession::from_env().unwrap(), published);
        std::env::remove_var(ENV_DIR);
        assert_eq!(CaptureSession::from_env().unwrap().dir(), Path::new("/cov"));

        let tmp = TempDir::new().unwrap();
        let session = session(&tmp);
        session.export_env();
        capture_cycle_from_env(CHROMIUM, &mut engine, CapturePhase::Start).await.unwrap();
        capture_cycle_from_env(CHROMIUM, &mut engine, CapturePhase::Stop).await.unwrap();
        std::env::remove_var(ENV_DIR);
        std::env::remove_var(ENV_FILE);

        let expected = serde_json::to_string(&test_batch()).unwrap() + BATCH_DELIMITER;
        assert_eq!(engine.calls("start"), 1);
        assert_eq!(engine.calls("stop"), 1);
        assert_eq!(session.read().unwrap(), expected);
    }

    #[test]
    fn test_supports_coverage() {
        assert!(supports_coverage("chromium"));
        assert!(!supports_coverage("webkit"));
        assert!(!supports_coverage("firefox"));
    }
}
