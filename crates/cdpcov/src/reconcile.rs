//! Coverage Reconciler
//!
//! Folds loaded samples into one [`CoverageMap`] keyed by original source
//! path, then adds a zero-count entry for every working-set file no test
//! ever loaded, so untouched files show up in reports instead of vanishing.

use crate::capture_log::CaptureSession;
use crate::config::CaptureConfig;
use crate::convert::{convert_sample, convert_unmapped, LineIndex, Mapping};
use crate::loader::{load_coverage, UrlMode};
use crate::model::{CoverageMap, FileCoverage};
use crate::paths;
use crate::report::{ReportContext, ReporterKind};
use crate::result::{CovError, CovResult};
use crate::sample::RawCoverageSample;
use crate::source_map::SourceMapping;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Absolute project root
#[must_use]
pub fn project_root(config: &CaptureConfig) -> PathBuf {
    paths::absolutize(&config.root, Path::new(""))
}

/// The authoritative list of compiled files coverage is reported for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    files: Vec<PathBuf>,
    filtered: bool,
}

impl WorkingSet {
    /// A working set that admits every local compiled file
    #[must_use]
    pub fn unfiltered() -> Self {
        Self::default()
    }

    /// Expand include globs and drop files matching an exclude glob
    pub fn resolve(config: &CaptureConfig) -> CovResult<Self> {
        if config.include.is_empty() {
            return Ok(Self::unfiltered());
        }
        let root = project_root(config);

        let mut files = BTreeSet::new();
        for pattern in &config.include {
            let resolved = paths::absolutize(Path::new(pattern), &root);
            let entries = glob::glob_with(&resolved.to_string_lossy(), GLOB_OPTIONS)
                .map_err(|e| CovError::config(format!("invalid include pattern '{pattern}': {e}")))?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => {
                        files.insert(paths::normalize(&path));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(target: "cdpcov.reconcile", error = %e, "unreadable path while expanding include");
                    }
                }
            }
        }

        let excludes = config
            .exclude
            .iter()
            .map(|pattern| {
                let resolved = paths::absolutize(Path::new(pattern), &root);
                Pattern::new(&resolved.to_string_lossy())
                    .map_err(|e| CovError::config(format!("invalid exclude pattern '{pattern}': {e}")))
            })
            .collect::<CovResult<Vec<_>>>()?;
        files.retain(|file| !excludes.iter().any(|p| p.matches_path_with(file, GLOB_OPTIONS)));

        Ok(Self {
            files: files.into_iter().collect(),
            filtered: true,
        })
    }

    /// Whether include globs restrict the set
    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Files in the set, sorted
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Whether `path` belongs to the set
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        !self.filtered || self.files.binary_search_by(|f| f.as_path().cmp(path)).is_ok()
    }
}

/// Original source path for a compiled file with no usable map
///
/// The output directory prefix is swapped for the source directory and the
/// compiled extension for the source extension.
#[must_use]
pub fn source_path_for(config: &CaptureConfig, compiled: &Path) -> PathBuf {
    let root = project_root(config);
    let out_dir = paths::absolutize(Path::new(&config.out_dir), &root);
    let src_dir = paths::absolutize(Path::new(&config.src_dir), &root);

    let mut derived = compiled
        .strip_prefix(&out_dir)
        .map_or_else(|_| compiled.to_path_buf(), |rest| src_dir.join(rest));

    let compiled_ext = config.compiled_ext.trim_start_matches('.');
    if derived.extension().is_some_and(|ext| ext == compiled_ext) {
        derived.set_extension(config.source_ext.trim_start_matches('.'));
    }
    derived
}

/// Folds samples into an aggregate for one configuration
#[derive(Debug)]
pub struct Reconciler<'a> {
    config: &'a CaptureConfig,
    root: PathBuf,
    mode: UrlMode,
    working_set: WorkingSet,
}

impl<'a> Reconciler<'a> {
    /// Prepare a reconciler, expanding the working set
    pub fn new(config: &'a CaptureConfig) -> CovResult<Self> {
        let working_set = WorkingSet::resolve(config)?;
        tracing::debug!(
            target: "cdpcov.reconcile",
            files = working_set.files().len(),
            filtered = working_set.is_filtered(),
            "working set resolved"
        );
        Ok(Self {
            config,
            root: project_root(config),
            mode: UrlMode::from_base(&config.url),
            working_set,
        })
    }

    /// The expanded working set
    #[must_use]
    pub const fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// URL mode samples were rewritten with
    #[must_use]
    pub const fn url_mode(&self) -> &UrlMode {
        &self.mode
    }

    /// Local compiled file a rewritten sample URL names, if any
    #[must_use]
    pub fn locate(&self, url: &str) -> Option<PathBuf> {
        let url = url.split(['?', '#']).next().unwrap_or(url);
        if url.is_empty() || url.contains("://") {
            return None;
        }
        let path = paths::absolutize(Path::new(url), &self.root);
        if self.working_set.is_filtered() {
            return self.working_set.contains(&path).then_some(path);
        }
        let compiled_ext = self.config.compiled_ext.trim_start_matches('.');
        path.extension().is_some_and(|ext| ext == compiled_ext).then_some(path)
    }

    fn convert(&self, sample: &RawCoverageSample, compiled: &Path, text: &str) -> CovResult<Vec<FileCoverage>> {
        Ok(match SourceMapping::load(compiled, text, &self.root)? {
            Some(map) => convert_sample(sample, text, &Mapping::SourceMap(&map)),
            None => convert_unmapped(sample, text, compiled),
        })
    }

    /// Zero-count coverage for a working-set file no sample touched
    pub fn empty_coverage(&self, compiled: &Path) -> CovResult<Vec<FileCoverage>> {
        let text = std::fs::read_to_string(compiled).map_err(|e| CovError::io(compiled, e))?;
        let sample = RawCoverageSample::empty_report(compiled.to_string_lossy(), LineIndex::new(&text).len());
        let derived = source_path_for(self.config, compiled);
        tracing::debug!(target: "cdpcov.reconcile", script = %compiled.display(), "synthesizing zero coverage");

        let map = SourceMapping::load(compiled, &text, &self.root)?;
        let mut files = match &map {
            Some(map) if map.sources().len() > 1 => convert_sample(&sample, &text, &Mapping::SourceMap(map)),
            Some(map) => convert_sample(&sample, &text, &Mapping::SourceMap(map))
                .into_iter()
                .map(|file| file.with_path(&derived))
                .collect(),
            None => convert_unmapped(&sample, &text, &derived),
        };
        if files.is_empty() {
            files.push(FileCoverage::new(derived));
        }
        Ok(files)
    }

    /// Fold samples into an aggregate and fill in untouched files
    pub fn reconcile(&self, samples: &[RawCoverageSample]) -> CovResult<CoverageMap> {
        let mut coverage = CoverageMap::new();
        let mut covered = BTreeSet::new();

        for sample in samples {
            let Some(compiled) = self.locate(&sample.url) else {
                tracing::debug!(target: "cdpcov.reconcile", url = %sample.url, "skipping sample outside working set");
                continue;
            };
            let text = match &sample.source {
                Some(source) => source.clone(),
                None if !compiled.is_file() => {
                    tracing::debug!(target: "cdpcov.reconcile", path = %compiled.display(), "skipping sample with no file on disk");
                    continue;
                }
                None => std::fs::read_to_string(&compiled).map_err(|e| CovError::io(&compiled, e))?,
            };
            for file in self.convert(sample, &compiled, &text)? {
                coverage.merge_file(file);
            }
            covered.insert(compiled);
        }

        let mut untouched = 0usize;
        for compiled in self.working_set.files() {
            if covered.contains(compiled) {
                continue;
            }
            untouched += 1;
            for file in self.empty_coverage(compiled)? {
                coverage.merge_file(file);
            }
        }

        tracing::info!(
            target: "cdpcov.reconcile",
            samples = samples.len(),
            scripts = covered.len(),
            untouched,
            files = coverage.len(),
            "coverage reconciled"
        );
        Ok(coverage)
    }
}

/// Fold samples into an aggregate under `config`
pub fn reconcile(config: &CaptureConfig, samples: &[RawCoverageSample]) -> CovResult<CoverageMap> {
    Reconciler::new(config)?.reconcile(samples)
}

/// What a report run produced
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// The reconciled aggregate
    pub coverage: CoverageMap,
    /// Files written, in reporter order
    pub written: Vec<PathBuf>,
    /// Text meant for the terminal
    pub console: Option<String>,
}

/// Load a session's log, reconcile it and render every configured reporter
///
/// Reporters write under `<dir>/coverage-report`; file paths in reports are
/// shown relative to the capture directory.
pub fn create_coverage_report(config: &CaptureConfig, session: &CaptureSession) -> CovResult<ReportOutcome> {
    let reporters = config
        .reporters
        .iter()
        .map(|name| name.parse::<ReporterKind>())
        .collect::<CovResult<Vec<_>>>()?;

    let reconciler = Reconciler::new(config)?;
    let samples = load_coverage(session, reconciler.url_mode())?;
    let coverage = reconciler.reconcile(&samples)?;

    let context = ReportContext::new(session.report_dir(), session.dir());
    std::fs::create_dir_all(context.out_dir()).map_err(|e| CovError::io(context.out_dir(), e))?;

    let mut written = Vec::new();
    let mut console = None;
    for reporter in reporters {
        tracing::debug!(target: "cdpcov.report", reporter = reporter.name(), "rendering");
        written.extend(reporter.write(&coverage, &context)?);
        if reporter == ReporterKind::Text {
            console = Some(reporter.console(&coverage, &context));
        }
    }

    tracing::info!(
        target: "cdpcov.report",
        out_dir = %context.out_dir().display(),
        files = written.len(),
        "coverage report written"
    );
    Ok(ReportOutcome {
        coverage,
        written,
        console,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sample::{CoverageRange, FunctionRange};
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, CaptureConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("spec/nested")).unwrap();
        fs::write(dir.path().join("spec/a.js"), "a();\nb();\n").unwrap();
        fs::write(dir.path().join("spec/nested/b.js"), "c();\n").unwrap();
        fs::write(dir.path().join("spec/a.test.js"), "test();\n").unwrap();
        let config = CaptureConfig::new()
            .with_root(dir.path())
            .with_url("http://localhost:3000")
            .with_include(["spec/**/*.js"])
            .with_exclude(["spec/**/*.test.js"]);
        (dir, config)
    }

    fn covered(url: &str, len: u32) -> RawCoverageSample {
        RawCoverageSample::new(url, "1").with_function(FunctionRange::new(
            "",
            true,
            vec![CoverageRange::new(0, len, 1)],
        ))
    }

    #[test]
    fn test_working_set_include_exclude() {
        let (dir, config) = project();
        let set = WorkingSet::resolve(&config).unwrap();
        let root = paths::normalize(dir.path());
        assert_eq!(
            set.files(),
            &[root.join("spec/a.js"), root.join("spec/nested/b.js")]
        );
        assert!(set.contains(&root.join("spec/a.js")));
        assert!(!set.contains(&root.join("spec/a.test.js")));
    }

    #[test]
    fn test_working_set_deduplicates_overlapping_globs() {
        let (_dir, config) = project();
        let config = config.with_include(["spec/**/*.js", "spec/*.js"]);
        let set = WorkingSet::resolve(&config).unwrap();
        assert_eq!(set.files().len(), 2);
    }

    #[test]
    fn test_working_set_invalid_pattern() {
        let (_dir, config) = project();
        let err = WorkingSet::resolve(&config.with_include(["spec/[.js"])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_include_is_unfiltered() {
        let set = WorkingSet::resolve(&CaptureConfig::new()).unwrap();
        assert!(!set.is_filtered());
        assert!(set.contains(Path::new("/anything.js")));
    }

    #[test]
    fn test_source_path_for() {
        let config = CaptureConfig::new().with_root("/proj");
        assert_eq!(
            source_path_for(&config, Path::new("/proj/spec/five/script5.js")),
            PathBuf::from("/proj/src/five/script5.ts")
        );
        // Outside the output directory only the extension changes
        assert_eq!(
            source_path_for(&config, Path::new("/elsewhere/x.js")),
            PathBuf::from("/elsewhere/x.ts")
        );
    }

    #[test]
    fn test_locate_origin_urls() {
        let (dir, config) = project();
        let reconciler = Reconciler::new(&config).unwrap();
        let root = paths::normalize(dir.path());
        assert_eq!(reconciler.locate("./spec/a.js?v=3"), Some(root.join("spec/a.js")));
        assert_eq!(reconciler.locate("./spec/a.test.js"), None);
        assert_eq!(reconciler.locate("https://cdn.example.com/spec/a.js"), None);
        assert_eq!(reconciler.locate(""), None);
    }

    #[test]
    fn test_reconcile_adds_untouched_files() {
        let (dir, config) = project();
        let samples = vec![covered("./spec/a.js", 10)];
        let coverage = reconcile(&config, &samples).unwrap();
        let root = paths::normalize(dir.path());

        // a.js has no map: reported against itself
        let a = coverage.get(&root.join("spec/a.js")).unwrap();
        assert_eq!(a.summary().lines.hit, 2);

        // b.js was never loaded: zero entry under its derived source path
        let b = coverage.get(&root.join("src/nested/b.ts")).unwrap();
        assert_eq!(b.summary().lines.found, 1);
        assert_eq!(b.summary().lines.hit, 0);
        assert_eq!(b.summary().branches.found, 1);
        assert_eq!(coverage.len(), 2);
    }

    #[test]
    fn test_reconcile_sums_repeat_samples() {
        let (dir, config) = project();
        let samples = vec![covered("./spec/a.js", 10), covered("./spec/a.js", 10)];
        let coverage = reconcile(&config, &samples).unwrap();
        let a = coverage.get(&paths::normalize(dir.path()).join("spec/a.js")).unwrap();
        assert_eq!(a.line_hits(1), Some(2));
    }

    #[test]
    fn test_reconcile_prefers_sample_source() {
        let (dir, config) = project();
        let sample = covered("./spec/a.js", 12).with_source("x();\ny();\nz();\n");
        let coverage = reconcile(&config, &[sample]).unwrap();
        let a = coverage.get(&paths::normalize(dir.path()).join("spec/a.js")).unwrap();
        assert_eq!(a.statements().len(), 3);
    }

    #[test]
    fn test_reconcile_skips_foreign_urls() {
        let (_dir, config) = project();
        let samples = vec![covered("https://cdn.example.com/lib.js", 10)];
        let coverage = reconcile(&config, &samples).unwrap();
        // Only the two zero entries
        assert_eq!(coverage.len(), 2);
        assert_eq!(coverage.summary().lines.hit, 0);
    }

    #[test]
    fn test_empty_working_set_produces_empty_map() {
        let dir = TempDir::new().unwrap();
        let config = CaptureConfig::new()
            .with_root(dir.path())
            .with_include(["spec/**/*.js"]);
        assert!(reconcile(&config, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_zero_entry_for_unmapped_multi_source_file() {
        let (dir, config) = project();
        fs::write(
            dir.path().join("spec/nested/b.js.map"),
            r#"{"version":3,"sources":["../../src/nested/b.ts","../../src/nested/c.ts"],"names":[],"mappings":""}"#,
        )
        .unwrap();
        let coverage = reconcile(&config, &[]).unwrap();
        let root = paths::normalize(dir.path());
        assert_eq!(coverage.len(), 2);
        assert!(coverage.contains(&root.join("src/nested/b.ts")));
        assert!(coverage.get(&root.join("src/nested/b.ts")).unwrap().is_empty());
    }

    #[test]
    fn test_unfiltered_skips_missing_files() {
        let (dir, _) = project();
        let config = CaptureConfig::new()
            .with_root(dir.path())
            .with_url("http://localhost:3000");
        let samples = vec![
            covered("./spec/a.js", 10),
            covered("./vendor/lib.js", 10),
            covered("./vendor/inline.js", 4).with_source("q();"),
        ];
        let coverage = reconcile(&config, &samples).unwrap();
        let root = paths::normalize(dir.path());
        assert_eq!(coverage.len(), 2);
        assert!(coverage.contains(&root.join("spec/a.js")));
        assert!(coverage.contains(&root.join("vendor/inline.js")));
    }

    #[test]
    fn test_zero_entry_uses_single_source_map() {
        let (dir, config) = project();
        fs::write(
            dir.path().join("spec/nested/b.js.map"),
            r#"{"version":3,"sources":["../../src/nested/b.ts"],"names":[],"mappings":"AAEA"}"#,
        )
        .unwrap();
        let coverage = reconcile(&config, &[covered("./spec/a.js", 10)]).unwrap();
        let b = coverage
            .get(&paths::normalize(dir.path()).join("src/nested/b.ts"))
            .unwrap();
        // Mapped onto original line 3
        assert_eq!(b.line_hits(3), Some(0));
        assert_eq!(b.line_hits(1), None);
    }
}
