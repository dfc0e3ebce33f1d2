//! Sample Loader
//!
//! Turns the capture log back into a flat list of samples, first written
//! first returned, and rewrites each sample so it points at files on disk:
//!
//! - `url` becomes `./<path>` relative to the test-server origin, or stays a
//!   filesystem path when the configured `url` is itself a path.
//! - the `sourceMappingURL` comment in `source` points at `<url>.map`.
//!
//! Loading never writes to disk.

use crate::capture_log::{CaptureSession, BATCH_DELIMITER};
use crate::result::{CovError, CovResult};
use crate::sample::RawCoverageSample;
use regex::Regex;
use std::sync::OnceLock;

/// How recorded URLs relate to files on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlMode {
    /// Scripts were loaded from the filesystem; URLs are paths already
    Filesystem,
    /// Scripts were served from this origin (no trailing slash)
    Origin(String),
}

impl UrlMode {
    /// Decide the mode from the configured base URL
    #[must_use]
    pub fn from_base(url: &str) -> Self {
        if url.starts_with('/') {
            Self::Filesystem
        } else {
            Self::Origin(url.trim_end_matches('/').to_string())
        }
    }

    /// Whether URLs are filesystem paths
    #[must_use]
    pub const fn is_filesystem(&self) -> bool {
        matches!(self, Self::Filesystem)
    }

    /// Rewrite one recorded URL
    #[must_use]
    pub fn rewrite_url(&self, url: &str) -> String {
        match self {
            Self::Filesystem => url.strip_prefix("file://").unwrap_or(url).to_string(),
            Self::Origin(origin) => url
                .strip_prefix(origin.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map_or_else(|| url.to_string(), |rest| format!("./{rest}")),
        }
    }
}

#[allow(clippy::expect_used)]
pub(crate) fn source_map_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*//[#@][ \t]*sourceMappingURL=)(\S+)[ \t]*\r?$")
            .expect("static pattern compiles")
    })
}

/// The reference in the script's last `sourceMappingURL` comment line
pub(crate) fn last_source_map_ref(text: &str) -> Option<regex::Match<'_>> {
    source_map_comment()
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(2))
}

/// Point the effective external `sourceMappingURL` comment at `map_ref`
#[must_use]
pub fn rewrite_source_map_ref(source: &str, map_ref: &str) -> String {
    match last_source_map_ref(source) {
        Some(reference) if !reference.as_str().starts_with("data:") => {
            let mut rewritten = String::with_capacity(source.len() + map_ref.len());
            rewritten.push_str(&source[..reference.start()]);
            rewritten.push_str(map_ref);
            rewritten.push_str(&source[reference.end()..]);
            rewritten
        }
        _ => source.to_string(),
    }
}

/// Rewrite one sample for on-disk resolution
#[must_use]
pub fn rewrite_sample(mut sample: RawCoverageSample, mode: &UrlMode) -> RawCoverageSample {
    let url = mode.rewrite_url(&sample.url);
    if let Some(source) = sample.source.take() {
        let map_ref = format!("{url}.map");
        sample.source = Some(rewrite_source_map_ref(&source, &map_ref));
    }
    sample.url = url;
    sample
}

/// Split log text into batches and flatten them, without rewriting
pub fn parse_log(text: &str) -> CovResult<Vec<RawCoverageSample>> {
    let terminated = text.ends_with(BATCH_DELIMITER);
    let fragments: Vec<&str> = text.split(BATCH_DELIMITER).collect();
    let last = fragments.len().saturating_sub(1);

    let mut samples = Vec::new();
    let mut batches = 0usize;

    for (index, fragment) in fragments.iter().enumerate() {
        if fragment.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Vec<RawCoverageSample>>(fragment) {
            Ok(batch) => {
                batches += 1;
                samples.extend(batch);
            }
            Err(e) if index == last && !terminated => {
                tracing::warn!(
                    target: "cdpcov.loader",
                    batch = index,
                    error = %e,
                    "discarding torn trailing batch"
                );
            }
            Err(e) => return Err(CovError::parse(format!("capture batch {index}"), e)),
        }
    }

    tracing::debug!(target: "cdpcov.loader", batches, samples = samples.len(), "parsed capture log");
    Ok(samples)
}

/// Load and rewrite every sample in a session's log
pub fn load_coverage(session: &CaptureSession, mode: &UrlMode) -> CovResult<Vec<RawCoverageSample>> {
    let text = session.read()?;
    let samples = parse_log(&text)?;
    Ok(samples
        .into_iter()
        .map(|sample| rewrite_sample(sample, mode))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sample::{CoverageRange, FunctionRange};
    use proptest::prelude::*;

    fn sample(url: &str) -> RawCoverageSample {
        RawCoverageSample::new(url, "1").with_function(FunctionRange::new(
            "",
            true,
            vec![CoverageRange::new(0, 10, 1)],
        ))
    }

    fn log_of(batches: &[Vec<RawCoverageSample>]) -> String {
        batches
            .iter()
            .map(|b| serde_json::to_string(b).unwrap() + BATCH_DELIMITER)
            .collect()
    }

    #[test]
    fn test_url_mode_from_base() {
        assert!(UrlMode::from_base("/tmp/test/spec").is_filesystem());
        assert_eq!(
            UrlMode::from_base("http://localhost:8000/"),
            UrlMode::Origin("http://localhost:8000".to_string())
        );
    }

    #[test]
    fn test_origin_rewrite() {
        let mode = UrlMode::from_base("http://localhost:8000");
        assert_eq!(
            mode.rewrite_url("http://localhost:8000/spec/components/nav.js"),
            "./spec/components/nav.js"
        );
        // Foreign origins and lookalike prefixes pass through
        assert_eq!(
            mode.rewrite_url("https://cdn.example.com/lib.js"),
            "https://cdn.example.com/lib.js"
        );
        assert_eq!(
            mode.rewrite_url("http://localhost:80001/a.js"),
            "http://localhost:80001/a.js"
        );
    }

    #[test]
    fn test_filesystem_rewrite() {
        let mode = UrlMode::Filesystem;
        assert_eq!(mode.rewrite_url("/tmp/test/a.js"), "/tmp/test/a.js");
        assert_eq!(mode.rewrite_url("file:///tmp/test/a.js"), "/tmp/test/a.js");
    }

    #[test]
    fn test_rewrite_source_map_ref() {
        let source = "export function a() {}\n//# sourceMappingURL=a.js.map";
        assert_eq!(
            rewrite_source_map_ref(source, "./spec/a.js.map"),
            "export function a() {}\n//# sourceMappingURL=./spec/a.js.map"
        );
    }

    #[test]
    fn test_rewrite_leaves_inline_maps() {
        let source = "x()\n//# sourceMappingURL=data:application/json;base64,e30=";
        assert_eq!(rewrite_source_map_ref(source, "./x.js.map"), source);
    }

    #[test]
    fn test_rewrite_ignores_comment_text_inside_code() {
        let source = "const s = \"//# sourceMappingURL=fake.map\"; run();\n//# sourceMappingURL=a.js.map\n";
        assert_eq!(
            rewrite_source_map_ref(source, "./spec/a.js.map"),
            "const s = \"//# sourceMappingURL=fake.map\"; run();\n//# sourceMappingURL=./spec/a.js.map\n"
        );
        let only_literal = "const s = \"//# sourceMappingURL=fake.map\";\n";
        assert_eq!(rewrite_source_map_ref(only_literal, "./x.js.map"), only_literal);
    }

    #[test]
    fn test_rewrite_only_last_comment() {
        let source = "//# sourceMappingURL=vendor.js.map\nb();\n//@ sourceMappingURL=b.js.map";
        assert_eq!(
            rewrite_source_map_ref(source, "./b.js.map"),
            "//# sourceMappingURL=vendor.js.map\nb();\n//@ sourceMappingURL=./b.js.map"
        );
        assert_eq!(last_source_map_ref(source).unwrap().as_str(), "b.js.map");
    }

    #[test]
    fn test_rewrite_keeps_crlf_line_end() {
        let source = "a();\r\n//# sourceMappingURL=a.js.map\r\n";
        assert_eq!(
            rewrite_source_map_ref(source, "./a.js.map"),
            "a();\r\n//# sourceMappingURL=./a.js.map\r\n"
        );
    }

    #[test]
    fn test_rewrite_sample_with_source() {
        let mode = UrlMode::from_base("http://localhost:3000");
        let rewritten = rewrite_sample(
            sample("http://localhost:3000/spec/a.js")
                .with_source("a()\n//# sourceMappingURL=http://build-host/a.js.map"),
            &mode,
        );
        assert_eq!(rewritten.url, "./spec/a.js");
        assert_eq!(
            rewritten.source.as_deref(),
            Some("a()\n//# sourceMappingURL=./spec/a.js.map")
        );
    }

    #[test]
    fn test_rewrite_sample_without_source_only_changes_url() {
        let mode = UrlMode::from_base("http://localhost:3000");
        let original = sample("http://localhost:3000/spec/b.js");
        let rewritten = rewrite_sample(original.clone(), &mode);
        assert_eq!(rewritten.url, "./spec/b.js");
        assert!(rewritten.source.is_none());
        assert_eq!(rewritten.functions, original.functions);
    }

    #[test]
    fn test_parse_empty_log() {
        assert!(parse_log("").unwrap().is_empty());
        assert!(parse_log(BATCH_DELIMITER).unwrap().is_empty());
    }

    #[test]
    fn test_parse_flattens_in_order() {
        let text = log_of(&[vec![sample("/a.js"), sample("/b.js")], vec![sample("/c.js")]]);
        let urls: Vec<_> = parse_log(&text).unwrap().into_iter().map(|s| s.url).collect();
        assert_eq!(urls, vec!["/a.js", "/b.js", "/c.js"]);
    }

    #[test]
    fn test_parse_tolerates_missing_trailing_delimiter() {
        let text = log_of(&[vec![sample("/a.js")]]) + &serde_json::to_string(&vec![sample("/b.js")]).unwrap();
        assert_eq!(parse_log(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_discards_torn_tail() {
        let text = log_of(&[vec![sample("/a.js")]]) + r#"[{"url":"/b.js","scr"#;
        let samples = parse_log(&text).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].url, "/a.js");
    }

    #[test]
    fn test_parse_rejects_corrupt_middle_batch() {
        let text = format!(
            "{}not json{}{}",
            log_of(&[vec![sample("/a.js")]]),
            BATCH_DELIMITER,
            log_of(&[vec![sample("/b.js")]])
        );
        let err = parse_log(&text).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("batch 1"));
    }

    proptest! {
        #[test]
        fn prop_flatten_preserves_order(sizes in proptest::collection::vec(0usize..4, 0..6)) {
            let mut counter = 0;
            let batches: Vec<Vec<RawCoverageSample>> = sizes
                .iter()
                .map(|&n| {
                    (0..n)
                        .map(|_| {
                            counter += 1;
                            sample(&format!("/s{counter}.js"))
                        })
                        .collect()
                })
                .collect();

            let expected: Vec<String> = batches.iter().flatten().map(|s| s.url.clone()).collect();
            let loaded: Vec<String> = parse_log(&log_of(&batches))
                .unwrap()
                .into_iter()
                .map(|s| s.url)
                .collect();
            prop_assert_eq!(loaded, expected);
        }
    }
}
