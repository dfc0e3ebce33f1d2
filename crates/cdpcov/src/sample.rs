//! Raw V8 coverage samples
//!
//! These mirror what `Profiler.takePreciseCoverage` returns per script, with
//! the compiled source text attached when the capture asked for it. Field
//! names serialize in the engine's camelCase so a batch written by any
//! CDP client can be loaded unchanged.
//!
//! ```text
//! [{"url":"http://localhost:3000/spec/a.js","scriptId":"12","source":"...",
//!   "functions":[{"functionName":"","isBlockCoverage":true,
//!                 "ranges":[{"startOffset":0,"endOffset":120,"count":1}]}]}]
//! ```

use serde::{Deserialize, Serialize};

/// One script's samples from one capture cycle
pub type CaptureBatch = Vec<RawCoverageSample>;

/// A range of the compiled source and how often it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRange {
    /// Start offset (inclusive)
    pub start_offset: u32,
    /// End offset (exclusive)
    pub end_offset: u32,
    /// Number of times this range was executed
    pub count: u64,
}

impl CoverageRange {
    /// Create a range
    #[must_use]
    pub const fn new(start_offset: u32, end_offset: u32, count: u64) -> Self {
        Self {
            start_offset,
            end_offset,
            count,
        }
    }

    /// Whether `offset` falls inside this range
    #[must_use]
    pub const fn contains(&self, offset: u32) -> bool {
        self.start_offset <= offset && offset < self.end_offset
    }

    /// Range length
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end_offset.saturating_sub(self.start_offset)
    }

    /// Whether the range is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coverage data for a single function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRange {
    /// Function name (empty for anonymous functions and the script body)
    pub function_name: String,
    /// Whether `ranges` holds block-level data
    pub is_block_coverage: bool,
    /// Ranges, the first one spanning the whole function
    pub ranges: Vec<CoverageRange>,
}

impl FunctionRange {
    /// Create a function entry
    #[must_use]
    pub fn new(name: impl Into<String>, is_block_coverage: bool, ranges: Vec<CoverageRange>) -> Self {
        Self {
            function_name: name.into(),
            is_block_coverage,
            ranges,
        }
    }

    /// Check if the function was executed at least once
    #[must_use]
    pub fn was_executed(&self) -> bool {
        self.ranges.first().is_some_and(|r| r.count > 0)
    }
}

/// One script's raw coverage as emitted by the browser engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoverageSample {
    /// Location of the compiled script
    pub url: String,
    /// Script ID from CDP
    pub script_id: String,
    /// Full compiled source text, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Functions in this script
    pub functions: Vec<FunctionRange>,
}

impl RawCoverageSample {
    /// Create a sample without source text
    #[must_use]
    pub fn new(url: impl Into<String>, script_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            script_id: script_id.into(),
            source: None,
            functions: Vec::new(),
        }
    }

    /// Attach compiled source text
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Add a function entry
    #[must_use]
    pub fn with_function(mut self, function: FunctionRange) -> Self {
        self.functions.push(function);
        self
    }

    /// Count functions that were executed
    #[must_use]
    pub fn functions_executed(&self) -> usize {
        self.functions.iter().filter(|f| f.was_executed()).count()
    }

    /// Every range of every function, in producer order
    pub fn ranges(&self) -> impl Iterator<Item = &CoverageRange> {
        self.functions.iter().flat_map(|f| f.ranges.iter())
    }

    /// Synthetic sample marking a whole script as never executed
    #[must_use]
    pub fn empty_report(url: impl Into<String>, source_len: u32) -> Self {
        Self::new(url, "").with_function(FunctionRange::new(
            "",
            true,
            vec![CoverageRange::new(0, source_len, 0)],
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains_is_half_open() {
        let range = CoverageRange::new(10, 20, 1);
        assert!(range.contains(10));
        assert!(range.contains(19));
        assert!(!range.contains(20));
        assert!(!range.contains(9));
        assert_eq!(range.len(), 10);
    }

    #[test]
    fn test_range_inverted_is_empty() {
        let range = CoverageRange::new(20, 10, 1);
        assert!(range.is_empty());
        assert!(!range.contains(15));
    }

    #[test]
    fn test_function_executed_uses_outer_range() {
        let func = FunctionRange::new(
            "add",
            true,
            vec![CoverageRange::new(0, 50, 0), CoverageRange::new(10, 20, 3)],
        );
        assert!(!func.was_executed());
    }

    #[test]
    fn test_function_without_ranges_not_executed() {
        let func = FunctionRange::new("empty", false, vec![]);
        assert!(!func.was_executed());
    }

    #[test]
    fn test_sample_deserializes_engine_names() {
        let json = r#"{
            "url": "http://localhost:3000/spec/a.js",
            "scriptId": "42",
            "functions": [{
                "functionName": "test",
                "isBlockCoverage": true,
                "ranges": [{"startOffset": 0, "endOffset": 67, "count": 1}]
            }]
        }"#;
        let sample: RawCoverageSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.script_id, "42");
        assert!(sample.source.is_none());
        assert_eq!(sample.functions[0].function_name, "test");
        assert_eq!(sample.functions[0].ranges[0], CoverageRange::new(0, 67, 1));
        assert_eq!(sample.functions_executed(), 1);
    }

    #[test]
    fn test_sample_without_source_omits_field() {
        let sample = RawCoverageSample::new("/a.js", "1");
        let json = serde_json::to_string(&sample).unwrap();
        assert!(!json.contains("source"));
        assert!(json.contains("scriptId"));
    }

    #[test]
    fn test_empty_report_spans_source() {
        let sample = RawCoverageSample::empty_report("/spec/a.js", 120);
        let ranges: Vec<_> = sample.ranges().collect();
        assert_eq!(ranges.len(), 1);
        assert_eq!(*ranges[0], CoverageRange::new(0, 120, 0));
        assert!(sample.functions[0].is_block_coverage);
        assert!(sample.functions[0].function_name.is_empty());
    }
}
