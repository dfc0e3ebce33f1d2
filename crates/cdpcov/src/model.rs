//! Aggregate coverage model
//!
//! Counts are keyed by locations in the *original* source file, so samples
//! of the same file from different capture cycles land on the same keys and
//! merge by addition. Addition makes merging commutative and associative:
//! the order tests ran in never changes a report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A position in an original source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub column: u32,
}

impl Position {
    /// Create a position
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Identity of a function: where it starts and what it is called
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FunctionKey {
    /// Start of the function
    pub start: Position,
    /// Function name
    pub name: String,
}

/// Found/hit pair for one kind of location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Locations present
    pub found: usize,
    /// Locations executed at least once
    pub hit: usize,
}

impl Tally {
    /// Percentage hit; an empty tally is fully covered
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.found == 0 {
            return 100.0;
        }
        (self.hit as f64 / self.found as f64) * 100.0
    }

    fn add(&mut self, other: Self) {
        self.found += other.found;
        self.hit += other.hit;
    }

    fn of<'a>(counts: impl Iterator<Item = &'a u64>) -> Self {
        let mut tally = Self::default();
        for &count in counts {
            tally.found += 1;
            if count > 0 {
                tally.hit += 1;
            }
        }
        tally
    }
}

/// Coverage summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    /// Line (statement) coverage
    pub lines: Tally,
    /// Function coverage
    pub functions: Tally,
    /// Branch coverage
    pub branches: Tally,
}

impl CoverageSummary {
    /// Accumulate another summary
    pub fn add(&mut self, other: &Self) {
        self.lines.add(other.lines);
        self.functions.add(other.functions);
        self.branches.add(other.branches);
    }
}

/// Coverage of one original source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCoverage {
    path: PathBuf,
    statements: BTreeMap<u32, u64>,
    functions: BTreeMap<FunctionKey, u64>,
    branches: BTreeMap<Position, u64>,
    source_text: Option<String>,
}

impl FileCoverage {
    /// Create an empty entry for `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            statements: BTreeMap::new(),
            functions: BTreeMap::new(),
            branches: BTreeMap::new(),
            source_text: None,
        }
    }

    /// Original file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-key this entry under another path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Attach original source text embedded in a source map
    #[must_use]
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Original source text from the source map, if it carried one
    #[must_use]
    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }

    /// Add hits to a line
    pub fn add_statement(&mut self, line: u32, count: u64) {
        let hits = self.statements.entry(line).or_insert(0);
        *hits = hits.saturating_add(count);
    }

    /// Raise a line to at least `count` hits
    pub fn raise_statement(&mut self, line: u32, count: u64) {
        let hits = self.statements.entry(line).or_insert(0);
        *hits = (*hits).max(count);
    }

    /// Add hits to a function
    pub fn add_function(&mut self, start: Position, name: &str, count: u64) {
        let key = FunctionKey {
            start,
            name: name.to_string(),
        };
        let hits = self.functions.entry(key).or_insert(0);
        *hits = hits.saturating_add(count);
    }

    /// Add hits to a branch
    pub fn add_branch(&mut self, start: Position, count: u64) {
        let hits = self.branches.entry(start).or_insert(0);
        *hits = hits.saturating_add(count);
    }

    /// Sum another entry's counts into this one
    pub fn merge(&mut self, other: &Self) {
        for (&line, &count) in &other.statements {
            self.add_statement(line, count);
        }
        for (key, &count) in &other.functions {
            self.add_function(key.start, &key.name, count);
        }
        for (&start, &count) in &other.branches {
            self.add_branch(start, count);
        }
        if self.source_text.is_none() {
            self.source_text.clone_from(&other.source_text);
        }
    }

    /// Line hit counts, ordered by line
    #[must_use]
    pub const fn statements(&self) -> &BTreeMap<u32, u64> {
        &self.statements
    }

    /// Function hit counts, ordered by position
    #[must_use]
    pub const fn functions(&self) -> &BTreeMap<FunctionKey, u64> {
        &self.functions
    }

    /// Branch hit counts, ordered by position
    #[must_use]
    pub const fn branches(&self) -> &BTreeMap<Position, u64> {
        &self.branches
    }

    /// Hits recorded for a line, if it is countable
    #[must_use]
    pub fn line_hits(&self, line: u32) -> Option<u64> {
        self.statements.get(&line).copied()
    }

    /// Countable lines that never ran
    #[must_use]
    pub fn uncovered_lines(&self) -> Vec<u32> {
        self.statements
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&line, _)| line)
            .collect()
    }

    /// Found/hit totals for this file
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        CoverageSummary {
            lines: Tally::of(self.statements.values()),
            functions: Tally::of(self.functions.values()),
            branches: Tally::of(self.branches.values()),
        }
    }

    /// Whether no location is countable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.functions.is_empty() && self.branches.is_empty()
    }
}

/// Coverage keyed by original source path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
    files: BTreeMap<PathBuf, FileCoverage>,
}

impl CoverageMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one file entry, summing counts with any existing entry
    pub fn merge_file(&mut self, file: FileCoverage) {
        match self.files.get_mut(file.path()) {
            Some(existing) => existing.merge(&file),
            None => {
                self.files.insert(file.path().to_path_buf(), file);
            }
        }
    }

    /// Merge every entry of another map
    pub fn merge(&mut self, other: Self) {
        for file in other.files.into_values() {
            self.merge_file(file);
        }
    }

    /// Entry for a path
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    /// Whether a path has an entry
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Entries ordered by path
    pub fn files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files.values()
    }

    /// Paths ordered
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the map has no files
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Totals across all files
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let mut total = CoverageSummary::default();
        for file in self.files.values() {
            total.add(&file.summary());
        }
        total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(path: &str, lines: &[(u32, u64)]) -> FileCoverage {
        let mut file = FileCoverage::new(path);
        for &(line, count) in lines {
            file.add_statement(line, count);
        }
        file
    }

    #[test]
    fn test_tally_percent() {
        assert!((Tally { found: 4, hit: 1 }.percent() - 25.0).abs() < f64::EPSILON);
        assert!((Tally::default().percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_sums_same_location() {
        let mut map = CoverageMap::new();
        map.merge_file(file("/src/a.ts", &[(1, 1), (2, 0)]));
        map.merge_file(file("/src/a.ts", &[(1, 2), (3, 1)]));

        let merged = map.get(Path::new("/src/a.ts")).unwrap();
        assert_eq!(merged.line_hits(1), Some(3));
        assert_eq!(merged.line_hits(2), Some(0));
        assert_eq!(merged.line_hits(3), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_merge_keeps_embedded_source_text() {
        let mut map = CoverageMap::new();
        map.merge_file(file("/src/a.ts", &[(1, 1)]));
        map.merge_file(file("/src/a.ts", &[(1, 1)]).with_source_text("let a = 1;"));
        assert_eq!(map.get(Path::new("/src/a.ts")).unwrap().source_text(), Some("let a = 1;"));
    }

    #[test]
    fn test_disjoint_ranges_not_double_counted() {
        let mut map = CoverageMap::new();
        map.merge_file(file("/src/a.ts", &[(1, 1), (2, 1), (3, 0), (4, 0)]));
        map.merge_file(file("/src/a.ts", &[(1, 0), (2, 0), (3, 1), (4, 1)]));

        let merged = map.get(Path::new("/src/a.ts")).unwrap();
        assert!(merged.statements().values().all(|&c| c == 1));
        assert_eq!(merged.summary().lines, Tally { found: 4, hit: 4 });
    }

    #[test]
    fn test_raise_statement_keeps_maximum() {
        let mut file = FileCoverage::new("/src/a.ts");
        file.raise_statement(1, 2);
        file.raise_statement(1, 0);
        file.raise_statement(1, 5);
        assert_eq!(file.line_hits(1), Some(5));
    }

    #[test]
    fn test_functions_and_branches() {
        let mut file = FileCoverage::new("/src/a.ts");
        file.add_function(Position::new(1, 0), "add", 1);
        file.add_function(Position::new(5, 0), "sub", 0);
        file.add_branch(Position::new(1, 0), 1);
        file.add_branch(Position::new(2, 4), 0);

        let summary = file.summary();
        assert_eq!(summary.functions, Tally { found: 2, hit: 1 });
        assert_eq!(summary.branches, Tally { found: 2, hit: 1 });
        assert!(summary.lines.found == 0);
    }

    #[test]
    fn test_uncovered_lines() {
        let file = file("/src/a.ts", &[(1, 1), (2, 0), (7, 0)]);
        assert_eq!(file.uncovered_lines(), vec![2, 7]);
    }

    #[test]
    fn test_map_summary_totals() {
        let mut map = CoverageMap::new();
        map.merge_file(file("/src/a.ts", &[(1, 1)]));
        map.merge_file(file("/src/b.ts", &[(1, 0), (2, 0)]));
        assert_eq!(map.summary().lines, Tally { found: 3, hit: 1 });
        let paths: Vec<_> = map.paths().collect();
        assert_eq!(paths, vec![Path::new("/src/a.ts"), Path::new("/src/b.ts")]);
    }

    #[test]
    fn test_saturating_counts() {
        let mut file = FileCoverage::new("/src/a.ts");
        file.add_statement(1, u64::MAX);
        file.add_statement(1, 1);
        assert_eq!(file.line_hits(1), Some(u64::MAX));
    }

    fn arb_file() -> impl Strategy<Value = FileCoverage> {
        (
            prop_oneof![Just("/src/a.ts"), Just("/src/b.ts")],
            proptest::collection::vec((1u32..8, 0u64..5), 0..6),
            proptest::collection::vec((1u32..8, 0u32..3, 0u64..5), 0..4),
        )
            .prop_map(|(path, lines, branches)| {
                let mut file = FileCoverage::new(path);
                for (line, count) in lines {
                    file.add_statement(line, count);
                }
                for (line, column, count) in branches {
                    file.add_branch(Position::new(line, column), count);
                    file.add_function(Position::new(line, column), "f", count);
                }
                file
            })
    }

    fn merged(files: &[FileCoverage]) -> CoverageMap {
        let mut map = CoverageMap::new();
        for file in files {
            map.merge_file(file.clone());
        }
        map
    }

    proptest! {
        #[test]
        fn prop_merge_is_order_independent(files in proptest::collection::vec(arb_file(), 0..6)) {
            let forward = merged(&files);
            let mut reversed_files = files.clone();
            reversed_files.reverse();
            prop_assert_eq!(forward, merged(&reversed_files));
        }

        #[test]
        fn prop_merge_is_associative(
            a in proptest::collection::vec(arb_file(), 0..3),
            b in proptest::collection::vec(arb_file(), 0..3),
        ) {
            let mut left = merged(&a);
            left.merge(merged(&b));

            let mut all = a.clone();
            all.extend(b.iter().cloned());
            prop_assert_eq!(left, merged(&all));
        }
    }
}
