//! Sample conversion
//!
//! Turns one [`RawCoverageSample`] into per-original-file coverage. The
//! model is line-granular:
//!
//! - **Statements**: every original line reached by a mapping. Its count is
//!   the count of the innermost range (greatest start, then shortest)
//!   containing the mapped compiled position; positions outside all ranges
//!   count 0. A line reached by several mappings keeps the maximum.
//! - **Functions**: each named function, keyed by where its outer range
//!   starts in the original, counted by that outer range.
//! - **Branches**: each range of a block-coverage function, keyed by where
//!   it starts in the original.
//!
//! Engine offsets are UTF-16 code units, matching source map columns.

use crate::model::{FileCoverage, Position};
use crate::sample::{CoverageRange, RawCoverageSample};
use crate::source_map::{MappedPoint, SourceMapping};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Line start offsets of a compiled script, in UTF-16 units
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Index `text`
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        let mut offset = 0u32;
        for ch in text.chars() {
            offset += ch.len_utf16() as u32;
            if ch == '\n' {
                starts.push(offset);
            }
        }
        Self { starts, len: offset }
    }

    /// Length of the text in UTF-16 units
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Whether the text is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Offset of a 0-based (line, column), if the line exists
    #[must_use]
    pub fn offset(&self, line: u32, column: u32) -> Option<u32> {
        self.starts.get(line as usize).map(|start| start + column)
    }

    /// 0-based (line, column) of an offset
    #[must_use]
    pub fn position(&self, offset: u32) -> (u32, u32) {
        let line = self.starts.partition_point(|&start| start <= offset).saturating_sub(1);
        (line as u32, offset - self.starts[line])
    }
}

/// A compiled offset and the original location it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Anchor {
    offset: u32,
    source: usize,
    position: Position,
}

/// Where a script's positions map to
#[derive(Debug)]
pub enum Mapping<'a> {
    /// Through a decoded source map
    SourceMap(&'a SourceMapping),
    /// Onto the script itself, reported under this path
    Identity(PathBuf),
}

impl Mapping<'_> {
    fn sources(&self) -> Vec<PathBuf> {
        match self {
            Self::SourceMap(map) => map.sources().to_vec(),
            Self::Identity(path) => vec![path.clone()],
        }
    }

    fn content(&self, source: usize) -> Option<&str> {
        match self {
            Self::SourceMap(map) => map.source_content(source),
            Self::Identity(_) => None,
        }
    }

    fn anchors(&self, text: &str, index: &LineIndex) -> Vec<Anchor> {
        let mut anchors: Vec<Anchor> = match self {
            Self::SourceMap(map) => map
                .points()
                .iter()
                .filter_map(|p: &MappedPoint| {
                    let offset = index.offset(p.gen_line, p.gen_col)?;
                    (offset < index.len()).then_some(Anchor {
                        offset,
                        source: p.source,
                        position: Position::new(p.line, p.column),
                    })
                })
                .collect(),
            Self::Identity(_) => identity_anchors(text, index),
        };
        anchors.sort_unstable();
        anchors
    }
}

/// First non-blank column of every code line
fn identity_anchors(text: &str, index: &LineIndex) -> Vec<Anchor> {
    text.split('\n')
        .enumerate()
        .filter_map(|(line, content)| {
            let trimmed = content.trim_start();
            if trimmed.trim_end().is_empty() || crate::loader::source_map_comment().is_match(trimmed) {
                return None;
            }
            let indent = &content[..content.len() - trimmed.len()];
            let column: u32 = indent.chars().map(|c| c.len_utf16() as u32).sum();
            let offset = index.offset(line as u32, column)?;
            Some(Anchor {
                offset,
                source: 0,
                position: Position::new(line as u32 + 1, column),
            })
        })
        .collect()
}

/// Innermost-range lookup over ranges sorted outermost-first
struct RangeSweep<'a> {
    ranges: Vec<&'a CoverageRange>,
    next: usize,
    open: Vec<&'a CoverageRange>,
}

impl<'a> RangeSweep<'a> {
    fn new(ranges: impl Iterator<Item = &'a CoverageRange>) -> Self {
        let mut ranges: Vec<&CoverageRange> = ranges.filter(|r| !r.is_empty()).collect();
        ranges.sort_by(|a, b| {
            a.start_offset
                .cmp(&b.start_offset)
                .then(b.end_offset.cmp(&a.end_offset))
        });
        Self {
            ranges,
            next: 0,
            open: Vec::new(),
        }
    }

    /// Count at `offset`; offsets must be queried in ascending order
    fn count_at(&mut self, offset: u32) -> u64 {
        while let Some(range) = self.ranges.get(self.next) {
            if range.start_offset > offset {
                break;
            }
            self.open.push(range);
            self.next += 1;
        }
        while self.open.last().is_some_and(|r| r.end_offset <= offset) {
            self.open.pop();
        }
        self.open.last().map_or(0, |r| r.count)
    }
}

/// First anchor inside `range`
fn anchor_in<'a>(anchors: &'a [Anchor], range: &CoverageRange) -> Option<&'a Anchor> {
    let first = anchors.partition_point(|a| a.offset < range.start_offset);
    anchors.get(first).filter(|a| a.offset < range.end_offset)
}

fn entry<'m>(files: &'m mut BTreeMap<usize, FileCoverage>, sources: &[PathBuf], source: usize) -> &'m mut FileCoverage {
    files
        .entry(source)
        .or_insert_with(|| FileCoverage::new(sources[source].clone()))
}

/// Convert one sample's counts into coverage of its original files
#[must_use]
pub fn convert_sample(sample: &RawCoverageSample, text: &str, mapping: &Mapping<'_>) -> Vec<FileCoverage> {
    let index = LineIndex::new(text);
    let anchors = mapping.anchors(text, &index);
    let sources = mapping.sources();
    let mut files: BTreeMap<usize, FileCoverage> = BTreeMap::new();

    let mut sweep = RangeSweep::new(sample.ranges());
    for anchor in &anchors {
        let count = sweep.count_at(anchor.offset);
        entry(&mut files, &sources, anchor.source).raise_statement(anchor.position.line, count);
    }

    for function in &sample.functions {
        if let Some(outer) = function.ranges.first() {
            if !function.function_name.is_empty() {
                if let Some(anchor) = anchor_in(&anchors, outer) {
                    entry(&mut files, &sources, anchor.source).add_function(anchor.position, &function.function_name, outer.count);
                }
            }
        }
        if function.is_block_coverage {
            for range in &function.ranges {
                if let Some(anchor) = anchor_in(&anchors, range) {
                    entry(&mut files, &sources, anchor.source).add_branch(anchor.position, range.count);
                }
            }
        }
    }

    files
        .into_iter()
        .map(|(source, file)| match mapping.content(source) {
            Some(content) => file.with_source_text(content),
            None => file,
        })
        .collect()
}

/// Convert a sample whose original is the script itself
#[must_use]
pub fn convert_unmapped(sample: &RawCoverageSample, text: &str, path: &Path) -> Vec<FileCoverage> {
    convert_sample(sample, text, &Mapping::Identity(path.to_path_buf()))
}
