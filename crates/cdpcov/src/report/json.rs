//! Per-file JSON dump of the aggregate

use super::ReportContext;
use crate::model::{CoverageMap, CoverageSummary, FileCoverage};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct FunctionEntry<'a> {
    name: &'a str,
    line: u32,
    column: u32,
    count: u64,
}

#[derive(Debug, Serialize)]
struct BranchEntry {
    line: u32,
    column: u32,
    count: u64,
}

#[derive(Debug, Serialize)]
struct FileEntry<'a> {
    path: String,
    lines: BTreeMap<String, u64>,
    functions: Vec<FunctionEntry<'a>>,
    branches: Vec<BranchEntry>,
    summary: CoverageSummary,
}

impl<'a> FileEntry<'a> {
    fn new(file: &'a FileCoverage, ctx: &ReportContext) -> Self {
        Self {
            path: ctx.display(file.path()),
            lines: file
                .statements()
                .iter()
                .map(|(line, count)| (line.to_string(), *count))
                .collect(),
            functions: file
                .functions()
                .iter()
                .map(|(key, &count)| FunctionEntry {
                    name: &key.name,
                    line: key.start.line,
                    column: key.start.column,
                    count,
                })
                .collect(),
            branches: file
                .branches()
                .iter()
                .map(|(start, &count)| BranchEntry {
                    line: start.line,
                    column: start.column,
                    count,
                })
                .collect(),
            summary: file.summary(),
        }
    }
}

/// JSON report keyed by displayed path
#[derive(Debug)]
pub struct JsonFormatter<'a> {
    coverage: &'a CoverageMap,
    ctx: &'a ReportContext,
}

impl<'a> JsonFormatter<'a> {
    /// File written by the json reporter
    pub const FILE_NAME: &'static str = "coverage-final.json";

    /// Create a JSON formatter
    #[must_use]
    pub const fn new(coverage: &'a CoverageMap, ctx: &'a ReportContext) -> Self {
        Self { coverage, ctx }
    }

    /// Pretty-printed JSON
    pub fn generate(&self) -> Result<String, serde_json::Error> {
        let files: BTreeMap<String, FileEntry<'_>> = self
            .coverage
            .files()
            .map(|file| {
                let entry = FileEntry::new(file, self.ctx);
                (entry.path.clone(), entry)
            })
            .collect();
        serde_json::to_string_pretty(&files)
    }
}
