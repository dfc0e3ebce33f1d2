//! Plain-text summary table

use super::ReportContext;
use crate::model::{CoverageMap, CoverageSummary, Tally};
use std::fmt::Write;

/// Text table of per-file percentages
#[derive(Debug)]
pub struct TextFormatter<'a> {
    coverage: &'a CoverageMap,
    ctx: &'a ReportContext,
}

impl<'a> TextFormatter<'a> {
    /// File written by the text reporter
    pub const FILE_NAME: &'static str = "coverage.txt";

    /// Create a text formatter
    #[must_use]
    pub const fn new(coverage: &'a CoverageMap, ctx: &'a ReportContext) -> Self {
        Self { coverage, ctx }
    }

    /// Render the table
    #[must_use]
    pub fn generate(&self) -> String {
        let rows: Vec<(String, CoverageSummary, String)> = self
            .coverage
            .files()
            .map(|file| {
                (
                    self.ctx.display(file.path()),
                    file.summary(),
                    compact_lines(&file.uncovered_lines()),
                )
            })
            .collect();

        let width = rows
            .iter()
            .map(|(name, _, _)| name.len())
            .chain(std::iter::once("All files".len()))
            .max()
            .unwrap_or(0);

        let rule = format!("{}-|---------|----------|---------|----------------\n", "-".repeat(width));
        let mut out = String::new();
        out.push_str(&rule);
        let _ = writeln!(
            out,
            "{:<width$} | % Lines | % Branch | % Funcs | Uncovered Lines",
            "File"
        );
        out.push_str(&rule);
        let total = self.coverage.summary();
        let _ = writeln!(out, "{}", row("All files", &total, "", width));
        for (name, summary, uncovered) in &rows {
            let _ = writeln!(out, "{}", row(name, summary, uncovered, width));
        }
        out.push_str(&rule);
        out
    }
}

fn pct(tally: Tally) -> String {
    format!("{:>7.2}", tally.percent())
}

fn row(name: &str, summary: &CoverageSummary, uncovered: &str, width: usize) -> String {
    format!(
        "{name:<width$} | {} | {:>8} | {} | {uncovered}",
        pct(summary.lines),
        pct(summary.branches).trim_start(),
        pct(summary.functions),
    )
    .trim_end()
    .to_string()
}

/// `1,3-5,9` style list of line numbers
fn compact_lines(lines: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = lines.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if end == start {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}
