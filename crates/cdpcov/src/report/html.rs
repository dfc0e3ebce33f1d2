//! Browsable HTML report: an index table and one annotated page per file

use super::{escape_xml, write_file, ReportContext};
use crate::model::{CoverageMap, FileCoverage, Tally};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::path::PathBuf;

const STYLE: &str = r"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        table { border-collapse: collapse; width: 100%; }
        th, td { padding: 4px 8px; border-bottom: 1px solid #ddd; text-align: left; }
        .high { background: #e8f5e9; }
        .medium { background: #fff3e0; }
        .low { background: #ffebee; }
        pre { margin: 0; }
        .src td { font-family: monospace; white-space: pre; border: none; padding: 0 8px; }
        .hit { background: #e8f5e9; }
        .miss { background: #ffebee; }
        .count { color: #888; text-align: right; }
";

/// HTML report generator
#[derive(Debug)]
pub struct HtmlFormatter<'a> {
    coverage: &'a CoverageMap,
    ctx: &'a ReportContext,
    title: String,
    pages: BTreeMap<PathBuf, String>,
}

impl<'a> HtmlFormatter<'a> {
    /// Index page name
    pub const INDEX: &'static str = "index.html";

    /// Create an HTML formatter
    #[must_use]
    pub fn new(coverage: &'a CoverageMap, ctx: &'a ReportContext) -> Self {
        let mut taken = BTreeSet::new();
        let pages = coverage
            .files()
            .map(|file| {
                let stem = flat_name(&ctx.display(file.path()));
                let mut name = format!("{stem}.html");
                let mut n = 1;
                while !taken.insert(name.clone()) {
                    n += 1;
                    name = format!("{stem}-{n}.html");
                }
                (file.path().to_path_buf(), name)
            })
            .collect();
        Self {
            coverage,
            ctx,
            title: "Coverage Report".to_string(),
            pages,
        }
    }

    /// Set the page title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Page name for a file, unique within this report
    #[must_use]
    pub fn page_name(&self, file: &FileCoverage) -> String {
        self.pages
            .get(file.path())
            .cloned()
            .unwrap_or_else(|| format!("{}.html", flat_name(&self.ctx.display(file.path()))))
    }

    /// Render the index page
    #[must_use]
    pub fn render_index(&self) -> String {
        let summary = self.coverage.summary();
        let mut html = header(&self.title);

        let _ = write!(
            html,
            r#"<div class="summary">
    <h1>{}</h1>
    <p>Lines: {} ({}/{}) &middot; Branches: {} ({}/{}) &middot; Functions: {} ({}/{})</p>
    <p>Generated {}</p>
</div>
"#,
            escape_xml(&self.title),
            pct(summary.lines),
            summary.lines.hit,
            summary.lines.found,
            pct(summary.branches),
            summary.branches.hit,
            summary.branches.found,
            pct(summary.functions),
            summary.functions.hit,
            summary.functions.found,
            self.ctx.generated_at().format("%Y-%m-%d %H:%M:%S"),
        );

        html.push_str("<table>\n<tr><th>File</th><th>Lines</th><th>Branches</th><th>Functions</th></tr>\n");
        for file in self.coverage.files() {
            let s = file.summary();
            let _ = writeln!(
                html,
                r#"<tr class="{}"><td><a href="{}">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                band(s.lines),
                escape_xml(&self.page_name(file)),
                escape_xml(&self.ctx.display(file.path())),
                pct(s.lines),
                pct(s.branches),
                pct(s.functions),
            );
        }
        html.push_str("</table>\n");
        html.push_str(FOOTER);
        html
    }

    /// Render one file's annotated source
    #[must_use]
    pub fn render_file(&self, file: &FileCoverage) -> String {
        let shown = self.ctx.display(file.path());
        let summary = file.summary();
        let mut html = header(&shown);

        let _ = write!(
            html,
            r#"<div class="summary">
    <p><a href="{}">&larr; index</a></p>
    <h1>{}</h1>
    <p>Lines: {} &middot; Branches: {} &middot; Functions: {}</p>
</div>
"#,
            Self::INDEX,
            escape_xml(&shown),
            pct(summary.lines),
            pct(summary.branches),
            pct(summary.functions),
        );

        let source = std::fs::read_to_string(file.path())
            .ok()
            .or_else(|| file.source_text().map(str::to_string));
        match source {
            Some(source) => {
                html.push_str("<table class=\"src\">\n");
                for (index, text) in source.lines().enumerate() {
                    let line = index as u32 + 1;
                    let (class, count) = match file.line_hits(line) {
                        Some(0) => ("miss", "0".to_string()),
                        Some(n) => ("hit", format!("{n}x")),
                        None => ("", String::new()),
                    };
                    let _ = writeln!(
                        html,
                        r#"<tr class="{class}"><td class="count">{line}</td><td class="count">{count}</td><td>{}</td></tr>"#,
                        escape_xml(text)
                    );
                }
                html.push_str("</table>\n");
            }
            None => {
                html.push_str("<p>Source unavailable.</p>\n<table>\n<tr><th>Line</th><th>Hits</th></tr>\n");
                for (line, count) in file.statements() {
                    let _ = writeln!(html, "<tr><td>{line}</td><td>{count}</td></tr>");
                }
                html.push_str("</table>\n");
            }
        }

        html.push_str(FOOTER);
        html
    }

    /// Write the index and every file page
    pub fn save_all(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.coverage.len() + 1);
        let index = self.ctx.out_dir().join(Self::INDEX);
        write_file(&index, &self.render_index())?;
        written.push(index);
        for file in self.coverage.files() {
            let page = self.ctx.out_dir().join(self.page_name(file));
            write_file(&page, &self.render_file(file))?;
            written.push(page);
        }
        Ok(written)
    }
}

fn flat_name(shown: &str) -> String {
    shown.trim_start_matches('/').replace(['/', '\\', ':'], "_")
}

fn header(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"UTF-8\">\n    <title>{}</title>\n    <style>{STYLE}    </style>\n</head>\n<body>\n",
        escape_xml(title)
    )
}

const FOOTER: &str = "\n<footer>\n    <p>Generated by cdpcov</p>\n</footer>\n</body>\n</html>\n";

fn pct(tally: Tally) -> String {
    format!("{:.2}%", tally.percent())
}

fn band(tally: Tally) -> &'static str {
    let percent = tally.percent();
    if percent >= 80.0 {
        "high"
    } else if percent >= 50.0 {
        "medium"
    } else {
        "low"
    }
}
