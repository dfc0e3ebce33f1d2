//! LCOV Report Formatter
//!
//! ```text
//! TN:
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! FNF:<functions found>
//! FNH:<functions hit>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! BRDA:<line>,<block>,<branch>,<taken>
//! BRF:<branches found>
//! BRH:<branches hit>
//! end_of_record
//! ```

use super::ReportContext;
use crate::model::{CoverageMap, FileCoverage};
use std::fmt::Write;

/// LCOV format report generator
#[derive(Debug)]
pub struct LcovFormatter<'a> {
    coverage: &'a CoverageMap,
    ctx: &'a ReportContext,
}

impl<'a> LcovFormatter<'a> {
    /// File written by the lcov reporter
    pub const FILE_NAME: &'static str = "lcov.info";

    /// Create a new LCOV formatter from coverage data
    #[must_use]
    pub const fn new(coverage: &'a CoverageMap, ctx: &'a ReportContext) -> Self {
        Self {
            coverage,
            ctx,
        }
    }

    /// Generate LCOV format report as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        for file in self.coverage.files() {
            self.write_record(&mut output, file);
        }
        output
    }

    fn write_record(&self, output: &mut String, file: &FileCoverage) {
        output.push_str("TN:\n");
        let _ = writeln!(output, "SF:{}", self.ctx.display(file.path()));

        for key in file.functions().keys() {
            let _ = writeln!(output, "FN:{},{}", key.start.line, key.name);
        }
        for (key, count) in file.functions() {
            let _ = writeln!(output, "FNDA:{count},{}", key.name);
        }
        let summary = file.summary();
        let _ = writeln!(output, "FNF:{}", summary.functions.found);
        let _ = writeln!(output, "FNH:{}", summary.functions.hit);

        for (line, count) in file.statements() {
            let _ = writeln!(output, "DA:{line},{count}");
        }
        let _ = writeln!(output, "LF:{}", summary.lines.found);
        let _ = writeln!(output, "LH:{}", summary.lines.hit);

        // Each range is its own block with a single arm; untaken is `-` only
        // when the enclosing line never ran
        for (block, (start, count)) in file.branches().iter().enumerate() {
            let line_ran = file.line_hits(start.line).is_some_and(|hits| hits > 0);
            let taken = if *count == 0 && !line_ran {
                "-".to_string()
            } else {
                count.to_string()
            };
            let _ = writeln!(output, "BRDA:{},{block},0,{taken}", start.line);
        }
        let _ = writeln!(output, "BRF:{}", summary.branches.found);
        let _ = writeln!(output, "BRH:{}", summary.branches.hit);

        output.push_str("end_of_record\n");
    }
}
