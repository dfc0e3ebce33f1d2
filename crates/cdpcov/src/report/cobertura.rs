//! Cobertura XML Coverage Report Formatter
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate="0.8" branch-rate="0.5" timestamp="..." version="0.4.0">
//!   <sources><source>/proj</source></sources>
//!   <packages>
//!     <package name="src" line-rate="0.8" branch-rate="0.5" complexity="0">
//!       <classes>
//!         <class name="a.ts" filename="src/a.ts" line-rate="0.9" branch-rate="0.5" complexity="0">
//!           <methods>...</methods>
//!           <lines><line number="10" hits="5" branch="false"/></lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```

use super::{escape_xml, ReportContext};
use crate::model::{CoverageMap, CoverageSummary, FileCoverage, Tally};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Files grouped by their displayed directory
type PackageMap<'a> = BTreeMap<String, Vec<(String, &'a FileCoverage)>>;

/// Cobertura XML format report generator
#[derive(Debug)]
pub struct CoberturaFormatter<'a> {
    coverage: &'a CoverageMap,
    ctx: &'a ReportContext,
    version: String,
}

impl<'a> CoberturaFormatter<'a> {
    /// File written by the cobertura reporter
    pub const FILE_NAME: &'static str = "cobertura-coverage.xml";

    /// Create a new Cobertura formatter
    #[must_use]
    pub fn new(coverage: &'a CoverageMap, ctx: &'a ReportContext) -> Self {
        Self {
            coverage,
            ctx,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Set the version string
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Generate Cobertura XML report as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let summary = self.coverage.summary();

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<coverage line-rate="{:.4}" branch-rate="{:.4}" lines-covered="{}" lines-valid="{}" branches-covered="{}" branches-valid="{}" complexity="0" timestamp="{}" version="{}">"#,
            rate(summary.lines),
            rate(summary.branches),
            summary.lines.hit,
            summary.lines.found,
            summary.branches.hit,
            summary.branches.found,
            self.ctx.generated_at().timestamp_millis(),
            escape_xml(&self.version),
        );
        let _ = writeln!(
            xml,
            "  <sources>\n    <source>{}</source>\n  </sources>",
            escape_xml(&self.ctx.base().to_string_lossy())
        );

        xml.push_str("  <packages>\n");
        for (package_name, files) in &self.group_by_package() {
            let mut package = CoverageSummary::default();
            for (_, file) in files {
                package.add(&file.summary());
            }
            let _ = writeln!(
                xml,
                r#"    <package name="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
                escape_xml(package_name),
                rate(package.lines),
                rate(package.branches),
            );
            xml.push_str("      <classes>\n");
            for (filename, file) in files {
                Self::write_class(&mut xml, filename, file);
            }
            xml.push_str("      </classes>\n");
            xml.push_str("    </package>\n");
        }
        xml.push_str("  </packages>\n");
        xml.push_str("</coverage>\n");

        xml
    }

    fn write_class(xml: &mut String, filename: &str, file: &FileCoverage) {
        let summary = file.summary();
        let class_name = filename.rsplit('/').next().unwrap_or(filename);
        let _ = writeln!(
            xml,
            r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
            escape_xml(class_name),
            escape_xml(filename),
            rate(summary.lines),
            rate(summary.branches),
        );

        xml.push_str("          <methods>\n");
        for (key, count) in file.functions() {
            let _ = writeln!(
                xml,
                r#"            <method name="{}" signature="" line-rate="{}" branch-rate="0"><lines><line number="{}" hits="{count}"/></lines></method>"#,
                escape_xml(&key.name),
                if *count > 0 { "1" } else { "0" },
                key.start.line,
            );
        }
        xml.push_str("          </methods>\n");

        let mut branches_per_line: BTreeMap<u32, Tally> = BTreeMap::new();
        for (start, count) in file.branches() {
            let tally = branches_per_line.entry(start.line).or_default();
            tally.found += 1;
            if *count > 0 {
                tally.hit += 1;
            }
        }

        xml.push_str("          <lines>\n");
        for (line, count) in file.statements() {
            match branches_per_line.get(line) {
                Some(tally) => {
                    let _ = writeln!(
                        xml,
                        r#"            <line number="{line}" hits="{count}" branch="true" condition-coverage="{:.0}% ({}/{})"/>"#,
                        tally.percent(),
                        tally.hit,
                        tally.found,
                    );
                }
                None => {
                    let _ = writeln!(
                        xml,
                        r#"            <line number="{line}" hits="{count}" branch="false"/>"#
                    );
                }
            }
        }
        xml.push_str("          </lines>\n");
        xml.push_str("        </class>\n");
    }

    fn group_by_package(&self) -> PackageMap<'a> {
        let mut packages: PackageMap<'a> = BTreeMap::new();
        for file in self.coverage.files() {
            let filename = self.ctx.display(file.path());
            let package = filename
                .rsplit_once('/')
                .map_or(".", |(dir, _)| dir)
                .replace('/', ".");
            packages.entry(package).or_default().push((filename, file));
        }
        packages
    }
}

fn rate(tally: Tally) -> f64 {
    tally.percent() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::FileCoverage;
    use crate::report::fixtures;

    fn generate() -> String {
        let coverage = fixtures::coverage();
        let ctx = ReportContext::new("/proj/out", "/proj");
        CoberturaFormatter::new(&coverage, &ctx).with_version("1.0").generate()
    }

    #[test]
    fn test_header_and_totals() {
        let xml = generate();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"lines-covered="2" lines-valid="4""#));
        assert!(xml.contains(r#"branches-covered="1" branches-valid="3""#));
        assert!(xml.contains(r#"version="1.0""#));
        assert!(xml.contains("<source>/proj</source>"));
    }

    #[test]
    fn test_package_and_classes() {
        let xml = generate();
        assert_eq!(xml.matches(r#"<package name="src""#).count(), 1);
        assert!(xml.contains(r#"<class name="a.ts" filename="src/a.ts" line-rate="0.6667""#));
        assert!(xml.contains(r#"<class name="b.ts" filename="src/b.ts" line-rate="0.0000""#));
    }

    #[test]
    fn test_lines_carry_branch_conditions() {
        let xml = generate();
        assert!(xml.contains(r#"<line number="1" hits="2" branch="true" condition-coverage="100% (1/1)"/>"#));
        assert!(xml.contains(r#"<line number="2" hits="2" branch="false"/>"#));
    }

    #[test]
    fn test_methods() {
        let xml = generate();
        assert!(xml.contains(r#"<method name="add" signature="" line-rate="1""#));
        assert!(xml.contains(r#"<method name="sub" signature="" line-rate="0""#));
    }

    #[test]
    fn test_escapes_names() {
        let mut map = CoverageMap::new();
        let mut file = FileCoverage::new("/proj/a&b.ts");
        file.add_statement(1, 1);
        map.merge_file(file);
        let ctx = ReportContext::new("/out", "/proj");
        let xml = CoberturaFormatter::new(&map, &ctx).generate();
        assert!(xml.contains(r#"filename="a&amp;b.ts""#));
        assert!(xml.contains(r#"<package name=".""#));
    }
}
