//! Terminal output

use console::{style, Style, Term};
use cdpcov::CoverageSummary;

/// Status line printer on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print the one-line coverage totals
    pub fn coverage_summary(&self, summary: &CoverageSummary) {
        if self.quiet {
            return;
        }
        let line = summary_line(summary);
        let styled = if self.use_color {
            let band = band_style(summary.lines.percent());
            band.apply_to(line).to_string()
        } else {
            line
        };
        let _ = self.term.write_line(&styled);
    }
}

/// `Lines 12/16 (75.00%), Functions ..., Branches ...`
#[must_use]
pub fn summary_line(summary: &CoverageSummary) -> String {
    format!(
        "Lines {}/{} ({:.2}%), Functions {}/{} ({:.2}%), Branches {}/{} ({:.2}%)",
        summary.lines.hit,
        summary.lines.found,
        summary.lines.percent(),
        summary.functions.hit,
        summary.functions.found,
        summary.functions.percent(),
        summary.branches.hit,
        summary.branches.found,
        summary.branches.percent(),
    )
}

fn band_style(percent: f64) -> Style {
    if percent >= 80.0 {
        Style::new().green().bold()
    } else if percent >= 50.0 {
        Style::new().yellow().bold()
    } else {
        Style::new().red().bold()
    }
}
