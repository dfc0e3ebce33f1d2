//! Report command handler

use super::{reporter_for, resolve_session};
use crate::commands::ReportArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use cdpcov::CoverageSummary;

/// Execute the report command
pub fn execute_report(config: &CliConfig, args: &ReportArgs) -> CliResult<()> {
    let required = args.fail_under.map(check_threshold).transpose()?;

    let capture = config.capture_config(args.to_options())?;
    let session = resolve_session(&capture, args.from_env)?;
    let outcome = cdpcov::create_coverage_report(&capture, &session)?;

    let reporter = reporter_for(config);
    if let Some(console) = &outcome.console {
        if !config.verbosity.is_quiet() {
            print!("{console}");
        }
    }
    if config.verbosity.is_verbose() {
        for path in &outcome.written {
            reporter.info(&format!("wrote {}", path.display()));
        }
    }
    reporter.success(&format!(
        "Coverage report written to {}",
        session.report_dir().display()
    ));

    if outcome.coverage.is_empty() {
        reporter.warning("no files matched; the report is empty");
    }
    let summary = outcome.coverage.summary();
    reporter.coverage_summary(&summary);

    if let Some(required) = required {
        if let Err(e) = enforce_threshold(&summary, required) {
            reporter.failure(&e.to_string());
            return Err(e);
        }
    }
    Ok(())
}

fn check_threshold(percent: f64) -> CliResult<f64> {
    if (0.0..=100.0).contains(&percent) {
        Ok(percent)
    } else {
        Err(CliError::invalid_argument(format!(
            "--fail-under must be between 0 and 100, got {percent}"
        )))
    }
}

/// Fail when line coverage is below `required` percent
pub fn enforce_threshold(summary: &CoverageSummary, required: f64) -> CliResult<()> {
    let actual = summary.lines.percent();
    if actual < required {
        return Err(CliError::BelowThreshold { actual, required });
    }
    Ok(())
}
