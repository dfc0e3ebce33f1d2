//! Append command handler
//!
//! Lets non-Rust test harnesses feed the capture log: the batch is either
//! an array of script coverages or a raw `Profiler.takePreciseCoverage`
//! response (`{"result": [...]}`).

use super::{reporter_for, resolve_session};
use crate::commands::AppendArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use cdpcov::{supports_coverage, CaptureBatch};
use serde::Deserialize;
use std::io::Read;

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Samples(CaptureBatch),
    Profile { result: CaptureBatch },
}

/// Parse batch JSON in either accepted shape
pub fn parse_batch(text: &str) -> CliResult<CaptureBatch> {
    match serde_json::from_str::<BatchInput>(text) {
        Ok(BatchInput::Samples(batch) | BatchInput::Profile { result: batch }) => Ok(batch),
        Err(e) => Err(CliError::invalid_argument(format!(
            "batch is neither a coverage array nor a takePreciseCoverage result: {e}"
        ))),
    }
}

/// Execute the append command
pub fn execute_append(config: &CliConfig, args: &AppendArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    if !supports_coverage(&args.browser) {
        reporter.warning(&format!("{} produces no V8 coverage; nothing appended", args.browser));
        return Ok(());
    }

    let capture = config.capture_config(args.capture.to_options())?;
    let session = resolve_session(&capture, args.from_env)?;
    let batch = parse_batch(&read_input(&args.input)?)?;
    session.append_batch(&batch)?;

    if config.verbosity.is_verbose() {
        reporter.success(&format!("{} to {}", batch_summary(&batch), session.file().display()));
    }
    Ok(())
}

/// `Appended 2 script(s), 3 executed function(s)`
#[must_use]
pub fn batch_summary(batch: &CaptureBatch) -> String {
    let executed: usize = batch.iter().map(|s| s.functions_executed()).sum();
    format!("Appended {} script(s), {executed} executed function(s)", batch.len())
}

fn read_input(input: &str) -> CliResult<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{"url":"http://localhost:3000/a.js","scriptId":"7","functions":[{"functionName":"","isBlockCoverage":true,"ranges":[{"startOffset":0,"endOffset":4,"count":1}]}]}"#;

    #[test]
    fn test_parse_plain_array() {
        let batch = parse_batch(&format!("[{SCRIPT}]")).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].script_id, "7");
    }

    #[test]
    fn test_parse_profile_response() {
        let batch = parse_batch(&format!(r#"{{"result":[{SCRIPT},{SCRIPT}]}}"#)).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_batch_summary_counts_executed_functions() {
        let idle = SCRIPT.replace(r#""count":1"#, r#""count":0"#);
        let batch = parse_batch(&format!("[{SCRIPT},{idle}]")).unwrap();
        assert_eq!(batch_summary(&batch), "Appended 2 script(s), 1 executed function(s)");
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_batch("{\"nope\":1}").unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }
}
