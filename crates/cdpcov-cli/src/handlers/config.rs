//! Config command handler

use crate::commands::ConfigArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use cdpcov::CaptureConfig;

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let capture = config.capture_config(args.capture.to_options())?;
    print!("{}", render_config(&capture, args.json)?);
    Ok(())
}

/// Effective configuration as YAML, or pretty JSON
pub fn render_config(capture: &CaptureConfig, json: bool) -> CliResult<String> {
    if json {
        serde_json::to_string_pretty(capture)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| CliError::config(format!("cannot serialize config: {e}")))
    } else {
        serde_yaml_ng::to_string(capture)
            .map_err(|e| CliError::config(format!("cannot serialize config: {e}")))
    }
}
