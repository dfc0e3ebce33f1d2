//! Setup command handler

use super::reporter_for;
use crate::commands::SetupArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use cdpcov::CaptureSession;

/// Execute the setup command
pub fn execute_setup(config: &CliConfig, args: &SetupArgs) -> CliResult<()> {
    let capture = config.capture_config(args.capture.to_options())?;
    let session = cdpcov::setup(&capture)?;

    if args.print_env {
        print!("{}", env_exports(&session));
    }
    reporter_for(config).success(&format!("Capture log ready at {}", session.file().display()));
    Ok(())
}

/// Shell `export` lines publishing the session
#[must_use]
pub fn env_exports(session: &CaptureSession) -> String {
    session
        .env_vars()
        .iter()
        .map(|(name, value)| format!("export {name}='{}'\n", value.display()))
        .collect()
}
