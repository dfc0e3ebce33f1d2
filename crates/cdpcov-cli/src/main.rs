//! cdpcov: accumulate Chromium coverage across e2e runs and report it
//!
//! ## Usage
//!
//! ```bash
//! cdpcov setup                            # create an empty capture log
//! cdpcov append coverage.json             # append one captured batch
//! cdpcov report --reporter lcov,html      # reconcile and render
//! cdpcov config --json                    # show the effective config
//! ```

use cdpcov_cli::{handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    match cli.command {
        Commands::Setup(args) => handlers::setup::execute_setup(&config, &args),
        Commands::Append(args) => handlers::append::execute_append(&config, &args),
        Commands::Report(args) => handlers::report::execute_report(&config, &args),
        Commands::Config(args) => handlers::config::execute_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_config_file(cli.config.clone())
}

// RUST_LOG wins over -v/-q.
fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .try_init();
}
