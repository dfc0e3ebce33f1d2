//! CLI command definitions using clap

use cdpcov::CaptureOptions;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cdpcov: accumulate Chromium coverage across e2e runs and report it against original sources
#[derive(Parser, Debug)]
#[command(name = "cdpcov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Config file (.yaml, .yml or .json); defaults to ./cdpcov.yaml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty capture log, discarding previous runs
    Setup(SetupArgs),

    /// Append one captured batch to the capture log
    Append(AppendArgs),

    /// Reconcile the capture log and render reports
    Report(ReportArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Capture log location shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Capture directory
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Capture log file name, relative to the capture directory
    #[arg(short, long)]
    pub file: Option<String>,

    /// Base URL of the test server, or a filesystem prefix starting with `/`
    #[arg(short, long)]
    pub url: Option<String>,

    /// Project root for globs and relative paths
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl CaptureArgs {
    /// Flags as a partial config
    #[must_use]
    pub fn to_options(&self) -> CaptureOptions {
        CaptureOptions {
            dir: self.dir.clone(),
            file: self.file.clone(),
            url: self.url.clone(),
            root: self.root.clone(),
            ..CaptureOptions::default()
        }
    }
}

/// Arguments for the setup command
#[derive(Parser, Debug)]
pub struct SetupArgs {
    /// Capture log location
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// Print `export` lines for the capture environment variables
    #[arg(long)]
    pub print_env: bool,
}

/// Arguments for the append command
#[derive(Parser, Debug)]
pub struct AppendArgs {
    /// Capture log location
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// JSON file holding the batch (`-` for stdin)
    #[arg(default_value = "-")]
    pub input: String,

    /// Engine that produced the batch; only chromium is recorded
    #[arg(short, long, default_value = cdpcov::CHROMIUM)]
    pub browser: String,

    /// Use the capture log published in the environment by `setup`
    #[arg(long)]
    pub from_env: bool,
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Capture log location
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// Reporters to run (text, lcov, html, cobertura, json)
    #[arg(short, long, value_delimiter = ',')]
    pub reporter: Vec<String>,

    /// Compiled output root
    #[arg(long)]
    pub out_dir: Option<String>,

    /// Original source root
    #[arg(long)]
    pub src_dir: Option<String>,

    /// Glob selecting compiled files (repeatable)
    #[arg(short, long)]
    pub include: Vec<String>,

    /// Glob removed from the include set (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Compiled file extension
    #[arg(long)]
    pub compiled_ext: Option<String>,

    /// Original source extension
    #[arg(long)]
    pub source_ext: Option<String>,

    /// Fail when line coverage is below this percentage
    #[arg(long, value_name = "PERCENT")]
    pub fail_under: Option<f64>,

    /// Use the capture log published in the environment by `setup`
    #[arg(long)]
    pub from_env: bool,
}

impl ReportArgs {
    /// Flags as a partial config; empty lists leave the configured value alone
    #[must_use]
    pub fn to_options(&self) -> CaptureOptions {
        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        CaptureOptions {
            reporters: non_empty(&self.reporter),
            out_dir: self.out_dir.clone(),
            src_dir: self.src_dir.clone(),
            include: non_empty(&self.include),
            exclude: non_empty(&self.exclude),
            compiled_ext: self.compiled_ext.clone(),
            source_ext: self.source_ext.clone(),
            ..self.capture.to_options()
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Capture log location
    #[command(flatten)]
    pub capture: CaptureArgs,

    /// Print as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
