//! Command-line arguments for the probe.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use strum::{Display, EnumString};

/// Environment variable consulted for the log filter.
pub(crate) const LOG_FILTER_ENV: &str = "CMAKE_SERVER_PROBE_LOG";

/// Supported logging output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub(crate) enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// The result printed once the project has been generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum Query {
    /// The code model of the generated project.
    #[default]
    Codemodel,
    /// The cache contents.
    Cache,
    /// The files CMake read while configuring.
    Inputs,
    /// The files and directories the server watches.
    Watchers,
    /// The server's global settings.
    Settings,
}

impl Query {
    /// Whether the project must be configured and generated first.
    pub(crate) const fn needs_generate(self) -> bool {
        !matches!(self, Self::Settings)
    }
}

/// Starts `cmake -E server`, configures and generates a project, and prints
/// the requested result as JSON.
#[derive(Parser, Debug)]
#[command(name = "cmake-server-probe", version)]
pub(crate) struct Cli {
    /// The cmake executable to run.
    #[arg(long, value_name = "PATH", default_value = "cmake")]
    pub(crate) cmake: PathBuf,
    /// Top-level source directory of the project.
    #[arg(long, value_name = "DIR")]
    pub(crate) source_dir: String,
    /// Build directory to configure.
    #[arg(long, value_name = "DIR")]
    pub(crate) build_dir: String,
    /// Generator passed to the handshake.
    #[arg(long, default_value = "Unix Makefiles")]
    pub(crate) generator: String,
    /// Extra generator, for example `CodeBlocks`.
    #[arg(long)]
    pub(crate) extra_generator: Option<String>,
    /// Generator platform.
    #[arg(long)]
    pub(crate) platform: Option<String>,
    /// Generator toolset.
    #[arg(long)]
    pub(crate) toolset: Option<String>,
    /// Cache override, repeatable.
    #[arg(short = 'D', value_name = "NAME=VALUE", value_parser = parse_definition)]
    pub(crate) definitions: Vec<(String, String)>,
    /// What to print.
    #[arg(long, value_enum, default_value_t = Query::Codemodel)]
    pub(crate) query: Query,
    /// Bound on the wait for the server's greeting.
    #[arg(long, value_name = "MS", default_value_t = 5_000)]
    pub(crate) handshake_timeout_ms: u64,
    /// Bound on each request; unbounded when omitted.
    #[arg(long, value_name = "MS")]
    pub(crate) request_timeout_ms: Option<u64>,
    /// Tracing filter directive.
    #[arg(long, env = LOG_FILTER_ENV, default_value = "info")]
    pub(crate) log_filter: String,
    /// Log output format (`json` or `compact`).
    #[arg(long, default_value_t = LogFormat::Json)]
    pub(crate) log_format: LogFormat,
}

fn parse_definition(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got `{text}`")),
    }
}
