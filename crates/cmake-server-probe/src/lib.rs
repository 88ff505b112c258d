//! Command-line probe for the CMake server protocol.
//!
//! The probe starts `cmake -E server`, performs the handshake for one
//! project, configures and generates it, and prints the requested result as
//! pretty JSON on stdout. Server messages and progress are logged to stderr.

mod cli;
mod listener;
mod telemetry;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;
use cmake_server::{CMakeSession, HandshakeParams, ServerConfig, SessionConfig, SessionError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::cli::{Cli, Query};
use crate::listener::LoggingListener;
use crate::telemetry::TelemetryError;

const PROBE_TARGET: &str = "cmake_server_probe";

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("failed to serialise result: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write result: {0}")]
    Write(#[from] io::Error),
}

/// Runs the probe with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = write!(stderr, "{error}");
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "cmake-server-probe: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write>(cli: &Cli, stdout: &mut W) -> Result<(), AppError> {
    telemetry::initialise(&cli.log_filter, cli.log_format)?;

    info!(
        target: PROBE_TARGET,
        cmake = %cli.cmake.display(),
        source_dir = %cli.source_dir,
        build_dir = %cli.build_dir,
        "starting cmake server"
    );
    let session = CMakeSession::spawn(ServerConfig::cmake_at(cli.cmake.clone()), session_config(cli))?;
    session.add_listener(Arc::new(LoggingListener));

    let outcome = query(&session, cli);
    let closed = session.close();
    let result = outcome?;
    closed?;

    serde_json::to_writer_pretty(&mut *stdout, &result).map_err(AppError::Serialise)?;
    writeln!(stdout)?;
    Ok(())
}

fn session_config(cli: &Cli) -> SessionConfig {
    let config = SessionConfig::default()
        .with_handshake_timeout(Duration::from_millis(cli.handshake_timeout_ms));
    match cli.request_timeout_ms {
        Some(millis) => config.with_request_timeout(Duration::from_millis(millis)),
        None => config,
    }
}

fn handshake_params(cli: &Cli) -> HandshakeParams {
    let mut params = HandshakeParams::new(&cli.source_dir, &cli.build_dir, &cli.generator);
    params.extra_generator.clone_from(&cli.extra_generator);
    params.platform.clone_from(&cli.platform);
    params.toolset.clone_from(&cli.toolset);
    params
}

fn query(session: &CMakeSession, cli: &Cli) -> Result<Value, AppError> {
    session.handshake(&handshake_params(cli))?;

    if cli.query.needs_generate() {
        if cli.definitions.is_empty() {
            session.configure()?;
        } else {
            session.configure_with(cli.definitions.iter().cloned())?;
        }
        session.compute()?;
    }

    match cli.query {
        Query::Codemodel => to_json(&session.code_model()?),
        Query::Cache => to_json(&session.cmake_cache()?),
        Query::Inputs => to_json(&session.cmake_inputs()?),
        Query::Watchers => to_json(&session.file_system_watchers()?),
        Query::Settings => to_json(&session.global_settings()?),
    }
}

fn to_json<T: Serialize>(result: &T) -> Result<Value, AppError> {
    serde_json::to_value(result).map_err(AppError::Serialise)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "cmake-server-probe",
            "--source-dir",
            "/src",
            "--build-dir",
            "/build",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("parse failed")
    }

    #[rstest]
    fn handshake_params_carry_optional_generator_fields() {
        let cli = parse(&["--generator", "Ninja", "--platform", "x64"]);

        let params = handshake_params(&cli);

        assert_eq!(params.source_directory, "/src");
        assert_eq!(params.build_directory, "/build");
        assert_eq!(params.generator, "Ninja");
        assert_eq!(params.platform.as_deref(), Some("x64"));
        assert!(params.extra_generator.is_none());
        assert!(params.toolset.is_none());
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&["--request-timeout-ms", "250"], Some(Duration::from_millis(250)))]
    fn session_config_maps_timeouts(
        #[case] extra: &[&str],
        #[case] request_timeout: Option<Duration>,
    ) {
        let cli = parse(extra);

        let config = session_config(&cli);

        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, request_timeout);
    }

    #[rstest]
    fn help_goes_to_stdout() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = run(
            [OsString::from("cmake-server-probe"), OsString::from("--help")],
            &mut stdout,
            &mut stderr,
        );

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(String::from_utf8_lossy(&stdout).contains("--source-dir"));
        assert!(stderr.is_empty());
    }
}
