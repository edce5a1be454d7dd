// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless Pulse host.
//!
//! Loads a project and runs it for a fixed number of frames:
//!
//! ```text
//! pulse_host <project.json> [settings.ron] [--frames N]
//! ```

use clap::Parser;
use pulse_graph::library::create_standard_registry;
use pulse_graph::{
    ConfigError, DocumentError, EvaluationError, FrameContext, LoadMode, Session, SessionConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Frames per second of simulated time
const FRAME_RATE: f64 = 60.0;

/// Frames run when none are requested
const DEFAULT_FRAMES: u64 = 300;

#[derive(Debug, thiserror::Error)]
enum HostError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Run a Pulse patch without a window
#[derive(Debug, Parser)]
#[command(name = "pulse_host", version, about)]
struct Args {
    /// Project document (JSON)
    project: PathBuf,

    /// Session settings (RON); defaults apply when omitted
    settings: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long, default_value_t = DEFAULT_FRAMES)]
    frames: u64,
}

fn init_tracing() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["pulse_host=info", "pulse_graph=debug"] {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(err) => eprintln!("ignoring log directive {directive}: {err}"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(args: Args) -> Result<(), HostError> {
    let config = match &args.settings {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let json = std::fs::read_to_string(&args.project).map_err(|source| HostError::Read {
        path: args.project.clone(),
        source,
    })?;

    let mut session = Session::new(Arc::new(create_standard_registry()), config);
    let report = session.load_json(&json, LoadMode::Restore)?;
    tracing::info!(
        nodes = report.id_map.len(),
        cables = report.cables,
        skipped = report.skipped_nodes + report.skipped_cables,
        "loaded {}",
        args.project.display()
    );

    let mut faults = 0;
    for frame_index in 0..args.frames {
        let time = frame_index as f64 / FRAME_RATE;
        // Sweep the pointer in a slow circle so pointer-driven patches move
        let frame = FrameContext::at(time).with_pointer(time.cos() as f32, time.sin() as f32);
        let frame_report = session.tick(&frame)?;
        faults += frame_report.faults.len();

        if frame_index % FRAME_RATE as u64 == 0 {
            tracing::info!(
                frame = frame_index,
                evaluated = frame_report.evaluated,
                skipped = frame_report.skipped,
                "tick"
            );
        }
    }

    tracing::info!(frames = args.frames, faults, cyclic = session.is_cyclic(), "done");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();
    tracing::info!("Starting Pulse host v{}", env!("CARGO_PKG_VERSION"));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pulse_host").chain(list.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["patch.json", "settings.ron", "--frames", "12"]).unwrap();
        assert_eq!(parsed.project, PathBuf::from("patch.json"));
        assert_eq!(parsed.settings, Some(PathBuf::from("settings.ron")));
        assert_eq!(parsed.frames, 12);

        let parsed = args(&["patch.json"]).unwrap();
        assert_eq!(parsed.frames, DEFAULT_FRAMES);
        assert!(parsed.settings.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(args(&[]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(
            args(&["a.json", "-f", "lots"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            args(&["a.json", "b.ron", "c.ron"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }
}
