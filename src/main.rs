mod config;
mod error;
mod game;
mod pipeline;
mod types;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, unbounded};

use config::{AppConfig, FrameSourceConfig, PlayArgs};
use game::{Session, SessionInputs};
use pipeline::{
    FrameStream, LatestFrameSender, StreamSettings, latest_frame_channel, start_classifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rock-paper-scissors against your camera", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play rounds against the machine.
    Play(PlayArgs),
    /// List the cameras that can be used with `--source camera`.
    Cameras,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Cameras => list_cameras(),
    }
}

fn run_play(args: PlayArgs) -> Result<()> {
    let config = AppConfig::try_from(args).context("invalid configuration")?;

    // One slot per frame consumer: a new frame replaces the one still pending.
    let (preview_tx, preview_rx) = latest_frame_channel();
    let (classify_tx, classify_rx) = latest_frame_channel();
    let (output_tx, output_rx) = bounded(1);
    let (worker_tx, worker_rx) = unbounded();

    let recognizer = start_classifier(config.backend.clone(), classify_rx, worker_rx, output_tx);
    let stream = start_frame_source(&config.source, config.stream, preview_tx, classify_tx)?;

    let (session, updates) = Session::start(
        config.session.clone(),
        SessionInputs {
            preview_rx,
            classifier_rx: output_rx,
            worker_tx: Some(worker_tx),
        },
    );

    let result = ui::run_console(session.control(), updates, config.locale, config.auto_rounds);

    session.shutdown();
    stream.stop();
    if recognizer.join().is_err() {
        log::error!("gesture classifier thread panicked");
    }

    result
}

fn start_frame_source(
    source: &FrameSourceConfig,
    settings: StreamSettings,
    preview_tx: LatestFrameSender,
    classify_tx: LatestFrameSender,
) -> Result<FrameStream> {
    match source {
        FrameSourceConfig::Synthetic => Ok(pipeline::start_synthetic_stream(
            settings,
            preview_tx,
            classify_tx,
        )),
        FrameSourceConfig::Replay { dir } => {
            pipeline::start_replay_stream(dir, settings, preview_tx, classify_tx)
        }
        #[cfg(feature = "camera-nokhwa")]
        FrameSourceConfig::Camera { index } => pipeline::camera::start_camera_stream(
            *index,
            settings.classify_fps,
            preview_tx,
            classify_tx,
        )
        .with_context(|| format!("failed to open camera {index}")),
        #[cfg(not(feature = "camera-nokhwa"))]
        FrameSourceConfig::Camera { index } => anyhow::bail!(
            "cannot open camera {index}: camera support was not compiled in \
             (enable the `camera-nokhwa` feature)"
        ),
    }
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::camera::available_cameras().context("failed to query cameras")?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for (idx, name) in cameras.iter().enumerate() {
        println!("{idx}: {name}");
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    println!("camera support was not compiled in (enable the `camera-nokhwa` feature)");
    Ok(())
}
