//! Fushigi2D - Landmark-driven 2D sprite avatar
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fushigi2d::{
    avatar::AssetManager,
    config::Config,
    pipeline,
    render::RasterCanvas,
    tracking::{
        mediapipe::MpReceiver,
        replay::ReplayTracker,
        subprocess::{missing_helper_modules, HelperTracker, TrackerSubprocess},
    },
    Pipeline, RunSummary,
};

/// Fushigi2D - Landmark-driven 2D sprite avatar
#[derive(Parser, Debug)]
#[command(name = "fushigi2d", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Play landmarks from a JSON-lines file instead of listening for the tracker
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Tracker UDP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Save the last presented frame as PNG on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", fushigi2d::NAME, fushigi2d::VERSION);

    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.tracker.port = port;
    }

    // Validate configuration
    config.validate()?;

    // Everything the rig needs is loaded up front; any failure here is fatal
    let assets = AssetManager::new(&config.avatar)?;
    let sprites = assets.load_sprites()?;
    let background = match &config.window.background_image {
        Some(filename) => {
            let size = (config.window.size[0], config.window.size[1]);
            Some(assets.load_image(filename, size)?)
        }
        None => None,
    };

    let mut pipeline = Pipeline::new(&config, sprites, background);
    let mut canvas = RasterCanvas::new(config.window.size[0], config.window.size[1])?;

    info!(
        "Window: {}x{}, avatar: {}x{}, target fps: {}",
        config.window.size[0],
        config.window.size[1],
        config.avatar.size[0],
        config.avatar.size[1],
        config.render.target_fps
    );

    // Single-threaded: one frame at a time, no overlap
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(run_tracking(&args, &config, &mut pipeline, &mut canvas))?;

    if let Some(ref path) = args.snapshot {
        canvas.save_png(path)?;
    }

    info!("Fushigi2D stopped ({} frames, {:?})", summary.frames, summary.reason);
    Ok(())
}

/// Pick the landmark source and run the frame loop on it
async fn run_tracking(
    args: &Args,
    config: &Config,
    pipeline: &mut Pipeline,
    canvas: &mut RasterCanvas,
) -> anyhow::Result<RunSummary> {
    let interval = config.render.frame_interval();

    if let Some(ref path) = args.replay {
        let mut tracker = ReplayTracker::from_file(path)?;
        info!("Replaying {} frames from {}", tracker.remaining(), path.display());
        let summary = pipeline::run(
            pipeline,
            &mut tracker,
            canvas,
            interval,
            args.max_frames,
            shutdown_signal(),
        )
        .await?;
        return Ok(summary);
    }

    // Bind before launching the helper so its first packets are not lost
    let mut receiver = MpReceiver::new(&config.tracker);
    receiver.start()?;

    let helper = if config.tracker.auto_launch {
        let missing = missing_helper_modules();
        if !missing.is_empty() {
            warn!("Python modules {:?} not found, the tracker helper will likely fail", missing);
        }
        Some(TrackerSubprocess::spawn(&config.tracker)?)
    } else {
        None
    };
    let mut tracker = HelperTracker::new(receiver, helper);

    info!(
        "MediaPipe tracking started (port: {}, auto launch: {})",
        config.tracker.port, config.tracker.auto_launch
    );

    let result = pipeline::run(
        pipeline,
        &mut tracker,
        canvas,
        interval,
        args.max_frames,
        shutdown_signal(),
    )
    .await;

    // Cleanup
    tracker.tracker_mut().stop();
    tracker.stop_helper().await;

    Ok(result?)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
