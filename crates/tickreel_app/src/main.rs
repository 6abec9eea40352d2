// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tickreel - procedural animation timelines
//!
//! A command-line host for deterministic, tick-indexed animation scenes:
//! - Seek to any frame and inspect the resulting state
//! - Play back a range in real time with audio cues, or headless
//! - Orbit the camera around a frame and save a snapshot
//! - Export every frame to PNG and hand the sequence to ffmpeg
//!
//! ## Architecture
//!
//! The timeline itself lives in `tickreel_sequencer`. This binary supplies
//! the collaborators it drives: a software rasterizer, a rodio audio engine,
//! a threaded PNG writer and an ffmpeg encoder.

mod anims;
mod audio;
mod controls;
mod encoder;
mod frames;
mod host;
mod play_mode;
mod raster;
mod scenes;
mod settings;
mod stage;

use clap::{Parser, Subcommand};
use host::{AppError, Host, ViewInput};
use play_mode::{DisplayClock, Pacing};
use scenes::DemoScene;
use settings::{ConfigError, ProjectSettings, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tickreel_sequencer::{Renderer, Tick};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How often `render` polls the encoder
const ENCODE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "tickreel", version)]
#[command(about = "Render, play and export procedural animation timelines")]
struct Cli {
    /// Project settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    /// Scene to build, overriding the settings file
    #[arg(long, global = true)]
    scene: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write default project settings
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Export every frame and encode a video
    Render,
    /// Play a range of ticks
    Play {
        /// First tick
        #[arg(long, default_value_t = 0)]
        from: Tick,
        /// Last tick, defaults to the end of the timeline
        #[arg(long)]
        to: Option<Tick>,
        /// Clock seconds to run, defaults to one pass over the range
        #[arg(long)]
        seconds: Option<f64>,
        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f32,
        /// Advance the clock without sleeping
        #[arg(long)]
        headless: bool,
    },
    /// Rebuild and trace up to a tick
    Seek {
        /// Target tick
        frame: Tick,
        /// Orbit the camera by a drag delta
        #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_negative_numbers = true)]
        orbit: Option<Vec<f32>>,
        /// Pan the camera by a drag delta
        #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_negative_numbers = true)]
        pan: Option<Vec<f32>>,
        /// Zoom steps, positive moves closer
        #[arg(long, allow_negative_numbers = true)]
        zoom: Option<f32>,
        /// Save the shown frame as PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print timeline length and state
    Info,
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["tickreel_app=debug", "tickreel_sequencer=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tickreel v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(Cli::parse()) {
        tracing::error!("tickreel failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    if let Command::Init { dir, force } = &cli.command {
        return init(dir, *force, cli.scene.as_deref());
    }

    let settings = ProjectSettings::load_or_default(&cli.settings)?;
    let scene: DemoScene = cli.scene.as_deref().unwrap_or(&settings.scene).parse()?;
    let mut host = Host::new(&settings, scene)?;

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Render => render(&mut host),
        Command::Play {
            from,
            to,
            seconds,
            speed,
            headless,
        } => {
            let pacing = if headless { Pacing::Simulated } else { Pacing::RealTime };
            play(&mut host, from, to, seconds, speed, pacing)
        }
        Command::Seek {
            frame,
            orbit,
            pan,
            zoom,
            snapshot,
        } => {
            let input = ViewInput {
                orbit: drag(orbit),
                pan: drag(pan),
                zoom,
            };
            host.seek(frame, &input)?;
            if let Some(path) = snapshot {
                host.timeline().renderer().surface().save(&path)?;
                tracing::info!("Saved snapshot to {}", path.display());
            }
            info(&host);
            Ok(())
        }
        Command::Info => {
            host.timeline_mut().jump_to_frame(0, false)?;
            info(&host);
            Ok(())
        }
    }
}

fn init(dir: &Path, force: bool, scene: Option<&str>) -> Result<(), AppError> {
    let path = ProjectSettings::settings_file_path(dir);
    if path.exists() && !force {
        tracing::warn!("{} already exists, pass --force to overwrite", path.display());
        return Ok(());
    }
    let mut settings = ProjectSettings::default();
    if let Some(scene) = scene {
        settings.scene = scene.parse::<DemoScene>()?.name().to_string();
    }
    std::fs::create_dir_all(dir).map_err(ConfigError::from)?;
    settings.save(&path)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

fn render(host: &mut Host) -> Result<(), AppError> {
    let summary = host.timeline_mut().render()?;
    tracing::info!(
        "Exported {} frames, waiting for the encoder",
        summary.frames_written
    );

    let progress = host.encode_state().wait(ENCODE_POLL_INTERVAL);
    match (progress.error, progress.output) {
        (Some(error), _) => Err(AppError::Encode(error)),
        (None, Some(output)) => {
            tracing::info!("Video written to {}", output.display());
            Ok(())
        }
        (None, None) => Err(AppError::Encode(format!(
            "encoder finished at step '{}' without output",
            progress.step
        ))),
    }
}

fn play(
    host: &mut Host,
    from: Tick,
    to: Option<Tick>,
    seconds: Option<f64>,
    speed: f32,
    pacing: Pacing,
) -> Result<(), AppError> {
    let timeline = host.timeline_mut();
    timeline.play_range(from, to.unwrap_or(Tick::MAX))?;

    // play_range wraps `from` and clamps `to` to the built timeline
    let start = timeline.render_tick();
    let last = to
        .unwrap_or(Tick::MAX)
        .min(timeline.total_ticks().saturating_sub(1));
    let fps = timeline.config().fps;
    let seconds = seconds.unwrap_or_else(|| f64::from(last.saturating_sub(start) + 1) / f64::from(fps));

    let mut clock = DisplayClock::new(f64::from(fps));
    clock.set_time_scale(speed);
    let refreshes = play_mode::run_for(
        timeline,
        &mut clock,
        Duration::from_secs_f64(seconds.max(0.0)),
        pacing,
    )?;

    timeline.pause();
    tracing::info!(
        "Played {} refreshes, stopped at tick {}",
        refreshes,
        timeline.render_tick()
    );
    Ok(())
}

/// Two-value drag argument as an array
fn drag(values: Option<Vec<f32>>) -> Option<[f32; 2]> {
    values.and_then(|values| <[f32; 2]>::try_from(values).ok())
}

fn info(host: &Host) {
    let timeline = host.timeline();
    let fps = timeline.config().fps;
    tracing::info!(
        "Timeline: {} ticks at {} fps ({:.2}s), at tick {}, state {:?}",
        timeline.total_ticks(),
        fps,
        f64::from(timeline.total_ticks()) / f64::from(fps),
        timeline.render_tick(),
        timeline.state()
    );
    tracing::info!(
        "Scene: {} nodes, {} disposed, {} frames rendered",
        timeline.scene().len(),
        timeline.scene().disposed(),
        timeline.renderer().frames_rendered()
    );
}
