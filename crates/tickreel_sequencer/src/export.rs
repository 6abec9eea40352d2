// SPDX-License-Identifier: MIT OR Apache-2.0
//! Offline frame export.
//!
//! `render()` replays the whole timeline at export resolution, hands every
//! `render_skip`-th tick to the [`FrameWriter`](crate::stage::FrameWriter),
//! then passes the written frames and the collected audio cues to the
//! [`Encoder`](crate::stage::Encoder) exactly once.

use crate::audio::{AudioMode, ExportAudioCue};
use crate::error::{Result, TimelineError};
use crate::stage::{Renderer, SceneGraph};
use crate::time::{FrameRate, Tick};
use crate::timeline::{Activity, AnimatedScene, TimelineState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Job handed to the video encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeRequest {
    /// Output frame rate
    pub fps: f32,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Sounds to mix in, aligned to output frames
    pub audio_cues: Vec<ExportAudioCue>,
    /// Written frames, in order
    pub frames: Vec<PathBuf>,
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// Frames handed to the writer
    pub frames_written: u32,
    /// Job passed to the encoder
    pub request: EncodeRequest,
}

/// Which ticks become output frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportPlan {
    total_ticks: Tick,
    render_skip: u32,
}

impl ExportPlan {
    /// Plan an export of `total_ticks` keeping every `render_skip`-th tick
    pub fn new(total_ticks: Tick, render_skip: u32) -> Self {
        Self {
            total_ticks,
            render_skip: render_skip.max(1),
        }
    }

    /// Output frame index for `tick`, if it is exported
    pub fn frame_for_tick(&self, tick: Tick) -> Option<u32> {
        (tick < self.total_ticks && tick % self.render_skip == 0).then(|| tick / self.render_skip)
    }

    /// Number of output frames
    pub fn frame_count(&self) -> u32 {
        self.total_ticks.div_ceil(self.render_skip)
    }

    /// Output frame rate for a timeline running at `fps`
    pub fn output_fps(&self, fps: FrameRate) -> f32 {
        fps.fps() as f32 / self.render_skip as f32
    }
}

impl<G, R> AnimatedScene<G, R>
where
    G: SceneGraph,
    R: Renderer<G>,
{
    /// Export every tick at the configured resolution and start the
    /// encoder. Interactive state is restored whether or not the export
    /// succeeds.
    pub fn render(&mut self) -> Result<ExportSummary> {
        tracing::info!(
            "Starting export at {}x{}, every {} ticks",
            self.config.width,
            self.config.height,
            self.config.render_skip
        );
        self.activity = Activity::Rendering;
        self.stop_controls();
        self.renderer.resize(self.config.width, self.config.height);

        let exported = self.export_frames();
        let restored = self.restore_interactive();

        match (exported, restored) {
            (Ok(summary), Ok(())) => {
                tracing::info!("Export finished with {} frames", summary.frames_written);
                Ok(summary)
            }
            (Err(err), _) => {
                tracing::error!("Export failed: {}", err);
                Err(err)
            }
            (Ok(_), Err(err)) => {
                tracing::error!("Failed to restore the timeline after export: {}", err);
                Err(err)
            }
        }
    }

    fn export_frames(&mut self) -> Result<ExportSummary> {
        self.jump_to_frame(0, true)?;
        self.cues.begin_export(self.config.render_skip);
        self.trace_tick(0, true, true);

        let plan = ExportPlan::new(self.total_ticks(), self.config.render_skip);
        let mut frames_written = 0;
        for tick in 0..self.total_ticks() {
            self.render_tick = tick;
            if tick != 0 {
                self.trace_tick(tick, true, false);
            }
            if let Some(frame) = plan.frame_for_tick(tick) {
                self.renderer.render_frame(&self.scene, &self.camera);
                if let Err(err) = self.frames.write_frame(frame, self.renderer.surface()) {
                    if let Err(finish_err) = self.frames.finish() {
                        tracing::warn!("Frame writer did not shut down cleanly: {}", finish_err);
                    }
                    return Err(err.into());
                }
                frames_written += 1;
            }
            self.notify_observer();
        }

        let frames = self.frames.finish()?;
        let request = EncodeRequest {
            fps: plan.output_fps(self.fps),
            width: self.config.width,
            height: self.config.height,
            audio_cues: self.cues.take_exported(),
            frames,
        };
        self.encoder.encode(request.clone())?;
        Ok(ExportSummary {
            frames_written,
            request,
        })
    }

    fn restore_interactive(&mut self) -> Result<(), TimelineError> {
        self.activity = Activity::Idle;
        self.cues.set_mode(AudioMode::Live);
        let (width, height) = self.container;
        self.renderer.resize(width, height);
        let jumped = self.jump_to_frame(0, false);
        if jumped.is_err() {
            self.state = TimelineState::Unbuilt;
        }
        self.start_controls();
        jumped.map(|_| ())
    }
}
