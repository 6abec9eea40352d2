// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wires the concrete collaborators into a timeline.

use crate::audio::AudioEngine;
use crate::controls::{OrbitControls, SharedOrbit};
use crate::encoder::{EncodeState, FfmpegEncoder};
use crate::frames::PngFrameWriter;
use crate::play_mode;
use crate::raster::SoftwareRenderer;
use crate::scenes::{DemoScene, UnknownScene};
use crate::settings::{ConfigError, ProjectSettings};
use crate::stage::SceneData;
use std::sync::Arc;
use thiserror::Error;
use tickreel_sequencer::{AnimatedScene, Camera, Collaborators, Tick, TimelineError};

/// Timeline over the software stage
pub type Timeline = AnimatedScene<SceneData, SoftwareRenderer>;

/// Host errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings could not be loaded
    #[error("Settings error: {0}")]
    Config(#[from] ConfigError),
    /// The timeline rejected an operation
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),
    /// No such demo scene
    #[error(transparent)]
    UnknownScene(#[from] UnknownScene),
    /// The encoder reported a failure
    #[error("Encode failed: {0}")]
    Encode(String),
    /// A snapshot could not be saved
    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] image::ImageError),
}

/// Camera input applied after a seek
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewInput {
    /// Orbit drag delta
    pub orbit: Option<[f32; 2]>,
    /// Pan drag delta
    pub pan: Option<[f32; 2]>,
    /// Zoom steps, positive moves closer
    pub zoom: Option<f32>,
}

/// A timeline plus the handles the host keeps after boxing the rest
pub struct Host {
    timeline: Timeline,
    encode: Arc<EncodeState>,
    controls: SharedOrbit,
}

impl Host {
    /// Assemble a timeline for `scene` from project settings. Nothing is
    /// built until the first seek.
    pub fn new(settings: &ProjectSettings, scene: DemoScene) -> Result<Self, AppError> {
        let (width, height) = settings.preview_size;
        let renderer = SoftwareRenderer::new(width, height);

        let mut audio = AudioEngine::new(settings.assets_root.clone());
        audio.mixer.set_master(settings.master_volume);

        let controls = SharedOrbit::new(OrbitControls::new());
        let frames = PngFrameWriter::new(settings.output.frames_dir.clone());
        let encoder = FfmpegEncoder::new(
            settings.encoder.clone(),
            settings.output.clone(),
            settings.assets_root.clone(),
        );
        let encode = encoder.state();

        let collaborators = Collaborators {
            scene: SceneData::new(),
            camera: Camera::for_config(&settings.timeline),
            renderer,
            audio: Box::new(audio),
            controls: Box::new(controls.clone()),
            frames: Box::new(frames),
            encoder: Box::new(encoder),
        };

        tracing::info!(
            "Assembling '{}' with scene '{}' at {}x{} preview",
            settings.name,
            scene,
            width,
            height
        );
        let timeline = AnimatedScene::new(settings.timeline.clone(), collaborators, scene.build_fn())?;
        Ok(Self {
            timeline,
            encode,
            controls,
        })
    }

    /// Timeline
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Timeline, mutably
    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Progress of the encoder behind the timeline
    pub fn encode_state(&self) -> &Arc<EncodeState> {
        &self.encode
    }

    /// Show `frame`, then apply camera input through one idle refresh.
    /// Returns the tick shown.
    pub fn seek(&mut self, frame: Tick, input: &ViewInput) -> Result<Tick, AppError> {
        let tick = self.timeline.jump_to_frame(frame, false)?;
        if tick != frame {
            tracing::warn!("Tick {} is past the end, showing tick {}", frame, tick);
        }

        let queued = self.controls.with(|controls| {
            if let Some([dx, dy]) = input.orbit {
                controls.orbit(dx, dy);
            }
            if let Some([dx, dy]) = input.pan {
                controls.pan(dx, dy);
            }
            if let Some(zoom) = input.zoom {
                controls.zoom(zoom);
            }
            controls.has_pending_input()
        });
        if queued {
            play_mode::pump(&mut self.timeline, 1)?;
            tracing::debug!("Camera moved to {:?}", self.timeline.camera().position);
        }
        Ok(tick)
    }
}
