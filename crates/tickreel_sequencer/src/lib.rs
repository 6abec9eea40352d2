// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic tick-indexed timeline for procedural animation.
//!
//! A user-supplied build function declares what happens when:
//! - one-shot instructions at a tick
//! - animations (sample sequences plus updater callbacks)
//! - per-tick dependencies
//! - audio cues
//!
//! ## Architecture
//!
//! The timeline is built on:
//! - [`Interpolation`] sample sequences and easing laws
//! - a [`Schedule`] replayed tick by tick
//! - [`AnimatedScene`], which rebuilds on every seek, plays back, and exports
//! - collaborator traits in [`stage`] for the renderer, scene graph, audio,
//!   frame writer, encoder and controls
//!
//! Everything is single-threaded. Updaters are shared through `Rc`, so the
//! timeline is not `Send`.

pub mod animation;
pub mod audio;
pub mod camera;
pub mod config;
pub mod error;
pub mod export;
pub mod interpolation;
pub mod lifecycle;
pub mod schedule;
pub mod stage;
pub mod time;
pub mod timeline;

#[cfg(test)]
mod test_support;

pub use animation::{
    move_camera, move_camera_3d, rotate_camera, Animation, ScheduledAnimation, TickContext,
    Updater, DEFAULT_CAMERA_MOVE_MS,
};
pub use audio::{AudioCue, AudioMode, CueDispatcher, CueSheet, ExportAudioCue};
pub use camera::{Camera, OrthoBounds, Projection};
pub use config::{TimelineConfig, TraceMode};
pub use error::{AudioError, BoxError, ExportError, TimelineError};
pub use export::{EncodeRequest, ExportPlan, ExportSummary};
pub use interpolation::{
    ease_constant, ease_in_out_quad, ease_linear, rubberband, Easing, Interpolation,
};
pub use lifecycle::InitialState;
pub use schedule::{Dependency, Instruction, Schedule, TickReport};
pub use stage::{AudioPlayer, Controls, Encoder, FrameWriter, NodeId, Renderer, Rgb, SceneGraph};
pub use time::{FrameRate, Tick};
pub use timeline::{
    AnimatedScene, BuildFn, Collaborators, FrameInfo, LoopHandle, LoopKind, SceneBuilder,
    TimelineState,
};
