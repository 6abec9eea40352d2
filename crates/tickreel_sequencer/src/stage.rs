// SPDX-License-Identifier: MIT OR Apache-2.0
//! Collaborator traits.
//!
//! The timeline never talks to a concrete renderer, scene graph, audio
//! backend or encoder. Hosts plug them in through these traits.

use crate::camera::Camera;
use crate::error::{AudioError, ExportError};
use crate::export::EncodeRequest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear RGB color
pub type Rgb = [f32; 3];

/// Retained-mode scene graph
pub trait SceneGraph {
    /// Node payload
    type Node;

    /// Insert a node at the root, returning its ID
    fn insert(&mut self, node: Self::Node) -> NodeId;

    /// Detach a node
    fn remove(&mut self, id: NodeId) -> Option<Self::Node>;

    /// IDs of all root-level nodes, in insertion order
    fn node_ids(&self) -> Vec<NodeId>;

    /// Whether a node is attached
    fn contains(&self, id: NodeId) -> bool;

    /// Release resources held by a detached node
    fn dispose(&mut self, node: Self::Node) {
        drop(node);
    }
}

/// Draws a scene through a camera into a surface
pub trait Renderer<G> {
    /// Pixel surface produced by a render
    type Surface;

    /// Render one frame
    fn render_frame(&mut self, scene: &G, camera: &Camera);

    /// Last rendered surface
    fn surface(&self) -> &Self::Surface;

    /// Resize the drawing buffer
    fn resize(&mut self, width: u32, height: u32);

    /// Current drawing buffer size
    fn size(&self) -> (u32, u32);

    /// Set the clear color and alpha
    fn set_clear_color(&mut self, color: Rgb, alpha: f32);

    /// Clear color
    fn clear_color(&self) -> Rgb;

    /// Clear alpha
    fn clear_alpha(&self) -> f32;

    /// Whether shadow maps are enabled
    fn shadows_enabled(&self) -> bool;

    /// Toggle shadow maps
    fn set_shadows_enabled(&mut self, enabled: bool);
}

/// Fire-and-forget sound playback
pub trait AudioPlayer {
    /// Load and decode an asset so later plays start immediately
    fn load(&mut self, path: &str) -> Result<(), AudioError>;

    /// Whether an asset is already loaded
    fn is_loaded(&self, path: &str) -> bool;

    /// Start playing a loaded asset. Unknown assets are logged and skipped.
    fn play(&mut self, path: &str, volume: f32);
}

/// Persists rendered frames during export
pub trait FrameWriter<S> {
    /// Queue frame `index` for writing
    fn write_frame(&mut self, index: u32, surface: &S) -> Result<(), ExportError>;

    /// Wait for all queued writes and return the written paths in order
    fn finish(&mut self) -> Result<Vec<PathBuf>, ExportError>;
}

/// Turns an image sequence plus audio cues into a video
pub trait Encoder {
    /// Start encoding. Returns once the job is handed off.
    fn encode(&mut self, request: EncodeRequest) -> Result<(), ExportError>;
}

/// Interactive camera controls
pub trait Controls {
    /// Apply pending input to the camera
    fn update(&mut self, camera: &mut Camera);

    /// Enable or disable input handling
    fn set_enabled(&mut self, enabled: bool);

    /// Whether input handling is enabled
    fn enabled(&self) -> bool;

    /// Orbit target
    fn target(&self) -> [f32; 3];

    /// Move the orbit target
    fn set_target(&mut self, target: [f32; 3]);
}
