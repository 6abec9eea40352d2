// SPDX-License-Identifier: MIT OR Apache-2.0
//! Initial-state snapshot and reset.
//!
//! Captured once when the timeline is constructed. Every rebuild rolls the
//! scene, camera and renderer back to it so the build function always
//! starts from the same world.

use crate::camera::{Camera, OrthoBounds, Projection};
use crate::stage::{NodeId, Renderer, Rgb, SceneGraph};
use indexmap::IndexSet;

/// Camera fields restored on reset
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Position
    pub position: [f32; 3],
    /// Rotation
    pub rotation: [f32; 4],
    /// Orthographic frustum, for orthographic cameras
    pub ortho: Option<OrthoBounds>,
}

/// Renderer fields restored on reset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererState {
    /// Clear color
    pub clear_color: Rgb,
    /// Clear alpha
    pub clear_alpha: f32,
    /// Shadow maps enabled
    pub shadows_enabled: bool,
}

/// Snapshot of the world before any build function ran
#[derive(Debug, Clone)]
pub struct InitialState {
    nodes: IndexSet<NodeId>,
    camera: CameraState,
    renderer: RendererState,
}

impl InitialState {
    /// Snapshot the current scene, camera and renderer
    pub fn capture<G, R>(scene: &G, camera: &Camera, renderer: &R) -> Self
    where
        G: SceneGraph,
        R: Renderer<G>,
    {
        Self {
            nodes: scene.node_ids().into_iter().collect(),
            camera: CameraState {
                position: camera.position,
                rotation: camera.rotation,
                ortho: camera.ortho_bounds(),
            },
            renderer: RendererState {
                clear_color: renderer.clear_color(),
                clear_alpha: renderer.clear_alpha(),
                shadows_enabled: renderer.shadows_enabled(),
            },
        }
    }

    /// Whether `id` existed at capture time
    pub fn is_initial(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Captured camera state
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Captured renderer state
    pub fn renderer(&self) -> RendererState {
        self.renderer
    }

    /// Remove and dispose every node added since capture. Returns how many.
    pub fn reset_scene<G: SceneGraph>(&self, scene: &mut G) -> usize {
        let added: Vec<NodeId> = scene
            .node_ids()
            .into_iter()
            .filter(|id| !self.is_initial(*id))
            .collect();
        let mut removed = 0;
        for id in added {
            if let Some(node) = scene.remove(id) {
                scene.dispose(node);
                removed += 1;
            }
        }
        removed
    }

    /// Put the camera back to its captured pose
    pub fn restore_camera(&self, camera: &mut Camera) {
        camera.position = self.camera.position;
        camera.rotation = self.camera.rotation;
        if let (Some(bounds), Projection::Orthographic(current)) =
            (self.camera.ortho, &mut camera.projection)
        {
            *current = bounds;
        }
    }

    /// Restore clear color and shadows; resize to `size` when given
    pub fn restore_renderer<G, R: Renderer<G>>(&self, renderer: &mut R, size: Option<(u32, u32)>) {
        renderer.set_clear_color(self.renderer.clear_color, self.renderer.clear_alpha);
        renderer.set_shadows_enabled(self.renderer.shadows_enabled);
        if let Some((width, height)) = size {
            renderer.resize(width, height);
        }
    }
}
