// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera pose and projection.
//!
//! The camera is plain data owned by the timeline; renderers read it and
//! callbacks mutate it through the tick context.

use crate::config::TimelineConfig;
use serde::{Deserialize, Serialize};

/// Identity quaternion `[x, y, z, w]`
pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Vertical field of view used for 3D scenes (degrees)
pub const DEFAULT_FOV: f32 = 75.0;

/// Orthographic frustum bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthoBounds {
    /// Zoom factor
    pub zoom: f32,
    /// Left plane
    pub left: f32,
    /// Right plane
    pub right: f32,
    /// Top plane
    pub top: f32,
    /// Bottom plane
    pub bottom: f32,
}

/// Camera projection kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective camera
    Perspective {
        /// Vertical field of view in degrees
        fov: f32,
        /// Width over height
        aspect: f32,
    },
    /// Orthographic camera
    Orthographic(OrthoBounds),
}

/// Scene camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World position
    pub position: [f32; 3],
    /// Orientation quaternion `[x, y, z, w]`
    pub rotation: [f32; 4],
    /// Projection
    pub projection: Projection,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Perspective camera at the origin
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: IDENTITY_ROTATION,
            projection: Projection::Perspective { fov, aspect },
            near,
            far,
        }
    }

    /// Orthographic camera showing `zoom` units above and below the center
    pub fn orthographic(zoom: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: IDENTITY_ROTATION,
            projection: Projection::Orthographic(OrthoBounds {
                zoom: 1.0,
                left: -zoom * aspect,
                right: zoom * aspect,
                top: zoom,
                bottom: -zoom,
            }),
            near,
            far,
        }
    }

    /// Camera matching a timeline configuration, pulled back by `zoom` on +Z
    pub fn for_config(config: &TimelineConfig) -> Self {
        let aspect = config.aspect();
        let mut camera = if config.three_dim {
            Self::perspective(DEFAULT_FOV, aspect, 0.1, config.far_limit)
        } else {
            Self::orthographic(config.zoom, aspect, 1.0, config.far_limit)
        };
        camera.position = [0.0, 0.0, config.zoom];
        camera
    }

    /// Whether this is an orthographic camera
    pub fn is_orthographic(&self) -> bool {
        matches!(self.projection, Projection::Orthographic(_))
    }

    /// Orthographic bounds, if any
    pub fn ortho_bounds(&self) -> Option<OrthoBounds> {
        match self.projection {
            Projection::Orthographic(bounds) => Some(bounds),
            Projection::Perspective { .. } => None,
        }
    }

    /// Direction the camera looks along (local -Z)
    pub fn forward(&self) -> [f32; 3] {
        rotate_vector(self.rotation, [0.0, 0.0, -1.0])
    }

    /// Orient the camera toward `target`, keeping +Y up
    pub fn look_at(&mut self, target: [f32; 3]) {
        let back = normalize(sub(self.position, target));
        if length(back) == 0.0 {
            return;
        }
        let mut right = cross([0.0, 1.0, 0.0], back);
        if length(right) < 1e-6 {
            // Looking straight up or down
            right = cross([0.0, 0.0, 1.0], back);
        }
        let right = normalize(right);
        let up = cross(back, right);
        self.rotation = quat_from_basis(right, up, back);
    }
}

/// Rotate `v` by the unit quaternion `q`
pub fn rotate_vector(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let u = [q[0], q[1], q[2]];
    let w = q[3];
    let uv = cross(u, v);
    let uuv = cross(u, uv);
    [
        v[0] + 2.0 * (w * uv[0] + uuv[0]),
        v[1] + 2.0 * (w * uv[1] + uuv[1]),
        v[2] + 2.0 * (w * uv[2] + uuv[2]),
    ]
}

/// Conjugate (inverse for unit quaternions)
pub fn conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Quaternion from orthonormal basis columns
fn quat_from_basis(x: [f32; 3], y: [f32; 3], z: [f32; 3]) -> [f32; 4] {
    let (m00, m11, m22) = (x[0], y[1], z[2]);
    let trace = m00 + m11 + m22;
    let q = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        [(y[2] - z[1]) * s, (z[0] - x[2]) * s, (x[1] - y[0]) * s, 0.25 / s]
    } else if m00 > m11 && m00 > m22 {
        let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
        [0.25 * s, (y[0] + x[1]) / s, (z[0] + x[2]) / s, (y[2] - z[1]) / s]
    } else if m11 > m22 {
        let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
        [(y[0] + x[1]) / s, 0.25 * s, (z[1] + y[2]) / s, (z[0] - x[2]) / s]
    } else {
        let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
        [(z[0] + x[2]) / s, (z[1] + y[2]) / s, 0.25 * s, (x[1] - y[0]) / s]
    };
    let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    q.map(|c| c / len)
}

/// `a - b`
pub fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// `a + b * s`
pub fn add_scaled(a: [f32; 3], b: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] + b[0] * s, a[1] + b[1] * s, a[2] + b[2] * s]
}

/// Cross product
pub fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean length
pub fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Unit vector (zero stays zero)
pub fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = length(v);
    if len == 0.0 {
        v
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}
