// SPDX-License-Identifier: MIT OR Apache-2.0
//! Orbit camera controls for interactive preview.
//!
//! Input is queued by the host and applied on the next `update`. The orbit
//! is recomputed from the camera pose every time, so the controls follow
//! whatever the timeline did to the camera since the last update.

use std::cell::RefCell;
use std::rc::Rc;
use tickreel_sequencer::camera::{length, sub};
use tickreel_sequencer::{Camera, Controls};

/// Input accumulated since the last update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PendingInput {
    orbit: [f32; 2],
    pan: [f32; 2],
    zoom: f32,
}

impl PendingInput {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Orbit, pan and zoom around a target point
#[derive(Debug, Clone)]
pub struct OrbitControls {
    /// Orbit target (look-at point)
    target: [f32; 3],
    enabled: bool,
    pending: PendingInput,
    /// Rotation speed in radians per input unit
    pub rotate_speed: f32,
    /// Pan speed relative to distance
    pub pan_speed: f32,
    /// Zoom speed
    pub zoom_speed: f32,
    /// Closest allowed distance
    pub min_distance: f32,
    /// Farthest allowed distance
    pub max_distance: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: [0.0, 0.0, 0.0],
            enabled: true,
            pending: PendingInput::default(),
            rotate_speed: 0.01,
            pan_speed: 0.001,
            zoom_speed: 1.0,
            min_distance: 0.1,
            max_distance: 10000.0,
        }
    }
}

impl OrbitControls {
    /// Create controls orbiting the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an orbit drag
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.pending.orbit[0] += delta_x;
        self.pending.orbit[1] += delta_y;
    }

    /// Queue a pan drag
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        self.pending.pan[0] += delta_x;
        self.pending.pan[1] += delta_y;
    }

    /// Queue a zoom step
    pub fn zoom(&mut self, delta: f32) {
        self.pending.zoom += delta;
    }

    /// Whether input is waiting for the next update
    pub fn has_pending_input(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Controls for OrbitControls {
    fn update(&mut self, camera: &mut Camera) {
        let input = std::mem::take(&mut self.pending);
        if !self.enabled || input.is_empty() {
            return;
        }

        let offset = sub(camera.position, self.target);
        let mut distance = length(offset).max(self.min_distance);
        let mut yaw = offset[0].atan2(offset[2]);
        let mut pitch = (offset[1] / distance).clamp(-1.0, 1.0).asin();

        yaw += input.orbit[0] * self.rotate_speed;
        pitch += input.orbit[1] * self.rotate_speed;
        // Clamp pitch to avoid flipping over the poles
        pitch = pitch.clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );

        if input.pan != [0.0, 0.0] {
            let right = [yaw.cos(), 0.0, -yaw.sin()];
            let speed = distance * self.pan_speed;
            for (axis, r) in right.iter().enumerate() {
                self.target[axis] -= r * input.pan[0] * speed;
            }
            self.target[1] += input.pan[1] * speed;
        }

        distance *= 1.0 - input.zoom * self.zoom_speed * 0.1;
        distance = distance.clamp(self.min_distance, self.max_distance);

        camera.position = [
            self.target[0] + distance * pitch.cos() * yaw.sin(),
            self.target[1] + distance * pitch.sin(),
            self.target[2] + distance * pitch.cos() * yaw.cos(),
        ];
        camera.look_at(self.target);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending = PendingInput::default();
        }
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn target(&self) -> [f32; 3] {
        self.target
    }

    fn set_target(&mut self, target: [f32; 3]) {
        self.target = target;
    }
}

/// Orbit controls shared between the timeline and the input source
#[derive(Debug, Clone, Default)]
pub struct SharedOrbit(Rc<RefCell<OrbitControls>>);

impl SharedOrbit {
    /// Share `controls`
    pub fn new(controls: OrbitControls) -> Self {
        Self(Rc::new(RefCell::new(controls)))
    }

    /// Run `f` with the controls, e.g. to queue input
    pub fn with<T>(&self, f: impl FnOnce(&mut OrbitControls) -> T) -> T {
        f(&mut self.0.borrow_mut())
    }
}

impl Controls for SharedOrbit {
    fn update(&mut self, camera: &mut Camera) {
        self.0.borrow_mut().update(camera);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().set_enabled(enabled);
    }

    fn enabled(&self) -> bool {
        self.0.borrow().enabled()
    }

    fn target(&self) -> [f32; 3] {
        self.0.borrow().target()
    }

    fn set_target(&mut self, target: [f32; 3]) {
        self.0.borrow_mut().set_target(target);
    }
}
