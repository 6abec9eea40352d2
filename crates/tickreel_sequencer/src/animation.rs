// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation value objects.
//!
//! An [`Animation`] pairs a sample sequence with an updater callback. Once
//! scheduled it becomes a [`ScheduledAnimation`] whose sample `i` lands on
//! tick `start_tick + i`.

use crate::camera::Camera;
use crate::interpolation::{ease_in_out_quad, lerp_vec3, slerp, Interpolation};
use crate::time::{FrameRate, Tick};
use rand::Rng;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Default duration of the camera helpers
pub const DEFAULT_CAMERA_MOVE_MS: f32 = 800.0;

/// Mutable view handed to every instruction, updater and dependency
pub struct TickContext<'a, G> {
    /// Scene graph
    pub scene: &'a mut G,
    /// Camera
    pub camera: &'a mut Camera,
    tick: Tick,
    fps: FrameRate,
    inserted: &'a mut Vec<(Tick, Animation<G>)>,
}

impl<'a, G> TickContext<'a, G> {
    pub(crate) fn new(
        scene: &'a mut G,
        camera: &'a mut Camera,
        tick: Tick,
        fps: FrameRate,
        inserted: &'a mut Vec<(Tick, Animation<G>)>,
    ) -> Self {
        Self {
            scene,
            camera,
            tick,
            fps,
            inserted,
        }
    }

    /// Tick being traced
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Timeline frame rate
    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    /// Schedule animations while tracing, e.g. in reaction to a collision.
    ///
    /// They join the schedule once the current trace phase finishes.
    pub fn insert_anim_at(&mut self, tick: Tick, animations: impl IntoIterator<Item = Animation<G>>) {
        self.inserted
            .extend(animations.into_iter().map(|animation| (tick, animation)));
    }
}

/// Updater invoked with `(context, value, tick, is_last)`
pub type Updater<G> = Rc<RefCell<dyn FnMut(&mut TickContext<'_, G>, f32, Tick, bool)>>;

/// A sample sequence plus the callback that applies each sample
pub struct Animation<G> {
    interpolation: Interpolation,
    updater: Updater<G>,
}

impl<G> Clone for Animation<G> {
    fn clone(&self) -> Self {
        Self {
            interpolation: self.interpolation.clone(),
            updater: Rc::clone(&self.updater),
        }
    }
}

impl<G> fmt::Debug for Animation<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("len", &self.interpolation.len())
            .finish_non_exhaustive()
    }
}

impl<G> Animation<G> {
    /// Create an animation
    pub fn new<F>(interpolation: Interpolation, updater: F) -> Self
    where
        F: FnMut(&mut TickContext<'_, G>, f32, Tick, bool) + 'static,
    {
        Self {
            interpolation,
            updater: Rc::new(RefCell::new(updater)),
        }
    }

    /// Animation whose updater does nothing
    pub fn idle(interpolation: Interpolation) -> Self {
        Self::new(interpolation, |_, _, _, _| {})
    }

    /// Samples
    pub fn interpolation(&self) -> &Interpolation {
        &self.interpolation
    }

    /// Number of ticks this animation spans
    pub fn len(&self) -> usize {
        self.interpolation.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.interpolation.is_empty()
    }

    /// Independent samples, shared updater
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Play backwards
    pub fn reverse(mut self) -> Self {
        self.interpolation = self.interpolation.reverse();
        self
    }

    /// Stretch or compress to `round(len * factor)` samples
    pub fn scale_length(mut self, factor: f32) -> Self {
        self.interpolation = self.interpolation.scale_length(factor);
        self
    }

    /// Add another sequence sample by sample
    pub fn sum(mut self, other: &Interpolation) -> Self {
        self.interpolation = self.interpolation.sum(other);
        self
    }

    /// Jitter every sample by up to `scale`
    pub fn add_noise<R: Rng>(mut self, scale: f32, rng: &mut R) -> Self {
        self.interpolation = self.interpolation.add_noise(scale, rng);
        self
    }

    /// Replace the samples with a transformed version
    pub fn map_interpolation(mut self, f: impl FnOnce(Interpolation) -> Interpolation) -> Self {
        self.interpolation = f(self.interpolation);
        self
    }

    /// Whether both animations call the same updater
    pub fn shares_updater(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.updater, &other.updater)
    }
}

/// An animation pinned to a start tick
pub struct ScheduledAnimation<G> {
    start_tick: Tick,
    interpolation: Interpolation,
    updater: Updater<G>,
}

impl<G> fmt::Debug for ScheduledAnimation<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledAnimation")
            .field("start_tick", &self.start_tick)
            .field("end_tick", &self.end_tick())
            .finish_non_exhaustive()
    }
}

impl<G> ScheduledAnimation<G> {
    /// Pin `animation` at `start_tick`; empty animations cover no tick and yield `None`
    pub fn new(start_tick: Tick, animation: Animation<G>) -> Option<Self> {
        if animation.is_empty() {
            return None;
        }
        Some(Self {
            start_tick,
            interpolation: animation.interpolation,
            updater: animation.updater,
        })
    }

    /// First covered tick
    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    /// Last covered tick
    pub fn end_tick(&self) -> Tick {
        self.start_tick + self.len() - 1
    }

    /// Number of covered ticks
    pub fn len(&self) -> Tick {
        self.interpolation.len() as Tick
    }

    /// Always false; empty animations are never scheduled
    pub fn is_empty(&self) -> bool {
        self.interpolation.is_empty()
    }

    /// Whether `tick` falls inside `[start_tick, end_tick]`
    pub fn is_active(&self, tick: Tick) -> bool {
        tick >= self.start_tick && tick <= self.end_tick()
    }

    /// Apply the sample for the context's tick. Returns false when inactive.
    pub(crate) fn apply(&self, ctx: &mut TickContext<'_, G>) -> bool {
        let tick = ctx.tick();
        if !self.is_active(tick) {
            return false;
        }
        let local = (tick - self.start_tick) as usize;
        let Some(value) = self.interpolation.get(local) else {
            return false;
        };
        let is_last = local + 1 == self.interpolation.len();
        let mut update = self.updater.borrow_mut();
        (&mut *update)(ctx, value, tick, is_last);
        true
    }
}

/// Pan the camera in its XY plane to `target`, keeping its Z
pub fn move_camera<G>(target: [f32; 2], duration_ms: f32, fps: FrameRate) -> Animation<G> {
    let mut start: Option<[f32; 3]> = None;
    Animation::new(
        ease_in_out_quad(0.0, 1.0, duration_ms, fps),
        move |ctx, progress, _, _| {
            if progress == 0.0 || start.is_none() {
                start = Some(ctx.camera.position);
            }
            if let Some(from) = start {
                let to = [target[0], target[1], from[2]];
                ctx.camera.position = lerp_vec3(from, to, progress);
            }
        },
    )
}

/// Move and rotate the camera to a full pose
pub fn move_camera_3d<G>(
    position: [f32; 3],
    rotation: [f32; 4],
    duration_ms: f32,
    fps: FrameRate,
) -> Animation<G> {
    let mut start: Option<([f32; 3], [f32; 4])> = None;
    Animation::new(
        ease_in_out_quad(0.0, 1.0, duration_ms, fps),
        move |ctx, progress, _, _| {
            if progress == 0.0 || start.is_none() {
                start = Some((ctx.camera.position, ctx.camera.rotation));
            }
            if let Some((from_position, from_rotation)) = start {
                ctx.camera.position = lerp_vec3(from_position, position, progress);
                ctx.camera.rotation = slerp(from_rotation, rotation, progress);
            }
        },
    )
}

/// Rotate the camera in place
pub fn rotate_camera<G>(rotation: [f32; 4], duration_ms: f32, fps: FrameRate) -> Animation<G> {
    let mut start: Option<[f32; 4]> = None;
    Animation::new(
        ease_in_out_quad(0.0, 1.0, duration_ms, fps),
        move |ctx, progress, _, _| {
            if progress == 0.0 || start.is_none() {
                start = Some(ctx.camera.rotation);
            }
            if let Some(from) = start {
                ctx.camera.rotation = slerp(from, rotation, progress);
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DEFAULT_FOV;
    use crate::interpolation::ease_linear;

    const FPS: FrameRate = FrameRate::new(120);

    fn run<G>(scene: &mut G, camera: &mut Camera, scheduled: &ScheduledAnimation<G>, tick: Tick) -> bool {
        let mut inserted = Vec::new();
        let mut ctx = TickContext::new(scene, camera, tick, FPS, &mut inserted);
        scheduled.apply(&mut ctx)
    }

    #[test]
    fn test_copy_shares_updater_not_samples() {
        let anim: Animation<()> = Animation::idle(ease_linear(0.0, 1.0, 100.0, FPS));
        let copy = anim.copy().reverse();
        assert!(anim.shares_updater(&copy));
        assert_eq!(anim.interpolation().get(0), Some(0.0));
        assert_eq!(copy.interpolation().get(0), Some(1.0));
    }

    #[test]
    fn test_scheduled_coverage_and_is_last() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&calls);
        let anim: Animation<()> = Animation::new(
            Interpolation::from_samples(vec![1.0, 2.0, 3.0]),
            move |_, value, tick, is_last| log.borrow_mut().push((value, tick, is_last)),
        );
        let scheduled = ScheduledAnimation::new(5, anim).unwrap();
        assert_eq!(scheduled.end_tick(), 7);

        let mut camera = Camera::perspective(DEFAULT_FOV, 1.0, 0.1, 100.0);
        let mut scene = ();
        for tick in 0..10 {
            run(&mut scene, &mut camera, &scheduled, tick);
        }
        assert_eq!(
            *calls.borrow(),
            vec![(1.0, 5, false), (2.0, 6, false), (3.0, 7, true)]
        );
    }

    #[test]
    fn test_empty_animation_is_not_scheduled() {
        let anim: Animation<()> = Animation::idle(Interpolation::default());
        assert!(ScheduledAnimation::new(0, anim).is_none());
    }

    #[test]
    fn test_move_camera_keeps_z() {
        let mut camera = Camera::perspective(DEFAULT_FOV, 1.0, 0.1, 100.0);
        camera.position = [0.0, 0.0, 30.0];
        let anim: Animation<()> = move_camera([10.0, -4.0], 100.0, FPS);
        let last = anim.len() as Tick - 1;
        let scheduled = ScheduledAnimation::new(0, anim).unwrap();
        let mut scene = ();
        for tick in 0..=last {
            run(&mut scene, &mut camera, &scheduled, tick);
        }
        assert!((camera.position[0] - 10.0).abs() < 1e-4);
        assert!((camera.position[1] + 4.0).abs() < 1e-4);
        assert_eq!(camera.position[2], 30.0);
    }

    #[test]
    fn test_rotate_camera_reaches_target() {
        let mut camera = Camera::perspective(DEFAULT_FOV, 1.0, 0.1, 100.0);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let target = [0.0, half, 0.0, half];
        let anim: Animation<()> = rotate_camera(target, 50.0, FPS);
        let last = anim.len() as Tick - 1;
        let scheduled = ScheduledAnimation::new(0, anim).unwrap();
        let mut scene = ();
        for tick in 0..=last {
            run(&mut scene, &mut camera, &scheduled, tick);
        }
        for (got, want) in camera.rotation.iter().zip(target) {
            assert!((got - want).abs() < 1e-4);
        }
    }
}
