// SPDX-License-Identifier: MIT OR Apache-2.0
//! Display clock for live preview.
//!
//! This module handles:
//! - Starting and stopping the preview clock
//! - Converting wall time into display refreshes with a fixed timestep
//! - Pumping the timeline's armed frame loop once per refresh

use std::time::{Duration, Instant};
use tickreel_sequencer::{AnimatedScene, Renderer, SceneGraph, TimelineError};

/// Most refreshes run for a single clock update
const MAX_STEPS_PER_UPDATE: u32 = 8;

/// Clock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Not running
    #[default]
    Stopped,
    /// Producing refreshes
    Playing,
}

/// How `run_for` advances time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep between refreshes to follow the wall clock
    RealTime,
    /// Advance one refresh interval per iteration without sleeping
    Simulated,
}

/// Fixed-timestep display refresh clock
#[derive(Debug, Clone)]
pub struct DisplayClock {
    /// Current play state
    pub state: PlayState,
    /// Time scale (1.0 = normal speed)
    pub time_scale: f32,
    /// Refreshes per second
    refresh_rate: f64,
    /// Accumulated delta time for fixed timestep
    accumulated_time: f64,
    /// Refreshes produced since start
    pub frame_count: u64,
    /// Scaled time since start, in seconds
    pub elapsed_time: f64,
}

impl DisplayClock {
    /// Clock refreshing `refresh_rate` times per second
    pub fn new(refresh_rate: f64) -> Self {
        Self {
            state: PlayState::Stopped,
            time_scale: 1.0,
            refresh_rate: if refresh_rate > 0.0 { refresh_rate } else { 60.0 },
            accumulated_time: 0.0,
            frame_count: 0,
            elapsed_time: 0.0,
        }
    }

    /// Time between refreshes
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate)
    }

    /// Start from zero. Returns false if already playing.
    pub fn start(&mut self) -> bool {
        if self.state == PlayState::Playing {
            return false;
        }
        self.frame_count = 0;
        self.elapsed_time = 0.0;
        self.accumulated_time = 0.0;
        self.state = PlayState::Playing;
        tracing::debug!("Display clock started at {} Hz", self.refresh_rate);
        true
    }

    /// Stop and reset counters
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.accumulated_time = 0.0;
    }

    /// Set time scale (clamped to reasonable range)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(0.0, 10.0);
    }

    /// Advance by `delta_time` seconds. Returns how many refreshes are due.
    pub fn update(&mut self, delta_time: f64) -> u32 {
        if self.state != PlayState::Playing {
            return 0;
        }

        let scaled_delta = delta_time * f64::from(self.time_scale);
        self.elapsed_time += scaled_delta;
        self.accumulated_time += scaled_delta;

        let step = 1.0 / self.refresh_rate;
        let mut steps = 0;
        while self.accumulated_time >= step {
            self.accumulated_time -= step;
            steps += 1;

            // Drop the backlog instead of spiraling
            if steps >= MAX_STEPS_PER_UPDATE {
                self.accumulated_time = 0.0;
                break;
            }
        }
        self.frame_count += u64::from(steps);
        steps
    }
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

/// Run the timeline's armed loop `refreshes` times. Returns how many
/// refreshes found a loop to run.
pub fn pump<G, R>(timeline: &mut AnimatedScene<G, R>, refreshes: u32) -> Result<u32, TimelineError>
where
    G: SceneGraph,
    R: Renderer<G>,
{
    let mut handled = 0;
    for _ in 0..refreshes {
        let Some(handle) = timeline.next_frame_request() else {
            break;
        };
        if timeline.on_animation_frame(handle)? {
            handled += 1;
        }
    }
    Ok(handled)
}

/// Drive the timeline for `duration` of clock time. Returns the refreshes
/// handled.
pub fn run_for<G, R>(
    timeline: &mut AnimatedScene<G, R>,
    clock: &mut DisplayClock,
    duration: Duration,
    pacing: Pacing,
) -> Result<u64, TimelineError>
where
    G: SceneGraph,
    R: Renderer<G>,
{
    clock.start();
    let interval = clock.frame_interval();
    let mut handled = 0u64;
    let mut last = Instant::now();

    while clock.elapsed_time < duration.as_secs_f64() {
        let delta = match pacing {
            Pacing::RealTime => {
                std::thread::sleep(interval);
                let now = Instant::now();
                let delta = now - last;
                last = now;
                delta.as_secs_f64()
            }
            Pacing::Simulated => interval.as_secs_f64(),
        };
        let due = clock.update(delta);
        handled += u64::from(pump(timeline, due)?);
        if clock.time_scale == 0.0 {
            break;
        }
    }
    clock.stop();
    tracing::debug!("Display clock handled {} refreshes", handled);
    Ok(handled)
}
