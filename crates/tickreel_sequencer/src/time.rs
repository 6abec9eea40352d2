// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tick arithmetic.

use serde::{Deserialize, Serialize};

/// One discrete timeline step
pub type Tick = u32;

/// Float slack applied before rounding durations up to whole ticks
const TICK_EPSILON: f64 = 1e-6;

/// Animation-logic frame rate (ticks per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate(u32);

impl FrameRate {
    /// Create a frame rate; zero is clamped to one tick per second
    pub const fn new(fps: u32) -> Self {
        Self(if fps == 0 { 1 } else { fps })
    }

    /// Ticks per second
    pub fn fps(self) -> u32 {
        self.0
    }

    /// Number of ticks covering `millis`, rounded up
    pub fn millis_to_ticks(self, millis: f32) -> Tick {
        if millis.is_nan() || millis <= 0.0 {
            return 0;
        }
        let exact = f64::from(millis) / 1000.0 * f64::from(self.0);
        (exact - TICK_EPSILON).ceil().max(0.0) as Tick
    }

    /// Elapsed milliseconds at the start of `tick`
    pub fn ticks_to_millis(self, tick: Tick) -> f32 {
        (f64::from(tick) / f64::from(self.0) * 1000.0) as f32
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(120)
    }
}
