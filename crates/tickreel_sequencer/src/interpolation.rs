// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interpolation sequences for the sequencer.
//!
//! An [`Interpolation`] is a finite run of samples, one per tick. Easing laws
//! generate them from `(start, end, duration)`; the transforms here reshape
//! them without touching any schedule state.

use crate::time::FrameRate;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Overshoot used by [`Easing::Rubberband`] (about 10%)
const RUBBERBAND_OVERSHOOT: f32 = 1.70158;

/// Easing law used to fill a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Easing {
    /// Hold the start value
    Constant,
    /// Straight line from start to end
    #[default]
    Linear,
    /// Quadratic ease in/out
    InOutQuad,
    /// Cubic overshoot that settles on the end value
    Rubberband,
}

impl Easing {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant => "Constant",
            Self::Linear => "Linear",
            Self::InOutQuad => "InOutQuad",
            Self::Rubberband => "Rubberband",
        }
    }

    /// Map normalized time `t` in `[0, 1]` to eased progress
    pub fn ease(&self, t: f32) -> f32 {
        match self {
            Self::Constant => 0.0,
            Self::Linear => t,
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::Rubberband => {
                if t == 0.0 {
                    0.0
                } else if t == 1.0 {
                    1.0
                } else {
                    let u = t - 1.0;
                    1.0 + (RUBBERBAND_OVERSHOOT + 1.0) * u.powi(3) + RUBBERBAND_OVERSHOOT * u.powi(2)
                }
            }
        }
    }
}

/// Ordered samples, one per tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interpolation {
    samples: Vec<f32>,
}

impl Interpolation {
    /// Wrap raw samples
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Sample `duration_ms` of `easing` between `start` and `end`
    pub fn eased(easing: Easing, start: f32, end: f32, duration_ms: f32, fps: FrameRate) -> Self {
        let frames = fps.millis_to_ticks(duration_ms) as usize;
        if easing == Easing::Constant || frames < 2 {
            return Self::from_samples(vec![start; frames]);
        }
        let last = (frames - 1) as f32;
        let samples = (0..frames)
            .map(|i| start + (end - start) * easing.ease(i as f32 / last))
            .collect();
        Self { samples }
    }

    /// Concatenate sequences end to end
    pub fn concat(parts: impl IntoIterator<Item = Interpolation>) -> Self {
        let samples = parts.into_iter().flat_map(|p| p.samples).collect();
        Self { samples }
    }

    /// Append another sequence after this one
    pub fn then(mut self, other: Interpolation) -> Self {
        self.samples.extend(other.samples);
        self
    }

    /// Number of samples (ticks covered)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the sequence covers no ticks
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at a local index
    pub fn get(&self, index: usize) -> Option<f32> {
        self.samples.get(index).copied()
    }

    /// All samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Take the samples out
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Reverse sample order
    pub fn reverse(mut self) -> Self {
        self.samples.reverse();
        self
    }

    /// Rescale length by `factor`, keeping the covered value range
    pub fn scale_length(self, factor: f32) -> Self {
        if factor == 1.0 {
            return self;
        }
        let new_len = (self.samples.len() as f32 * factor.max(0.0)).round() as usize;
        self.resample(new_len)
    }

    /// Resample to exactly `new_len` samples
    pub fn resample(self, new_len: usize) -> Self {
        use std::cmp::Ordering;
        match new_len.cmp(&self.samples.len()) {
            Ordering::Equal => self,
            Ordering::Greater => Self::from_samples(stretch(&self.samples, new_len)),
            Ordering::Less => Self::from_samples(compress(&self.samples, new_len)),
        }
    }

    /// Elementwise sum; the shorter side is padded with zeros
    pub fn sum(self, other: &Interpolation) -> Self {
        let len = self.samples.len().max(other.samples.len());
        let samples = (0..len)
            .map(|i| self.samples.get(i).copied().unwrap_or(0.0) + other.get(i).unwrap_or(0.0))
            .collect();
        Self { samples }
    }

    /// Add uniform noise in `[-scale, scale]` to every sample
    pub fn add_noise<R: Rng>(mut self, scale: f32, rng: &mut R) -> Self {
        let scale = scale.abs();
        if scale == 0.0 {
            return self;
        }
        for sample in &mut self.samples {
            *sample += rng.random_range(-scale..=scale);
        }
        self
    }
}

impl From<Vec<f32>> for Interpolation {
    fn from(samples: Vec<f32>) -> Self {
        Self::from_samples(samples)
    }
}

/// Hold `start` for `duration_ms`
pub fn ease_constant(start: f32, duration_ms: f32, fps: FrameRate) -> Interpolation {
    Interpolation::eased(Easing::Constant, start, start, duration_ms, fps)
}

/// Linear ramp
pub fn ease_linear(start: f32, end: f32, duration_ms: f32, fps: FrameRate) -> Interpolation {
    Interpolation::eased(Easing::Linear, start, end, duration_ms, fps)
}

/// Quadratic ease in/out
pub fn ease_in_out_quad(start: f32, end: f32, duration_ms: f32, fps: FrameRate) -> Interpolation {
    Interpolation::eased(Easing::InOutQuad, start, end, duration_ms, fps)
}

/// Cubic overshoot
pub fn rubberband(start: f32, end: f32, duration_ms: f32, fps: FrameRate) -> Interpolation {
    Interpolation::eased(Easing::Rubberband, start, end, duration_ms, fps)
}

/// Grow by piecewise-linear sampling at evenly spaced virtual indices
fn stretch(values: &[f32], new_len: usize) -> Vec<f32> {
    let len = values.len();
    if len == 0 {
        return Vec::new();
    }
    if new_len < 2 || len == 1 {
        return vec![values[0]; new_len];
    }

    let step = (len - 1) as f32 / (new_len - 1) as f32;
    (0..new_len)
        .map(|i| {
            let pos = i as f32 * step;
            let index = (pos.floor() as usize).min(len - 1);
            let remainder = pos - index as f32;
            if remainder <= 0.0 || index == len - 1 {
                values[index]
            } else {
                values[index] * (1.0 - remainder) + values[index + 1] * remainder
            }
        })
        .collect()
}

/// Shrink by box averaging with fractional overlap weights
fn compress(values: &[f32], new_len: usize) -> Vec<f32> {
    let len = values.len();
    if new_len == 0 || len == 0 {
        return Vec::new();
    }

    let block = len as f32 / new_len as f32;
    (0..new_len)
        .map(|i| {
            let start = i as f32 * block;
            let end = start + block;
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(len);
            for (j, value) in values.iter().enumerate().take(last).skip(first) {
                let weight = end.min(j as f32 + 1.0) - start.max(j as f32);
                if weight > 0.0 {
                    sum += value * weight;
                    weight_sum += weight;
                }
            }
            if weight_sum > 0.0 {
                sum / weight_sum
            } else {
                values[first.min(len - 1)]
            }
        })
        .collect()
}

/// Linear interpolation between two floats
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate Vec3
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

/// Spherical linear interpolation for `[x, y, z, w]` quaternions
pub fn slerp(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3];

    // Take the shortest arc
    let mut b = b;
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        dot = -dot;
    }

    if dot > 0.9995 {
        let result = [
            lerp(a[0], b[0], t),
            lerp(a[1], b[1], t),
            lerp(a[2], b[2], t),
            lerp(a[3], b[3], t),
        ];
        let len = result.iter().map(|c| c * c).sum::<f32>().sqrt();
        return result.map(|c| c / len);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    [
        a[0] * s0 + b[0] * s1,
        a[1] * s0 + b[1] * s1,
        a[2] * s0 + b[2] * s1,
        a[3] * s0 + b[3] * s1,
    ]
}
