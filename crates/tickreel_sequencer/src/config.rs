// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline configuration.

use crate::error::TimelineError;
use crate::time::FrameRate;
use serde::{Deserialize, Serialize};

/// How `jump_to_frame` replays the timeline up to the requested tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TraceMode {
    /// Trace every tick from 0 through the target
    #[default]
    FromStart,
    /// Run instructions scheduled before the target, then trace only the target.
    /// Assumes animations and dependencies are pure functions of the tick.
    TargetOnly,
}

/// Timeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Animation logic ticks per second
    pub fps: u32,
    /// Export width in pixels
    pub width: u32,
    /// Export height in pixels
    pub height: u32,
    /// Perspective (true) or orthographic (false) camera
    pub three_dim: bool,
    /// Replay strategy for seeks
    pub trace_mode: TraceMode,
    /// Export every n-th tick
    pub render_skip: u32,
    /// Play back every n-th display frame
    pub fps_throttle: u32,
    /// Gap before the first sequential background animation
    pub background_padding_ms: f32,
    /// Seed for the builder RNG
    pub noise_seed: u64,
    /// Camera distance (3D) or half-height (2D)
    pub zoom: f32,
    /// Far clip plane
    pub far_limit: f32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            fps: 120,
            width: 1080,
            height: 1920,
            three_dim: true,
            trace_mode: TraceMode::FromStart,
            render_skip: 2,
            fps_throttle: 1,
            background_padding_ms: 0.0,
            noise_seed: 0,
            zoom: 30.0,
            far_limit: 1000.0,
        }
    }
}

impl TimelineConfig {
    /// Frame rate as a typed value
    pub fn frame_rate(&self) -> FrameRate {
        FrameRate::new(self.fps)
    }

    /// Export width over height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.fps == 0 {
            return Err(TimelineError::InvalidConfig("fps must be positive".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(TimelineError::InvalidConfig(format!(
                "export size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.render_skip == 0 {
            return Err(TimelineError::InvalidConfig("render_skip must be at least 1".into()));
        }
        if self.fps_throttle == 0 {
            return Err(TimelineError::InvalidConfig("fps_throttle must be at least 1".into()));
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err(TimelineError::InvalidConfig(format!("zoom {} is not positive", self.zoom)));
        }
        if !self.background_padding_ms.is_finite() || self.background_padding_ms < 0.0 {
            return Err(TimelineError::InvalidConfig(
                "background_padding_ms must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Parse from RON
    pub fn from_ron(source: &str) -> Result<Self, TimelineError> {
        let config: Self = ron::from_str(source)
            .map_err(|e| TimelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, TimelineError> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| TimelineError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TimelineConfig::default();
        assert_eq!(config.fps, 120);
        assert_eq!(config.render_skip, 2);
        assert_eq!(config.trace_mode, TraceMode::FromStart);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_skip() {
        let config = TimelineConfig {
            render_skip: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TimelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = TimelineConfig {
            fps: 60,
            trace_mode: TraceMode::TargetOnly,
            ..Default::default()
        };
        let text = config.to_ron().unwrap();
        let loaded = TimelineConfig::from_ron(&text).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let loaded = TimelineConfig::from_ron("(fps: 30)").unwrap();
        assert_eq!(loaded.fps, 30);
        assert_eq!(loaded.width, 1080);
    }
}
