// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project settings.
//!
//! Stored as RON in `tickreel.ron` next to the assets. Every section has
//! defaults, so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tickreel_sequencer::TimelineConfig;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "tickreel.ron";

/// Errors loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid RON for these settings
    #[error("failed to parse settings: {0}")]
    Parse(String),
    /// Settings could not be serialized
    #[error("failed to serialize settings: {0}")]
    Serialize(String),
    /// File was written by a newer version
    #[error("settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
    /// Values parse but are out of range
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Where export artifacts go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Root for `render_<id>` frame directories
    pub frames_dir: PathBuf,
    /// Scratch directory for mixed audio tracks
    pub audio_dir: PathBuf,
    /// Finished videos
    pub video_dir: PathBuf,
    /// Keep the image sequence after a successful encode
    pub keep_frames: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("image_renders"),
            audio_dir: PathBuf::from("audio_renders"),
            video_dir: PathBuf::from("rendered_videos"),
            keep_frames: false,
        }
    }
}

/// ffmpeg invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// ffmpeg executable
    pub ffmpeg: String,
    /// Video codec
    pub video_codec: String,
    /// Pixel format
    pub pixel_format: String,
    /// Audio codec used when the video has sound
    pub audio_codec: String,
    /// Encoder speed preset
    pub preset: String,
    /// Constant rate factor
    pub crf: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            preset: "fast".to_string(),
            crf: 23,
        }
    }
}

/// Complete project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Format version
    pub version: u32,
    /// Project name
    pub name: String,
    /// Demo scene built by default
    pub scene: String,
    /// Timeline behavior
    pub timeline: TimelineConfig,
    /// Export locations
    pub output: OutputSettings,
    /// Video encoder
    pub encoder: EncoderSettings,
    /// Root for relative audio clip paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_root: Option<PathBuf>,
    /// Master playback volume
    pub master_volume: f32,
    /// Interactive preview size
    pub preview_size: (u32, u32),
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            name: "Untitled".to_string(),
            scene: "sequence".to_string(),
            timeline: TimelineConfig::default(),
            output: OutputSettings::default(),
            encoder: EncoderSettings::default(),
            assets_root: None,
            master_volume: 1.0,
            preview_size: (540, 960),
        }
    }
}

impl ProjectSettings {
    /// Parse settings from RON text
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let settings: ProjectSettings =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        settings
            .timeline
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if settings.preview_size.0 == 0 || settings.preview_size.1 == 0 {
            return Err(ConfigError::Invalid("preview size must be non-zero".into()));
        }

        Ok(settings)
    }

    /// Load project settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::debug!("Loaded settings '{}' from {:?}", settings.name, path);
        Ok(settings)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No settings at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        ron::ser::to_string_pretty(self, config).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save project settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Settings file path inside a project directory
    pub fn settings_file_path(project_dir: &Path) -> PathBuf {
        project_dir.join(SETTINGS_FILE_NAME)
    }
}
