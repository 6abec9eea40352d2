// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audio playback for timeline cues.
//!
//! This module provides:
//! - A clip library that resolves and caches encoded clip bytes
//! - A master mixer
//! - An audio engine using rodio (when "audio" feature is enabled)
//!
//! When the "audio" feature is not enabled, a stub implementation is provided
//! that still resolves and caches clips, so preload failures surface the
//! same way, but logs a warning instead of playing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tickreel_sequencer::AudioError;

/// Master volume settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMixer {
    /// Master volume (0.0 to 1.0)
    pub master: f32,
    /// Master mute
    pub muted: bool,
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self {
            master: 1.0,
            muted: false,
        }
    }
}

impl AudioMixer {
    /// Volume actually sent to the output for a cue at `volume`
    pub fn effective(&self, volume: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            (volume * self.master).max(0.0)
        }
    }

    /// Set the master volume, clamped to `0..=1`
    pub fn set_master(&mut self, volume: f32) {
        self.master = volume.clamp(0.0, 1.0);
    }
}

/// Encoded clips keyed by the path used in the build function
#[derive(Debug, Default)]
pub struct ClipLibrary {
    assets_path: Option<PathBuf>,
    clips: HashMap<String, Arc<[u8]>>,
}

impl ClipLibrary {
    /// Library resolving relative clip paths against `assets_path`
    pub fn new(assets_path: Option<PathBuf>) -> Self {
        Self {
            assets_path,
            clips: HashMap::new(),
        }
    }

    /// Resolve a clip path to an existing file
    pub fn resolve(&self, clip: &str) -> Option<PathBuf> {
        if clip.is_empty() {
            return None;
        }

        let clip_path = PathBuf::from(clip);

        if clip_path.is_absolute() && clip_path.exists() {
            return Some(clip_path);
        }

        if let Some(assets) = &self.assets_path {
            let full_path = assets.join(&clip_path);
            if full_path.exists() {
                return Some(full_path);
            }
        }

        if clip_path.exists() {
            return Some(clip_path);
        }

        None
    }

    /// Read a clip into the cache. Already cached clips are not re-read.
    pub fn load(&mut self, clip: &str) -> Result<Arc<[u8]>, AudioError> {
        if let Some(bytes) = self.clips.get(clip) {
            return Ok(Arc::clone(bytes));
        }
        let path = self
            .resolve(clip)
            .ok_or_else(|| AudioError::NotFound(clip.to_string()))?;
        let bytes: Arc<[u8]> = std::fs::read(&path)
            .map_err(|e| AudioError::Decode {
                path: clip.to_string(),
                reason: e.to_string(),
            })?
            .into();
        tracing::debug!("Loaded audio clip {:?} ({} bytes)", path, bytes.len());
        self.clips.insert(clip.to_string(), Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Cached bytes for a clip
    pub fn get(&self, clip: &str) -> Option<Arc<[u8]>> {
        self.clips.get(clip).cloned()
    }

    /// Whether a clip is cached
    pub fn contains(&self, clip: &str) -> bool {
        self.clips.contains_key(clip)
    }
}

// ============================================================================
// Audio Engine Implementation (with rodio)
// ============================================================================

#[cfg(feature = "audio")]
mod engine {
    use super::*;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::io::Cursor;
    use tickreel_sequencer::AudioPlayer;

    /// Audio engine playing cues through the default output device
    pub struct AudioEngine {
        /// Output stream (must be kept alive)
        _stream: Option<OutputStream>,
        /// Stream handle for creating sinks
        stream_handle: Option<OutputStreamHandle>,
        /// Decoded clip sources
        clips: ClipLibrary,
        /// Master mixer
        pub mixer: AudioMixer,
        /// Whether audio output is initialized
        initialized: bool,
    }

    impl AudioEngine {
        /// Open the default output device
        pub fn new(assets_path: Option<PathBuf>) -> Self {
            let (stream, stream_handle, initialized) = match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    tracing::info!("Audio engine initialized successfully");
                    (Some(stream), Some(handle), true)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize audio: {}. Audio will be disabled.", e);
                    (None, None, false)
                }
            };

            Self {
                _stream: stream,
                stream_handle,
                clips: ClipLibrary::new(assets_path),
                mixer: AudioMixer::default(),
                initialized,
            }
        }

        /// Check if audio output is available
        pub fn is_available(&self) -> bool {
            self.initialized
        }
    }

    impl AudioPlayer for AudioEngine {
        fn load(&mut self, path: &str) -> Result<(), AudioError> {
            let bytes = self.clips.load(path)?;
            // Decode once up front so broken files fail at preload
            Decoder::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        }

        fn is_loaded(&self, path: &str) -> bool {
            self.clips.contains(path)
        }

        fn play(&mut self, path: &str, volume: f32) {
            let Some(handle) = &self.stream_handle else {
                return;
            };
            let Some(bytes) = self.clips.get(path) else {
                tracing::warn!("Audio clip not loaded: {}", path);
                return;
            };

            let sink = match Sink::try_new(handle) {
                Ok(sink) => sink,
                Err(e) => {
                    tracing::warn!("Failed to create audio sink: {}", e);
                    return;
                }
            };
            let source = match Decoder::new(Cursor::new(bytes)) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Failed to decode audio clip {}: {}", path, e);
                    return;
                }
            };

            sink.set_volume(self.mixer.effective(volume));
            sink.append(source);
            // Fire and forget: the sink plays to completion on its own
            sink.detach();
            tracing::trace!("Playing {} at volume {}", path, volume);
        }
    }
}

// ============================================================================
// Stub Implementation (without rodio)
// ============================================================================

#[cfg(not(feature = "audio"))]
mod engine {
    use super::*;
    use tickreel_sequencer::AudioPlayer;

    /// Audio engine stub (no audio output)
    pub struct AudioEngine {
        /// Cached clips
        clips: ClipLibrary,
        /// Master mixer
        pub mixer: AudioMixer,
        /// Log warning once
        warned: bool,
    }

    impl AudioEngine {
        /// Create the stub engine
        pub fn new(assets_path: Option<PathBuf>) -> Self {
            tracing::info!("Audio engine: stub implementation (audio feature not enabled)");
            Self {
                clips: ClipLibrary::new(assets_path),
                mixer: AudioMixer::default(),
                warned: false,
            }
        }

        fn warn_once(&mut self) {
            if !self.warned {
                tracing::warn!("Audio playback not available: compile with --features audio");
                self.warned = true;
            }
        }

        /// Check if audio output is available
        pub fn is_available(&self) -> bool {
            false
        }
    }

    impl AudioPlayer for AudioEngine {
        fn load(&mut self, path: &str) -> Result<(), AudioError> {
            self.clips.load(path).map(|_| ())
        }

        fn is_loaded(&self, path: &str) -> bool {
            self.clips.contains(path)
        }

        fn play(&mut self, path: &str, _volume: f32) {
            if self.clips.get(path).is_none() {
                tracing::warn!("Audio clip not loaded: {}", path);
                return;
            }
            self.warn_once();
        }
    }
}

pub use engine::AudioEngine;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tickreel_audio_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_mixer_volume() {
        let mut mixer = AudioMixer::default();
        mixer.set_master(2.0);
        assert_eq!(mixer.effective(0.5), 0.5);
        mixer.set_master(0.5);
        assert_eq!(mixer.effective(0.5), 0.25);
        mixer.muted = true;
        assert_eq!(mixer.effective(1.0), 0.0);
    }

    #[test]
    fn test_library_resolves_against_assets() {
        let dir = scratch_dir();
        std::fs::write(dir.join("click.wav"), b"RIFF").unwrap();

        let mut library = ClipLibrary::new(Some(dir.clone()));
        assert_eq!(library.resolve("click.wav"), Some(dir.join("click.wav")));
        let bytes = library.load("click.wav").unwrap();
        assert_eq!(&*bytes, b"RIFF");
        assert!(library.contains("click.wav"));
        assert_eq!(library.get("click.wav").as_deref(), Some(&b"RIFF"[..]));

        // Cached: removing the file does not matter any more
        std::fs::remove_file(dir.join("click.wav")).unwrap();
        assert!(library.load("click.wav").is_ok());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_library_missing_clip() {
        let mut library = ClipLibrary::new(None);
        assert!(matches!(
            library.load("does/not/exist.wav"),
            Err(AudioError::NotFound(_))
        ));
        assert!(library.resolve("").is_none());
        assert!(library.get("does/not/exist.wav").is_none());
    }

    #[cfg(not(feature = "audio"))]
    #[test]
    fn test_stub_engine_loads_without_output() {
        use tickreel_sequencer::AudioPlayer;

        let dir = scratch_dir();
        std::fs::write(dir.join("pop.wav"), b"data").unwrap();
        let mut engine = AudioEngine::new(Some(dir.clone()));
        assert!(!engine.is_available());
        assert!(engine.load("pop.wav").is_ok());
        assert!(engine.is_loaded("pop.wav"));
        engine.play("pop.wav", 1.0);
        engine.play("unknown.wav", 1.0);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
