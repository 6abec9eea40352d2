// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audio cue scheduling.
//!
//! Cues are recorded against ticks while building and fired while tracing.
//! What "firing" means depends on the [`AudioMode`]: nothing while seeking,
//! live playback during play, or an entry in the export cue list during
//! render.

use crate::stage::AudioPlayer;
use crate::time::Tick;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sound to start at a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCue {
    /// Asset path
    pub path: String,
    /// Linear gain
    pub volume: f32,
    /// Tick the sound starts on
    pub at_tick: Tick,
}

/// A cue aligned to an exported frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportAudioCue {
    /// Asset path
    pub path: String,
    /// Linear gain
    pub volume: f32,
    /// Output frame the sound starts on
    pub at_frame: u32,
}

/// Tick-keyed cue list plus the set of assets to preload
#[derive(Debug, Clone, Default)]
pub struct CueSheet {
    cues: BTreeMap<Tick, Vec<AudioCue>>,
    registered: IndexSet<String>,
}

impl CueSheet {
    /// Create an empty sheet
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an asset for preloading
    pub fn register(&mut self, path: impl Into<String>) {
        self.registered.insert(path.into());
    }

    /// Whether an asset was registered
    pub fn is_registered(&self, path: &str) -> bool {
        self.registered.contains(path)
    }

    /// Registered assets, in registration order
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.registered.iter().map(String::as_str)
    }

    /// Record a cue
    pub fn record(&mut self, path: impl Into<String>, volume: f32, at_tick: Tick) {
        self.cues.entry(at_tick).or_default().push(AudioCue {
            path: path.into(),
            volume,
            at_tick,
        });
    }

    /// Cues starting at `tick`, in recording order
    pub fn cues_at(&self, tick: Tick) -> &[AudioCue] {
        self.cues.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of cues
    pub fn len(&self) -> usize {
        self.cues.values().map(Vec::len).sum()
    }

    /// Whether no cue was recorded
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Drop all cues and registrations
    pub fn clear(&mut self) {
        self.cues.clear();
        self.registered.clear();
    }
}

/// What firing a cue does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// The build function is running; cues are only recorded
    Building,
    /// Seeking; cues are suppressed
    Muted,
    /// Interactive; cues play through the audio player
    #[default]
    Live,
    /// Exporting; cues are collected with frame offsets
    Export,
}

/// Applies the current [`AudioMode`] to cues reached by the trace
#[derive(Debug, Default)]
pub struct CueDispatcher {
    mode: AudioMode,
    render_skip: u32,
    exported: Vec<ExportAudioCue>,
    suppressed: usize,
}

impl CueDispatcher {
    /// Create a dispatcher in live mode
    pub fn new() -> Self {
        Self {
            render_skip: 1,
            ..Self::default()
        }
    }

    /// Current mode
    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    /// Switch mode
    pub fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
    }

    /// Enter export mode with an empty cue list
    pub fn begin_export(&mut self, render_skip: u32) {
        self.mode = AudioMode::Export;
        self.render_skip = render_skip.max(1);
        self.exported.clear();
    }

    /// Take the collected export cues
    pub fn take_exported(&mut self) -> Vec<ExportAudioCue> {
        std::mem::take(&mut self.exported)
    }

    /// Number of cues suppressed while muted
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Fire `cues` according to the current mode
    pub fn fire(&mut self, cues: &[AudioCue], sheet: &CueSheet, player: &mut dyn AudioPlayer) {
        if cues.is_empty() {
            return;
        }
        match self.mode {
            AudioMode::Building => {}
            AudioMode::Muted => {
                self.suppressed += cues.len();
            }
            AudioMode::Live => {
                for cue in cues {
                    if !sheet.is_registered(&cue.path) {
                        tracing::warn!("Audio cue {} at tick {} was never registered", cue.path, cue.at_tick);
                        continue;
                    }
                    player.play(&cue.path, cue.volume);
                }
            }
            AudioMode::Export => {
                for cue in cues {
                    if !sheet.is_registered(&cue.path) {
                        tracing::warn!("Audio cue {} at tick {} was never registered", cue.path, cue.at_tick);
                        continue;
                    }
                    let at_frame = (cue.at_tick as f64 / f64::from(self.render_skip)).round() as u32;
                    self.exported.push(ExportAudioCue {
                        path: cue.path.clone(),
                        volume: cue.volume,
                        at_frame,
                    });
                }
            }
        }
    }
}
