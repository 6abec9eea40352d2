// SPDX-License-Identifier: MIT OR Apache-2.0
//! Video encoding through ffmpeg.
//!
//! This module handles:
//! - Mixing exported audio cues into one track (`adelay` + `amix`)
//! - Turning the PNG sequence plus that track into an H.264 video
//! - Encode progress reporting from a detached worker thread
//!
//! Argument lists are built by pure functions so they can be checked
//! without ffmpeg installed.

use crate::settings::{EncoderSettings, OutputSettings};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tickreel_sequencer::{EncodeRequest, Encoder, ExportError, ExportAudioCue};
use uuid::Uuid;

/// Name of the request manifest written beside the frames
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Encode progress snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeProgress {
    /// Current step description
    pub step: String,
    /// Whether the job finished
    pub complete: bool,
    /// Error message if any
    pub error: Option<String>,
    /// Finished video
    pub output: Option<PathBuf>,
}

/// Shared encode state for the detached worker
pub struct EncodeState {
    step: Mutex<String>,
    error: Mutex<Option<String>>,
    output: Mutex<Option<PathBuf>>,
    complete: AtomicBool,
}

impl EncodeState {
    /// Fresh state
    pub fn new() -> Self {
        Self {
            step: Mutex::new("Idle".to_string()),
            error: Mutex::new(None),
            output: Mutex::new(None),
            complete: AtomicBool::new(false),
        }
    }

    fn reset(&self) {
        self.set_step("Queued");
        *self.error.lock() = None;
        *self.output.lock() = None;
        self.complete.store(false, Ordering::Relaxed);
    }

    fn set_step(&self, step: impl Into<String>) {
        *self.step.lock() = step.into();
    }

    fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!("Encode failed: {}", error);
        *self.error.lock() = Some(error);
        self.complete.store(true, Ordering::Relaxed);
    }

    fn succeed(&self, output: PathBuf) {
        tracing::info!("Video created successfully: {:?}", output);
        self.set_step("Done");
        *self.output.lock() = Some(output);
        self.complete.store(true, Ordering::Relaxed);
    }

    /// Whether the last job finished, successfully or not
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Relaxed)
    }

    /// Poll every `interval` until the current job completes
    pub fn wait(&self, interval: Duration) -> EncodeProgress {
        while !self.is_complete() {
            std::thread::sleep(interval);
        }
        self.progress()
    }

    /// Current progress
    pub fn progress(&self) -> EncodeProgress {
        EncodeProgress {
            step: self.step.lock().clone(),
            complete: self.complete.load(Ordering::Relaxed),
            error: self.error.lock().clone(),
            output: self.output.lock().clone(),
        }
    }
}

impl Default for EncodeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before a cue starts, in whole milliseconds
pub fn cue_delay_ms(cue: &ExportAudioCue, fps: f32) -> u64 {
    if fps <= 0.0 {
        return 0;
    }
    (cue.at_frame as f64 / f64::from(fps) * 1000.0).floor() as u64
}

/// Resolve a cue path against the assets root
pub fn resolve_cue_path(path: &str, assets_root: Option<&Path>) -> PathBuf {
    let direct = Path::new(path);
    if direct.is_absolute() && direct.exists() {
        return direct.to_path_buf();
    }
    match assets_root {
        Some(root) => root.join(path.trim_start_matches('/')),
        None => direct.to_path_buf(),
    }
}

/// ffmpeg arguments mixing every cue into `output`
pub fn audio_mix_args(
    cues: &[ExportAudioCue],
    fps: f32,
    assets_root: Option<&Path>,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut filters = Vec::with_capacity(cues.len());
    let mut labels = String::new();

    for (index, cue) in cues.iter().enumerate() {
        args.push("-i".into());
        args.push(resolve_cue_path(&cue.path, assets_root).display().to_string());
        let delay = cue_delay_ms(cue, fps);
        filters.push(format!(
            "[{index}:a]adelay={delay}|{delay},volume={}[a{index}]",
            cue.volume
        ));
        labels.push_str(&format!("[a{index}]"));
    }

    let filter_complex = format!(
        "{}; {}amix=inputs={}:duration=longest:normalize=0[out]",
        filters.join("; "),
        labels,
        cues.len()
    );
    args.extend([
        "-filter_complex".to_string(),
        filter_complex,
        "-map".to_string(),
        "[out]".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// ffmpeg arguments turning `frames_dir/frame_%05d.png` into `output`
pub fn video_args(
    settings: &EncoderSettings,
    fps: f32,
    frames_dir: &Path,
    audio: Option<&Path>,
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        frames_dir.join("frame_%05d.png").display().to_string(),
    ];
    if let Some(audio) = audio {
        args.push("-i".into());
        args.push(audio.display().to_string());
    }
    args.extend([
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
    ]);
    if audio.is_some() {
        // Pad the track with silence, then cut to the video length
        args.extend([
            "-c:a".to_string(),
            settings.audio_codec.clone(),
            "-af".to_string(),
            "apad".to_string(),
            "-shortest".to_string(),
        ]);
    }
    args.extend([
        "-preset".to_string(),
        settings.preset.clone(),
        "-crf".to_string(),
        settings.crf.to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Everything the worker needs to run one encode
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    /// ffmpeg executable
    pub ffmpeg: String,
    /// Audio mix step, when there are cues
    pub audio: Option<Vec<String>>,
    /// Video step
    pub video: Vec<String>,
    /// Directory holding the frames
    pub frames_dir: PathBuf,
    /// Mixed audio track
    pub audio_file: Option<PathBuf>,
    /// Finished video
    pub output: PathBuf,
    /// Remove the frames after a successful encode
    pub cleanup_frames: bool,
}

impl EncodeJob {
    /// Plan the ffmpeg steps for a request
    pub fn plan(
        request: &EncodeRequest,
        encoder: &EncoderSettings,
        output: &OutputSettings,
        assets_root: Option<&Path>,
    ) -> Result<Self, ExportError> {
        let first = request
            .frames
            .first()
            .ok_or_else(|| ExportError::Encoder("no frames to encode".into()))?;
        let frames_dir = first
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ExportError::Encoder(format!("frame {:?} has no directory", first)))?;
        let name = frames_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "render".to_string());

        let audio_file = (!request.audio_cues.is_empty()).then(|| {
            let id = Uuid::new_v4().simple().to_string();
            output.audio_dir.join(format!("{}.mp3", &id[..10]))
        });
        let audio = audio_file
            .as_deref()
            .map(|file| audio_mix_args(&request.audio_cues, request.fps, assets_root, file));
        let video_file = output.video_dir.join(format!("{name}.mp4"));
        let video = video_args(encoder, request.fps, &frames_dir, audio_file.as_deref(), &video_file);

        Ok(Self {
            ffmpeg: encoder.ffmpeg.clone(),
            audio,
            video,
            frames_dir,
            audio_file,
            output: video_file,
            cleanup_frames: !output.keep_frames,
        })
    }

    fn run(self, state: &EncodeState) {
        if let Some(parent) = self.output.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                state.fail(format!("failed to create {}: {}", parent.display(), e));
                return;
            }
        }
        if let (Some(args), Some(file)) = (&self.audio, &self.audio_file) {
            state.set_step("Building audio");
            if let Some(parent) = file.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    state.fail(format!("failed to create {}: {}", parent.display(), e));
                    return;
                }
            }
            if let Err(e) = run_ffmpeg(&self.ffmpeg, args) {
                state.fail(e);
                return;
            }
        }

        state.set_step("Encoding video");
        tracing::info!("Executing: {} {}", self.ffmpeg, self.video.join(" "));
        if let Err(e) = run_ffmpeg(&self.ffmpeg, &self.video) {
            state.fail(e);
            return;
        }

        if let Some(file) = &self.audio_file {
            if let Err(e) = std::fs::remove_file(file) {
                tracing::warn!("Failed to remove mixed audio {:?}: {}", file, e);
            }
        }
        if self.cleanup_frames {
            match std::fs::remove_dir_all(&self.frames_dir) {
                Ok(()) => tracing::debug!("Deleted render folder: {:?}", self.frames_dir),
                Err(e) => tracing::warn!("Failed to delete {:?}: {}", self.frames_dir, e),
            }
        }
        state.succeed(self.output);
    }
}

fn run_ffmpeg(ffmpeg: &str, args: &[String]) -> Result<(), String> {
    let status = Command::new(ffmpeg)
        .args(args)
        .status()
        .map_err(|e| format!("failed to start {ffmpeg}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("{ffmpeg} exited with {status}"))
    }
}

/// Encoder handing jobs to ffmpeg on a background thread
pub struct FfmpegEncoder {
    settings: EncoderSettings,
    output: OutputSettings,
    assets_root: Option<PathBuf>,
    state: Arc<EncodeState>,
    worker: Option<JoinHandle<()>>,
}

impl FfmpegEncoder {
    /// Create an encoder
    pub fn new(settings: EncoderSettings, output: OutputSettings, assets_root: Option<PathBuf>) -> Self {
        Self {
            settings,
            output,
            assets_root,
            state: Arc::new(EncodeState::new()),
            worker: None,
        }
    }

    /// Shared progress state
    pub fn state(&self) -> Arc<EncodeState> {
        Arc::clone(&self.state)
    }

    /// Whether an encode is running
    pub fn is_encoding(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&mut self, request: EncodeRequest) -> Result<(), ExportError> {
        if self.is_encoding() {
            return Err(ExportError::Encoder("an encode is already running".into()));
        }
        let job = EncodeJob::plan(&request, &self.settings, &self.output, self.assets_root.as_deref())?;

        let manifest = serde_json::to_string_pretty(&request)
            .map_err(|e| ExportError::Encoder(format!("failed to serialize manifest: {e}")))?;
        std::fs::write(job.frames_dir.join(MANIFEST_FILE_NAME), manifest)
            .map_err(|e| ExportError::Encoder(format!("failed to write manifest: {e}")))?;

        tracing::info!(
            "Converting {} frames to video at {} fps",
            request.frames.len(),
            request.fps
        );
        self.state.reset();
        let state = Arc::clone(&self.state);
        self.worker = Some(std::thread::spawn(move || job.run(&state)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(path: &str, volume: f32, at_frame: u32) -> ExportAudioCue {
        ExportAudioCue {
            path: path.to_string(),
            volume,
            at_frame,
        }
    }

    fn request(frames: Vec<PathBuf>, audio_cues: Vec<ExportAudioCue>) -> EncodeRequest {
        EncodeRequest {
            fps: 60.0,
            width: 1080,
            height: 1920,
            audio_cues,
            frames,
        }
    }

    #[test]
    fn test_cue_delay_floors_milliseconds() {
        assert_eq!(cue_delay_ms(&cue("a.wav", 1.0, 0), 60.0), 0);
        assert_eq!(cue_delay_ms(&cue("a.wav", 1.0, 1), 60.0), 16);
        assert_eq!(cue_delay_ms(&cue("a.wav", 1.0, 90), 60.0), 1500);
        assert_eq!(cue_delay_ms(&cue("a.wav", 1.0, 90), 0.0), 0);
    }

    #[test]
    fn test_audio_mix_args() {
        let cues = vec![cue("/sfx/pop.wav", 0.5, 30), cue("sfx/pop.wav", 1.0, 30)];
        let args = audio_mix_args(&cues, 60.0, Some(Path::new("assets")), Path::new("out.mp3"));

        assert_eq!(&args[..4], ["-hide_banner", "-loglevel", "error", "-y"]);
        assert_eq!(args[4], "-i");
        assert_eq!(PathBuf::from(&args[5]), Path::new("assets").join("sfx/pop.wav"));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert_eq!(
            filter,
            "[0:a]adelay=500|500,volume=0.5[a0]; [1:a]adelay=500|500,volume=1[a1]; \
             [a0][a1]amix=inputs=2:duration=longest:normalize=0[out]"
        );
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
    }

    #[test]
    fn test_video_args_without_audio() {
        let args = video_args(
            &EncoderSettings::default(),
            60.0,
            Path::new("frames"),
            None,
            Path::new("out.mp4"),
        );
        let frames = Path::new("frames").join("frame_%05d.png").display().to_string();
        let expected: Vec<String> = [
            "-y", "-framerate", "60", "-i", frames.as_str(), "-c:v", "libx264", "-pix_fmt", "yuv420p",
            "-preset", "fast", "-crf", "23", "out.mp4",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_video_args_with_audio() {
        let args = video_args(
            &EncoderSettings::default(),
            60.0,
            Path::new("frames"),
            Some(Path::new("mix.mp3")),
            Path::new("out.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-i mix.mp3 -c:v libx264"));
        assert!(joined.contains("-c:a aac -af apad -shortest -preset fast"));
    }

    #[test]
    fn test_plan_names_video_after_render_dir() {
        let frames = vec![
            PathBuf::from("image_renders/render_ab12/frame_00000.png"),
            PathBuf::from("image_renders/render_ab12/frame_00001.png"),
        ];
        let job = EncodeJob::plan(
            &request(frames, vec![cue("pop.wav", 1.0, 0)]),
            &EncoderSettings::default(),
            &OutputSettings::default(),
            None,
        )
        .unwrap();

        assert_eq!(job.frames_dir, PathBuf::from("image_renders/render_ab12"));
        assert_eq!(job.output, Path::new("rendered_videos").join("render_ab12.mp4"));
        assert!(job.audio.is_some());
        assert!(job.audio_file.as_ref().unwrap().starts_with("audio_renders"));
        assert!(job.cleanup_frames);
    }

    #[test]
    fn test_plan_without_cues_skips_audio() {
        let job = EncodeJob::plan(
            &request(vec![PathBuf::from("r/frame_00000.png")], Vec::new()),
            &EncoderSettings::default(),
            &OutputSettings::default(),
            None,
        )
        .unwrap();
        assert!(job.audio.is_none());
        assert!(!job.video.iter().any(|a| a == "-shortest"));
    }

    #[test]
    fn test_plan_rejects_empty_request() {
        let err = EncodeJob::plan(
            &request(Vec::new(), Vec::new()),
            &EncoderSettings::default(),
            &OutputSettings::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Encoder(_)));
    }

    #[test]
    fn test_missing_ffmpeg_reports_failure() {
        let root = std::env::temp_dir().join(format!("tickreel_encode_{}", Uuid::new_v4()));
        let frames_dir = root.join("render_x");
        std::fs::create_dir_all(&frames_dir).unwrap();
        let settings = EncoderSettings {
            ffmpeg: "tickreel-no-such-ffmpeg".into(),
            ..Default::default()
        };
        let output = OutputSettings {
            video_dir: root.join("videos"),
            audio_dir: root.join("audio"),
            ..Default::default()
        };
        let mut encoder = FfmpegEncoder::new(settings, output, None);

        encoder
            .encode(request(vec![frames_dir.join("frame_00000.png")], Vec::new()))
            .unwrap();
        assert!(frames_dir.join(MANIFEST_FILE_NAME).exists());
        let progress = encoder.state().wait(Duration::from_millis(10));
        assert!(progress.complete);
        assert!(progress.error.unwrap().contains("failed to start"));
        assert!(progress.output.is_none());

        std::fs::remove_dir_all(root).unwrap();
    }
}
