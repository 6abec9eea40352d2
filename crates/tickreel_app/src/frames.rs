// SPDX-License-Identifier: MIT OR Apache-2.0
//! PNG image-sequence writer used during export.
//!
//! Frames are copied off the render surface and handed to a worker thread
//! that encodes them. The queue between the two is bounded, so a slow disk
//! stalls the tick loop instead of piling up surface copies. Each export
//! session writes into a fresh `render_<id>` directory under the output
//! root.

use image::RgbaImage;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tickreel_sequencer::{ExportError, FrameWriter};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frames waiting for the worker before `write_frame` blocks
pub const FRAME_QUEUE_DEPTH: usize = 8;

/// File name of output frame `index`
pub fn frame_file_name(index: u32) -> String {
    format!("frame_{index:05}.png")
}

/// A frame queued for encoding
struct FrameJob {
    index: u32,
    path: PathBuf,
    image: RgbaImage,
}

/// One export's worth of frames
struct Session {
    dir: PathBuf,
    sender: mpsc::Sender<FrameJob>,
    worker: JoinHandle<()>,
    paths: Vec<PathBuf>,
}

/// Writes frames as numbered PNG files on a background thread
pub struct PngFrameWriter {
    root: PathBuf,
    session: Option<Session>,
    /// First failure reported by the worker
    failure: Arc<Mutex<Option<ExportError>>>,
}

impl PngFrameWriter {
    /// Writer placing sessions under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            session: None,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    fn start_session(&mut self, index: u32) -> Result<&mut Session, ExportError> {
        if self.session.is_none() {
            let id = Uuid::new_v4().simple().to_string();
            let dir = self.root.join(format!("render_{}", &id[..8]));
            std::fs::create_dir_all(&dir).map_err(|e| ExportError::FrameWrite {
                index,
                reason: format!("failed to create {}: {}", dir.display(), e),
            })?;
            tracing::info!("Writing frames to {:?}", dir);

            *self.failure.lock() = None;
            let (sender, receiver) = mpsc::channel(FRAME_QUEUE_DEPTH);
            let failure = Arc::clone(&self.failure);
            let worker = std::thread::spawn(move || {
                frame_worker(receiver, failure);
            });
            self.session = Some(Session {
                dir,
                sender,
                worker,
                paths: Vec::new(),
            });
        }
        self.session.as_mut().ok_or(ExportError::WriterClosed)
    }
}

/// Background worker that encodes queued frames
fn frame_worker(mut receiver: mpsc::Receiver<FrameJob>, failure: Arc<Mutex<Option<ExportError>>>) {
    while let Some(job) = receiver.blocking_recv() {
        if failure.lock().is_some() {
            // Drain without writing once something failed
            continue;
        }
        if let Err(e) = job.image.save(&job.path) {
            tracing::error!("Failed to write frame {}: {}", job.index, e);
            *failure.lock() = Some(ExportError::FrameWrite {
                index: job.index,
                reason: e.to_string(),
            });
        }
    }
}

impl FrameWriter<RgbaImage> for PngFrameWriter {
    fn write_frame(&mut self, index: u32, surface: &RgbaImage) -> Result<(), ExportError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        let session = self.start_session(index)?;
        let path = session.dir.join(frame_file_name(index));
        session
            .sender
            .blocking_send(FrameJob {
                index,
                path: path.clone(),
                image: surface.clone(),
            })
            .map_err(|_| ExportError::WriterClosed)?;
        session.paths.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, ExportError> {
        let Some(session) = self.session.take() else {
            return Ok(Vec::new());
        };
        let Session {
            dir,
            sender,
            worker,
            paths,
        } = session;
        drop(sender);
        if worker.join().is_err() {
            return Err(ExportError::WriterClosed);
        }
        tracing::debug!("Closed frame session {:?}", dir);
        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }
        tracing::debug!("Frame writer flushed {} frames", paths.len());
        Ok(paths)
    }
}
