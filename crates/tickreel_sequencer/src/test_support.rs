// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory collaborators shared by the timeline and export tests.

use crate::camera::Camera;
use crate::config::TimelineConfig;
use crate::error::{AudioError, BoxError, ExportError};
use crate::export::EncodeRequest;
use crate::stage::{AudioPlayer, Controls, Encoder, FrameWriter, NodeId, Renderer, Rgb, SceneGraph};
use crate::timeline::{AnimatedScene, Collaborators, SceneBuilder};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Scene graph that also records what callbacks did
#[derive(Debug, Default)]
pub(crate) struct TestScene {
    pub nodes: Vec<(NodeId, String)>,
    pub log: Vec<String>,
    pub values: Vec<f32>,
    pub disposed: usize,
}

impl SceneGraph for TestScene {
    type Node = String;

    fn insert(&mut self, node: String) -> NodeId {
        let id = NodeId::new();
        self.nodes.push((id, node));
        id
    }

    fn remove(&mut self, id: NodeId) -> Option<String> {
        let index = self.nodes.iter().position(|(n, _)| *n == id)?;
        Some(self.nodes.remove(index).1)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|(id, _)| *id).collect()
    }

    fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|(n, _)| *n == id)
    }

    fn dispose(&mut self, _node: String) {
        self.disposed += 1;
    }
}

/// Renderer whose surface is the number of frames rendered so far
#[derive(Debug)]
pub(crate) struct TestRenderer {
    pub size: (u32, u32),
    pub clear: Rgb,
    pub alpha: f32,
    pub shadows: bool,
    pub renders: u32,
}

impl Renderer<TestScene> for TestRenderer {
    type Surface = u32;

    fn render_frame(&mut self, _scene: &TestScene, _camera: &Camera) {
        self.renders += 1;
    }

    fn surface(&self) -> &u32 {
        &self.renders
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_clear_color(&mut self, color: Rgb, alpha: f32) {
        self.clear = color;
        self.alpha = alpha;
    }

    fn clear_color(&self) -> Rgb {
        self.clear
    }

    fn clear_alpha(&self) -> f32 {
        self.alpha
    }

    fn shadows_enabled(&self) -> bool {
        self.shadows
    }

    fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows = enabled;
    }
}

/// Everything the boxed collaborators observed
#[derive(Debug, Default)]
pub(crate) struct RecorderState {
    pub loaded: Vec<String>,
    pub played: Vec<(String, f32)>,
    pub written: Vec<u32>,
    pub finished: usize,
    pub encoded: Vec<EncodeRequest>,
    pub fail_write_at: Option<u32>,
    pub controls_enabled: bool,
    pub controls_updates: usize,
    pub target: [f32; 3],
}

pub(crate) type Recorder = Rc<RefCell<RecorderState>>;

struct TestAudio(Recorder);

impl AudioPlayer for TestAudio {
    fn load(&mut self, path: &str) -> Result<(), AudioError> {
        if path.starts_with("missing") {
            return Err(AudioError::NotFound(path.to_string()));
        }
        self.0.borrow_mut().loaded.push(path.to_string());
        Ok(())
    }

    fn is_loaded(&self, path: &str) -> bool {
        self.0.borrow().loaded.iter().any(|p| p == path)
    }

    fn play(&mut self, path: &str, volume: f32) {
        self.0.borrow_mut().played.push((path.to_string(), volume));
    }
}

struct TestControls(Recorder);

impl Controls for TestControls {
    fn update(&mut self, _camera: &mut Camera) {
        self.0.borrow_mut().controls_updates += 1;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().controls_enabled = enabled;
    }

    fn enabled(&self) -> bool {
        self.0.borrow().controls_enabled
    }

    fn target(&self) -> [f32; 3] {
        self.0.borrow().target
    }

    fn set_target(&mut self, target: [f32; 3]) {
        self.0.borrow_mut().target = target;
    }
}

struct TestFrames(Recorder);

impl FrameWriter<u32> for TestFrames {
    fn write_frame(&mut self, index: u32, _surface: &u32) -> Result<(), ExportError> {
        let mut recorder = self.0.borrow_mut();
        if recorder.fail_write_at == Some(index) {
            return Err(ExportError::FrameWrite {
                index,
                reason: "disk full".into(),
            });
        }
        recorder.written.push(index);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, ExportError> {
        let mut recorder = self.0.borrow_mut();
        recorder.finished += 1;
        Ok(recorder
            .written
            .iter()
            .map(|i| PathBuf::from(format!("frame_{i:05}.png")))
            .collect())
    }
}

struct TestEncoder(Recorder);

impl Encoder for TestEncoder {
    fn encode(&mut self, request: EncodeRequest) -> Result<(), ExportError> {
        self.0.borrow_mut().encoded.push(request);
        Ok(())
    }
}

pub(crate) type TestTimeline = AnimatedScene<TestScene, TestRenderer>;

/// Timeline over fresh test collaborators, with one pre-existing node
pub(crate) fn timeline<F>(config: TimelineConfig, build: F) -> (TestTimeline, Recorder)
where
    F: FnMut(&mut SceneBuilder<'_, TestScene>) -> Result<(), BoxError> + 'static,
{
    let recorder = Recorder::default();
    let mut scene = TestScene::default();
    scene.insert("floor".into());
    let collaborators = Collaborators {
        scene,
        camera: Camera::for_config(&config),
        renderer: TestRenderer {
            size: (400, 300),
            clear: [0.0; 3],
            alpha: 1.0,
            shadows: false,
            renders: 0,
        },
        audio: Box::new(TestAudio(Rc::clone(&recorder))),
        controls: Box::new(TestControls(Rc::clone(&recorder))),
        frames: Box::new(TestFrames(Rc::clone(&recorder))),
        encoder: Box::new(TestEncoder(Rc::clone(&recorder))),
    };
    let timeline = AnimatedScene::new(config, collaborators, build).unwrap();
    (timeline, recorder)
}
