// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline scheduler.
//!
//! [`AnimatedScene`] owns the scene graph, camera and renderer, re-runs the
//! build function on every seek, and replays the resulting [`Schedule`]
//! deterministically. Continuous loops (idle controls, playback) are driven
//! by the host through [`AnimatedScene::next_frame_request`] and
//! [`AnimatedScene::on_animation_frame`].

use crate::animation::{Animation, TickContext};
use crate::audio::{AudioMode, CueDispatcher};
use crate::camera::{add_scaled, length, sub, Camera, Projection};
use crate::config::{TimelineConfig, TraceMode};
use crate::error::{BoxError, Result, TimelineError};
use crate::lifecycle::InitialState;
use crate::schedule::{Schedule, TickReport};
use crate::stage::{AudioPlayer, Controls, Encoder, FrameWriter, NodeId, Renderer, SceneGraph};
use crate::time::{FrameRate, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Build function run on every rebuild
pub type BuildFn<G> = Box<dyn FnMut(&mut SceneBuilder<'_, G>) -> Result<(), BoxError>>;

/// Frame observer run after every displayed or exported tick
pub type FrameObserver = Box<dyn FnMut(&FrameInfo)>;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineState {
    /// Never built, or the last build failed
    #[default]
    Unbuilt,
    /// The build function is running
    Building,
    /// Built and idle
    Built,
    /// Replaying ticks during a seek
    Tracing,
    /// Live playback
    Playing,
    /// Offline export
    Rendering,
}

/// What the timeline is doing between seeks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    Idle,
    Playing,
    Rendering,
}

/// Kind of continuous loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// Controls update and redraw
    Idle,
    /// Playback
    Play,
}

/// Cancellable request for the next display frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopHandle {
    generation: u64,
    kind: LoopKind,
}

impl LoopHandle {
    /// Loop this handle belongs to
    pub fn kind(&self) -> LoopKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct FrameLoops {
    generation: u64,
    armed: Option<LoopHandle>,
}

impl FrameLoops {
    fn arm(&mut self, kind: LoopKind) -> LoopHandle {
        self.generation += 1;
        let handle = LoopHandle {
            generation: self.generation,
            kind,
        };
        self.armed = Some(handle);
        handle
    }

    fn cancel(&mut self) {
        self.armed = None;
    }

    fn is_current(&self, handle: LoopHandle) -> bool {
        self.armed == Some(handle)
    }
}

/// Passed to the frame observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Tick just shown or exported
    pub tick: Tick,
    /// Timeline length
    pub total_ticks: Tick,
    /// Lifecycle state
    pub state: TimelineState,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    next: Tick,
    to: Tick,
    calls: u64,
    traced: bool,
}

/// Everything a timeline drives
pub struct Collaborators<G, R: Renderer<G>> {
    /// Scene graph
    pub scene: G,
    /// Camera
    pub camera: Camera,
    /// Renderer
    pub renderer: R,
    /// Audio backend
    pub audio: Box<dyn AudioPlayer>,
    /// Interactive controls
    pub controls: Box<dyn Controls>,
    /// Export frame sink
    pub frames: Box<dyn FrameWriter<R::Surface>>,
    /// Video encoder
    pub encoder: Box<dyn Encoder>,
}

/// Declarative API handed to the build function
pub struct SceneBuilder<'a, G> {
    scene: &'a mut G,
    camera: &'a mut Camera,
    schedule: &'a mut Schedule<G>,
    rng: &'a mut StdRng,
    background_padding: Tick,
}

impl<'a, G> SceneBuilder<'a, G> {
    /// Scene graph
    pub fn scene(&mut self) -> &mut G {
        self.scene
    }

    /// Camera
    pub fn camera(&mut self) -> &mut Camera {
        self.camera
    }

    /// RNG reseeded on every rebuild
    pub fn rng(&mut self) -> &mut StdRng {
        self.rng
    }

    /// Timeline frame rate
    pub fn fps(&self) -> FrameRate {
        self.schedule.fps()
    }

    /// Write cursor
    pub fn calculation_tick(&self) -> Tick {
        self.schedule.calculation_tick()
    }

    /// Run `instruction` when the cursor tick is traced
    pub fn do_at_cursor<F>(&mut self, instruction: F)
    where
        F: FnMut(&mut TickContext<'_, G>) + 'static,
    {
        self.schedule.add_instruction(instruction);
    }

    /// Run `instruction` when `tick` is traced
    pub fn do_at<F>(&mut self, tick: Tick, instruction: F)
    where
        F: FnMut(&mut TickContext<'_, G>) + 'static,
    {
        self.schedule.add_instruction_at(tick, instruction);
    }

    /// Start animations at the cursor and advance it by the longest one
    pub fn add_anim(&mut self, animations: impl IntoIterator<Item = Animation<G>>) -> Tick {
        self.schedule.add_anim(animations)
    }

    /// Start animations at `tick`; the cursor stays put
    pub fn insert_anim_at(&mut self, tick: Tick, animations: impl IntoIterator<Item = Animation<G>>) {
        self.schedule.insert_anim_at(tick, animations);
    }

    /// Chain animations after the cursor plus the configured padding; the
    /// cursor stays put. Returns the tick after the chain.
    pub fn add_sequential_background_anims(
        &mut self,
        animations: impl IntoIterator<Item = Animation<G>>,
    ) -> Tick {
        self.schedule
            .add_sequential_background_anims(self.background_padding, animations)
    }

    /// Run `dependency` on every traced tick
    pub fn on_each_tick<F>(&mut self, dependency: F)
    where
        F: FnMut(&mut TickContext<'_, G>, Tick, f32) + 'static,
    {
        self.schedule.add_dependency(dependency);
    }

    /// Advance the cursor by `duration_ms`
    pub fn add_wait(&mut self, duration_ms: f32) -> Tick {
        self.schedule.add_wait(duration_ms)
    }

    /// Close the timeline at the cursor
    pub fn end(&mut self) -> Result<Tick> {
        self.schedule.end()
    }

    /// Preload an audio asset before tracing
    pub fn register_audio(&mut self, path: impl Into<String>) {
        self.schedule.cues_mut().register(path);
    }

    /// Play an audio asset at the cursor
    pub fn play_audio(&mut self, path: impl Into<String>, volume: f32) {
        let tick = self.schedule.calculation_tick();
        self.schedule.cues_mut().record(path, volume, tick);
    }
}

impl<'a, G: SceneGraph> SceneBuilder<'a, G> {
    /// Add a node to the scene; it is removed again on the next rebuild
    pub fn add(&mut self, node: G::Node) -> NodeId {
        self.scene.insert(node)
    }
}

/// A scene plus its deterministic timeline
pub struct AnimatedScene<G, R>
where
    G: SceneGraph,
    R: Renderer<G>,
{
    pub(crate) config: TimelineConfig,
    pub(crate) fps: FrameRate,
    pub(crate) scene: G,
    pub(crate) camera: Camera,
    pub(crate) renderer: R,
    audio: Box<dyn AudioPlayer>,
    controls: Box<dyn Controls>,
    pub(crate) frames: Box<dyn FrameWriter<R::Surface>>,
    pub(crate) encoder: Box<dyn Encoder>,
    pub(crate) schedule: Schedule<G>,
    pub(crate) cues: CueDispatcher,
    initial: InitialState,
    build: Option<BuildFn<G>>,
    rng: StdRng,
    pub(crate) state: TimelineState,
    pub(crate) activity: Activity,
    pub(crate) render_tick: Tick,
    pub(crate) container: (u32, u32),
    loops: FrameLoops,
    playback: Option<Playback>,
    observer: Option<FrameObserver>,
    idle_frames: u64,
}

impl<G, R> AnimatedScene<G, R>
where
    G: SceneGraph,
    R: Renderer<G>,
{
    /// Create a timeline and arm the idle loop. The initial state of the
    /// collaborators is captured here.
    pub fn new<F>(config: TimelineConfig, collaborators: Collaborators<G, R>, build: F) -> Result<Self>
    where
        F: FnMut(&mut SceneBuilder<'_, G>) -> Result<(), BoxError> + 'static,
    {
        config.validate()?;
        let Collaborators {
            scene,
            camera,
            renderer,
            audio,
            controls,
            frames,
            encoder,
        } = collaborators;

        let initial = InitialState::capture(&scene, &camera, &renderer);
        let container = renderer.size();
        let fps = config.frame_rate();
        let rng = StdRng::seed_from_u64(config.noise_seed);

        let mut timeline = Self {
            schedule: Schedule::new(fps),
            config,
            fps,
            scene,
            camera,
            renderer,
            audio,
            controls,
            frames,
            encoder,
            cues: CueDispatcher::new(),
            initial,
            build: Some(Box::new(build)),
            rng,
            state: TimelineState::Unbuilt,
            activity: Activity::Idle,
            render_tick: 0,
            container,
            loops: FrameLoops::default(),
            playback: None,
            observer: None,
            idle_frames: 0,
        };
        timeline.start_controls();
        Ok(timeline)
    }

    /// Configuration
    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> TimelineState {
        self.state
    }

    /// Tick currently displayed
    pub fn render_tick(&self) -> Tick {
        self.render_tick
    }

    /// Timeline length, zero before the first build
    pub fn total_ticks(&self) -> Tick {
        self.schedule.total_ticks().unwrap_or(0)
    }

    /// Scene graph
    pub fn scene(&self) -> &G {
        &self.scene
    }

    /// Camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Renderer
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Current schedule
    pub fn schedule(&self) -> &Schedule<G> {
        &self.schedule
    }

    /// Current audio mode
    pub fn audio_mode(&self) -> AudioMode {
        self.cues.mode()
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.activity == Activity::Playing
    }

    /// Size the renderer returns to outside of exports
    pub fn container_size(&self) -> (u32, u32) {
        self.container
    }

    /// Call `observer` after every displayed or exported tick
    pub fn set_frame_observer(&mut self, observer: impl FnMut(&FrameInfo) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Handle the host should pass to `on_animation_frame` on the next
    /// display refresh, if a loop is armed
    pub fn next_frame_request(&self) -> Option<LoopHandle> {
        self.loops.armed
    }

    /// Rebuild and show `index`. Out-of-range indices wrap to 0. Returns
    /// the tick actually shown.
    pub fn jump_to_frame(&mut self, index: Tick, keep_size: bool) -> Result<Tick> {
        self.reset(keep_size);
        let previous = self.cues.mode();
        let traced = self.rebuild_and_trace(index);
        self.cues.set_mode(previous);

        let tick = match traced {
            Ok(tick) => tick,
            Err(err) => {
                self.state = TimelineState::Unbuilt;
                return Err(err);
            }
        };
        self.renderer.render_frame(&self.scene, &self.camera);
        self.render_tick = tick;
        // A seek during playback continues from the tick just shown
        if let Some(playback) = self.playback.as_mut() {
            playback.next = tick.saturating_add(1);
            playback.traced = false;
        }
        self.state = self.resting_state();
        self.notify_observer();
        Ok(tick)
    }

    /// Play the whole timeline, looping
    pub fn play(&mut self) -> Result<()> {
        self.play_range(0, Tick::MAX)
    }

    /// Play ticks `from..=to`, looping back to tick 0 after `to`
    pub fn play_range(&mut self, from: Tick, to: Tick) -> Result<()> {
        self.stop_controls();
        self.activity = Activity::Playing;
        let start = match self.jump_to_frame(from, false) {
            Ok(tick) => tick,
            Err(err) => {
                self.activity = Activity::Idle;
                self.start_controls();
                return Err(err);
            }
        };
        let to = to.min(self.total_ticks().saturating_sub(1));
        self.trace_tick(start, true, true);
        self.playback = Some(Playback {
            next: start,
            to,
            calls: 0,
            traced: true,
        });
        self.loops.arm(LoopKind::Play);
        tracing::info!("Playing ticks {}..={}", start, to);
        Ok(())
    }

    /// Stop playback and hand the camera back to the controls
    pub fn pause(&mut self) {
        if self.activity != Activity::Playing {
            return;
        }
        self.playback = None;
        self.loops.cancel();
        self.activity = Activity::Idle;
        self.state = self.resting_state();
        self.sync_controls_with_camera();
        self.start_controls();
        tracing::info!("Paused at tick {}", self.render_tick);
    }

    /// Run one step of the loop `handle` belongs to. Stale or cancelled
    /// handles are ignored and return `false`.
    pub fn on_animation_frame(&mut self, handle: LoopHandle) -> Result<bool> {
        if !self.loops.is_current(handle) {
            tracing::trace!("Ignoring stale frame request {:?}", handle);
            return Ok(false);
        }
        match handle.kind {
            LoopKind::Idle => self.idle_step(),
            LoopKind::Play => self.play_step()?,
        }
        Ok(true)
    }

    /// Track a new container size
    pub fn resize_container(&mut self, width: u32, height: u32) {
        self.container = (width, height);
        let aspect = self.config.aspect();
        match &mut self.camera.projection {
            Projection::Perspective { aspect: current, .. } => *current = aspect,
            Projection::Orthographic(bounds) => {
                bounds.left = -self.config.zoom * aspect;
                bounds.right = self.config.zoom * aspect;
            }
        }
        if self.activity == Activity::Rendering {
            return;
        }
        self.renderer.resize(width, height);
        self.renderer.render_frame(&self.scene, &self.camera);
    }

    /// Cancel every loop and disable the controls
    pub fn destroy(&mut self) {
        self.playback = None;
        self.activity = Activity::Idle;
        self.stop_controls();
        tracing::debug!("Timeline destroyed");
    }

    fn resting_state(&self) -> TimelineState {
        match self.activity {
            Activity::Idle => TimelineState::Built,
            Activity::Playing => TimelineState::Playing,
            Activity::Rendering => TimelineState::Rendering,
        }
    }

    fn reset(&mut self, keep_size: bool) {
        let removed = self.initial.reset_scene(&mut self.scene);
        self.initial.restore_camera(&mut self.camera);
        let size = (!keep_size).then_some(self.container);
        self.initial.restore_renderer::<G, R>(&mut self.renderer, size);
        self.schedule.clear();
        self.rng = StdRng::seed_from_u64(self.config.noise_seed);
        tracing::trace!("Reset timeline, removed {} nodes", removed);
    }

    fn build_timeline(&mut self) -> Result<()> {
        let Some(mut build) = self.build.take() else {
            return Err(TimelineError::NotBuilt);
        };
        self.state = TimelineState::Building;
        self.cues.set_mode(AudioMode::Building);

        let background_padding = self.fps.millis_to_ticks(self.config.background_padding_ms);
        let mut builder = SceneBuilder {
            scene: &mut self.scene,
            camera: &mut self.camera,
            schedule: &mut self.schedule,
            rng: &mut self.rng,
            background_padding,
        };
        let built = build(&mut builder);
        self.build = Some(build);

        built.map_err(TimelineError::Build)?;
        if self.schedule.total_ticks().is_none() {
            return Err(TimelineError::NotEnded);
        }
        self.preload_audio();
        self.state = TimelineState::Built;
        Ok(())
    }

    fn preload_audio(&mut self) {
        for path in self.schedule.cues().registered() {
            if self.audio.is_loaded(path) {
                continue;
            }
            if let Err(err) = self.audio.load(path) {
                tracing::warn!("Failed to preload audio: {}", err);
            }
        }
    }

    fn rebuild_and_trace(&mut self, index: Tick) -> Result<Tick> {
        self.build_timeline()?;
        let total = self.total_ticks();
        let target = if index > total.saturating_sub(1) { 0 } else { index };

        self.state = TimelineState::Tracing;
        self.cues.set_mode(AudioMode::Muted);
        match self.config.trace_mode {
            TraceMode::FromStart => {
                for tick in 0..=target {
                    self.trace_tick(tick, true, false);
                }
            }
            TraceMode::TargetOnly => {
                self.schedule
                    .run_instructions_before(target, &mut self.scene, &mut self.camera);
                self.trace_tick(target, true, false);
            }
        }
        tracing::debug!("Traced to tick {} of {}", target, total);
        Ok(target)
    }

    /// Fire audio for `tick` when `with_audio`, then run its callbacks
    /// unless `audio_only`
    pub(crate) fn trace_tick(&mut self, tick: Tick, with_audio: bool, audio_only: bool) -> TickReport {
        if with_audio {
            let sheet = self.schedule.cues();
            self.cues.fire(sheet.cues_at(tick), sheet, self.audio.as_mut());
        }
        if audio_only {
            return TickReport::default();
        }
        self.schedule.trace_tick(tick, &mut self.scene, &mut self.camera)
    }

    pub(crate) fn notify_observer(&mut self) {
        let info = FrameInfo {
            tick: self.render_tick,
            total_ticks: self.total_ticks(),
            state: self.state,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer(&info);
        }
    }

    pub(crate) fn start_controls(&mut self) {
        self.controls.set_enabled(true);
        self.idle_frames = 0;
        self.loops.arm(LoopKind::Idle);
    }

    pub(crate) fn stop_controls(&mut self) {
        self.controls.set_enabled(false);
        self.loops.cancel();
    }

    fn sync_controls_with_camera(&mut self) {
        let forward = self.camera.forward();
        let distance = length(sub(self.controls.target(), self.camera.position));
        let target = add_scaled(self.camera.position, forward, distance);
        self.controls.set_target(target);
        self.controls.update(&mut self.camera);
    }

    fn idle_step(&mut self) {
        self.controls.update(&mut self.camera);
        self.renderer.render_frame(&self.scene, &self.camera);
        self.idle_frames += 1;
        if self.idle_frames % 10 == 0 {
            tracing::trace!(
                "Camera at {:?} rotation {:?}",
                self.camera.position,
                self.camera.rotation
            );
        }
        self.loops.arm(LoopKind::Idle);
    }

    fn play_step(&mut self) -> Result<()> {
        let Some(mut playback) = self.playback.take() else {
            return Ok(());
        };

        if playback.next <= playback.to {
            if playback.calls % u64::from(self.config.fps_throttle) == 0 {
                let tick = playback.next;
                self.render_tick = tick;
                if !playback.traced {
                    self.trace_tick(tick, true, false);
                }
                self.renderer.render_frame(&self.scene, &self.camera);
                self.notify_observer();
                playback.next += 1;
                playback.traced = false;
            }
            playback.calls += 1;
        } else {
            let start = match self.jump_to_frame(0, false) {
                Ok(tick) => tick,
                Err(err) => {
                    self.activity = Activity::Idle;
                    self.start_controls();
                    return Err(err);
                }
            };
            self.trace_tick(start, true, true);
            playback.next = start;
            playback.traced = true;
        }

        self.playback = Some(playback);
        self.loops.arm(LoopKind::Play);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{ease_constant, ease_linear, Interpolation};
    use crate::test_support::{timeline, TestScene, TestTimeline};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn config() -> TimelineConfig {
        TimelineConfig {
            width: 200,
            height: 100,
            ..Default::default()
        }
    }

    fn record(name: &'static str) -> impl FnMut(&mut TickContext<'_, TestScene>, f32, Tick, bool) {
        move |ctx, _, tick, is_last| {
            let suffix = if is_last { "!" } else { "" };
            ctx.scene.log.push(format!("{name}@{tick}{suffix}"));
        }
    }

    /// Pump the armed loop `frames` times
    fn pump(timeline: &mut TestTimeline, frames: usize) {
        for _ in 0..frames {
            let handle = timeline.next_frame_request().unwrap();
            assert!(timeline.on_animation_frame(handle).unwrap());
        }
    }

    #[test]
    fn test_one_second_constant_end_to_end() {
        let deps = Rc::new(RefCell::new(0u32));
        let dep_count = Rc::clone(&deps);
        let (mut timeline, _) = timeline(config(), move |scene| {
            let fps = scene.fps();
            scene.add_anim([Animation::new(ease_constant(1.0, 1000.0, fps), record("c"))]);
            let dep_count = Rc::clone(&dep_count);
            scene.on_each_tick(move |_, _, _| *dep_count.borrow_mut() += 1);
            scene.end()?;
            Ok(())
        });

        assert_eq!(timeline.jump_to_frame(120, false).unwrap(), 120);
        assert_eq!(timeline.total_ticks(), 121);
        let log = &timeline.scene().log;
        assert_eq!(log.len(), 120);
        assert_eq!(log.last().map(String::as_str), Some("c@119!"));
        assert_eq!(log.iter().filter(|entry| entry.ends_with('!')).count(), 1);
        assert_eq!(*deps.borrow(), 121);
    }

    #[test]
    fn test_jump_is_deterministic() {
        let (mut timeline, _) = timeline(config(), |scene| {
            let fps = scene.fps();
            let noisy = Animation::<TestScene>::new(ease_linear(0.0, 10.0, 500.0, fps), |ctx, value, _, _| {
                ctx.scene.values.push(value);
            })
            .add_noise(0.5, scene.rng());
            scene.add(String::from("ball"));
            scene.add_anim([noisy]);
            scene.end()?;
            Ok(())
        });

        timeline.jump_to_frame(40, false).unwrap();
        let first = timeline.scene().values.clone();
        let nodes = timeline.scene().nodes.len();
        timeline.jump_to_frame(40, false).unwrap();
        // values accumulate across jumps; the second run appends an identical trace
        let values = &timeline.scene().values;
        assert_eq!(values.len(), first.len() * 2);
        assert_eq!(&values[first.len()..], first.as_slice());
        assert_eq!(timeline.scene().nodes.len(), nodes);
        assert_eq!(timeline.scene().disposed, 1);
    }

    #[test]
    fn test_out_of_range_wraps_to_zero() {
        let (mut timeline, _) = timeline(config(), |scene| {
            scene.add_wait(100.0);
            scene.end()?;
            Ok(())
        });
        timeline.jump_to_frame(3, false).unwrap();
        let total = timeline.total_ticks();
        assert_eq!(timeline.jump_to_frame(total + 5, false).unwrap(), 0);
        assert_eq!(timeline.render_tick(), 0);
        assert_eq!(timeline.jump_to_frame(total - 1, false).unwrap(), total - 1);
    }

    #[test]
    fn test_missing_end_fails_fast() {
        let (mut timeline, _) = timeline(config(), |scene| {
            scene.add_wait(100.0);
            Ok(())
        });
        assert!(matches!(timeline.jump_to_frame(0, false), Err(TimelineError::NotEnded)));
        assert_eq!(timeline.state(), TimelineState::Unbuilt);
    }

    #[test]
    fn test_build_error_propagates() {
        let (mut timeline, _) = timeline(config(), |_| Err("no assets".into()));
        let err = timeline.jump_to_frame(0, false).unwrap_err();
        assert!(matches!(err, TimelineError::Build(_)));
        assert!(err.to_string().contains("no assets"));
    }

    #[test]
    fn test_audio_muted_while_seeking_then_fires_on_play() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.register_audio("pop.wav");
            scene.play_audio("pop.wav", 0.8);
            scene.add_wait(50.0);
            scene.play_audio("pop.wav", 0.4);
            scene.add_wait(50.0);
            scene.end()?;
            Ok(())
        });

        timeline.jump_to_frame(10, false).unwrap();
        assert!(recorder.borrow().played.is_empty());
        assert_eq!(recorder.borrow().loaded, vec!["pop.wav".to_string()]);
        assert_eq!(timeline.audio_mode(), AudioMode::Live);

        timeline.play().unwrap();
        // tick 0 cue fires when playback starts
        assert_eq!(recorder.borrow().played, vec![("pop.wav".to_string(), 0.8)]);
        pump(&mut timeline, 7);
        assert_eq!(recorder.borrow().played.len(), 2);
        assert_eq!(recorder.borrow().played[1], ("pop.wav".to_string(), 0.4));
    }

    #[test]
    fn test_unregistered_cue_is_skipped() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.play_audio("ghost.wav", 1.0);
            scene.add_wait(20.0);
            scene.end()?;
            Ok(())
        });
        timeline.play().unwrap();
        pump(&mut timeline, 3);
        assert!(recorder.borrow().played.is_empty());
    }

    #[test]
    fn test_failed_preload_is_swallowed() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.register_audio("missing.wav");
            scene.end()?;
            Ok(())
        });
        assert!(timeline.jump_to_frame(0, false).is_ok());
        assert!(recorder.borrow().loaded.is_empty());
    }

    #[test]
    fn test_target_only_skips_intermediate_dependencies() {
        let deps = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&deps);
        let mut config = config();
        config.trace_mode = TraceMode::TargetOnly;
        let (mut timeline, _) = timeline(config, move |scene| {
            scene.do_at(0, |ctx| ctx.scene.log.push("setup".into()));
            scene.do_at(30, |ctx| ctx.scene.log.push("midway".into()));
            scene.do_at(90, |ctx| ctx.scene.log.push("late".into()));
            let seen = Rc::clone(&seen);
            scene.on_each_tick(move |_, tick, _| seen.borrow_mut().push(tick));
            scene.add_wait(1000.0);
            scene.end()?;
            Ok(())
        });

        timeline.jump_to_frame(60, false).unwrap();
        assert_eq!(timeline.scene().log, vec!["setup", "midway"]);
        assert_eq!(*deps.borrow(), vec![60]);
    }

    #[test]
    fn test_background_chain_runs_without_extending_timeline() {
        let (mut timeline, _) = timeline(config(), |scene| {
            let samples = Interpolation::from_samples(vec![0.0; 3]);
            scene.add_sequential_background_anims([
                Animation::new(samples.clone(), record("a")),
                Animation::new(samples, record("b")),
            ]);
            scene.add_wait(50.0);
            scene.end()?;
            Ok(())
        });
        timeline.jump_to_frame(6, false).unwrap();
        assert_eq!(timeline.total_ticks(), 7);
        assert_eq!(
            timeline.scene().log,
            vec!["a@0", "a@1", "a@2!", "b@3", "b@4", "b@5!"]
        );
    }

    #[test]
    fn test_play_loops_back_to_start() {
        let (mut timeline, _) = timeline(config(), |scene| {
            scene.add_anim([Animation::new(Interpolation::from_samples(vec![0.0; 3]), record("x"))]);
            scene.end()?;
            Ok(())
        });
        timeline.play().unwrap();
        assert_eq!(timeline.state(), TimelineState::Playing);
        // ticks 0..=3 shown, then the overrun step rebuilds at 0
        pump(&mut timeline, 5);
        assert_eq!(timeline.render_tick(), 0);
        assert!(timeline.is_playing());
        pump(&mut timeline, 2);
        assert_eq!(timeline.render_tick(), 1);
    }

    #[test]
    fn test_seek_while_playing_resumes_after_target() {
        let (mut timeline, _) = timeline(config(), |scene| {
            scene.add_wait(1000.0);
            scene.on_each_tick(|ctx, tick, _| ctx.scene.log.push(tick.to_string()));
            scene.end()?;
            Ok(())
        });
        timeline.play().unwrap();
        pump(&mut timeline, 50);
        assert_eq!(timeline.render_tick(), 49);

        assert_eq!(timeline.jump_to_frame(10, false).unwrap(), 10);
        assert!(timeline.is_playing());
        pump(&mut timeline, 1);
        assert_eq!(timeline.render_tick(), 11);

        // the first pass reached 49, the seek replayed 0..=10, then 11
        let log = &timeline.scene().log;
        let expected: Vec<String> = (0..=11).map(|t| t.to_string()).collect();
        assert_eq!(log[log.len() - 12..], expected[..]);
        assert_eq!(log[log.len() - 13], "49");
    }

    #[test]
    fn test_throttle_holds_frames() {
        let mut config = config();
        config.fps_throttle = 2;
        let (mut timeline, _) = timeline(config, |scene| {
            scene.add_wait(100.0);
            scene.end()?;
            Ok(())
        });
        timeline.play().unwrap();
        pump(&mut timeline, 4);
        assert_eq!(timeline.render_tick(), 1);
    }

    #[test]
    fn test_stale_handles_are_ignored() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.add_wait(100.0);
            scene.end()?;
            Ok(())
        });
        let idle = timeline.next_frame_request().unwrap();
        assert_eq!(idle.kind(), LoopKind::Idle);
        assert!(recorder.borrow().controls_enabled);

        timeline.play().unwrap();
        assert!(!recorder.borrow().controls_enabled);
        assert!(!timeline.on_animation_frame(idle).unwrap());

        let play = timeline.next_frame_request().unwrap();
        assert_eq!(play.kind(), LoopKind::Play);
        timeline.pause();
        assert!(!timeline.on_animation_frame(play).unwrap());
        assert_eq!(timeline.next_frame_request().map(|h| h.kind()), Some(LoopKind::Idle));

        timeline.destroy();
        assert!(timeline.next_frame_request().is_none());
    }

    #[test]
    fn test_pause_resyncs_controls_target() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.do_at(2, |ctx| ctx.camera.position = [10.0, 0.0, 30.0]);
            scene.add_wait(100.0);
            scene.end()?;
            Ok(())
        });
        timeline.play().unwrap();
        pump(&mut timeline, 4);
        timeline.pause();

        // distance to the old target is kept along the new view direction
        let target = recorder.borrow().target;
        let distance = 1000f32.sqrt();
        assert!((target[0] - 10.0).abs() < 1e-3);
        assert!(target[1].abs() < 1e-3);
        assert!((target[2] - (30.0 - distance)).abs() < 1e-3);
        assert!(recorder.borrow().controls_enabled);
        assert_eq!(timeline.state(), TimelineState::Built);
    }

    #[test]
    fn test_observer_sees_every_played_tick() {
        let (mut timeline, _) = timeline(config(), |scene| {
            scene.add_wait(20.0);
            scene.end()?;
            Ok(())
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        timeline.set_frame_observer(move |info| sink.borrow_mut().push(info.tick));
        timeline.play().unwrap();
        pump(&mut timeline, 3);
        assert_eq!(*seen.borrow(), vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_idle_loop_updates_controls_and_renders() {
        let (mut timeline, recorder) = timeline(config(), |scene| {
            scene.end()?;
            Ok(())
        });
        let renders = timeline.renderer().renders;
        pump(&mut timeline, 3);
        assert_eq!(recorder.borrow().controls_updates, 3);
        assert_eq!(timeline.renderer().renders, renders + 3);
    }

    #[test]
    fn test_resize_container_keeps_export_aspect() {
        let mut config = config();
        config.three_dim = false;
        config.zoom = 10.0;
        let (mut timeline, _) = timeline(config, |scene| {
            scene.end()?;
            Ok(())
        });
        timeline.resize_container(800, 800);
        assert_eq!(timeline.renderer().size, (800, 800));
        let bounds = timeline.camera().ortho_bounds().unwrap();
        assert_eq!(bounds.right, 20.0);

        timeline.jump_to_frame(0, false).unwrap();
        assert_eq!(timeline.renderer().size, (800, 800));
    }
}
