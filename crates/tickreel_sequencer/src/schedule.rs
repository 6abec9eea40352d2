// SPDX-License-Identifier: MIT OR Apache-2.0
//! Instruction, animation and dependency registry.
//!
//! The schedule is filled by the build function and replayed tick by tick.
//! Every trace of a tick runs three phases in a fixed order:
//!
//! 1. instructions registered at that tick, in registration order
//! 2. every animation whose range covers the tick
//! 3. every dependency, in registration order
//!
//! Animations inserted through [`TickContext::insert_anim_at`] are merged
//! after each phase.

use crate::animation::{Animation, ScheduledAnimation, TickContext};
use crate::audio::CueSheet;
use crate::camera::Camera;
use crate::error::TimelineError;
use crate::interpolation::ease_constant;
use crate::time::{FrameRate, Tick};
use std::collections::BTreeMap;
use std::fmt;

/// One-shot callback run when its tick is traced
pub type Instruction<G> = Box<dyn FnMut(&mut TickContext<'_, G>)>;

/// Callback run on every traced tick with `(tick, elapsed_millis)`
pub type Dependency<G> = Box<dyn FnMut(&mut TickContext<'_, G>, Tick, f32)>;

/// Callbacks run while tracing one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instructions run
    pub instructions: usize,
    /// Animation updaters run
    pub animations: usize,
    /// Dependencies run
    pub dependencies: usize,
}

/// Everything the build function registered
pub struct Schedule<G> {
    fps: FrameRate,
    calculation_tick: Tick,
    total_ticks: Option<Tick>,
    instructions: BTreeMap<Tick, Vec<Instruction<G>>>,
    animations: Vec<ScheduledAnimation<G>>,
    dependencies: Vec<Dependency<G>>,
    cues: CueSheet,
}

impl<G> fmt::Debug for Schedule<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("calculation_tick", &self.calculation_tick)
            .field("total_ticks", &self.total_ticks)
            .field("instructions", &self.instruction_count())
            .field("animations", &self.animations.len())
            .field("dependencies", &self.dependencies.len())
            .field("cues", &self.cues.len())
            .finish()
    }
}

impl<G> Schedule<G> {
    /// Create an empty schedule
    pub fn new(fps: FrameRate) -> Self {
        Self {
            fps,
            calculation_tick: 0,
            total_ticks: None,
            instructions: BTreeMap::new(),
            animations: Vec::new(),
            dependencies: Vec::new(),
            cues: CueSheet::new(),
        }
    }

    /// Frame rate
    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    /// Drop everything and rewind the cursor
    pub fn clear(&mut self) {
        self.calculation_tick = 0;
        self.total_ticks = None;
        self.instructions.clear();
        self.animations.clear();
        self.dependencies.clear();
        self.cues.clear();
    }

    /// Write cursor
    pub fn calculation_tick(&self) -> Tick {
        self.calculation_tick
    }

    /// Total ticks, once `end()` was called
    pub fn total_ticks(&self) -> Option<Tick> {
        self.total_ticks
    }

    /// Audio cues and registered assets
    pub fn cues(&self) -> &CueSheet {
        &self.cues
    }

    /// Mutable audio cues
    pub fn cues_mut(&mut self) -> &mut CueSheet {
        &mut self.cues
    }

    /// Scheduled animations, in insertion order
    pub fn animations(&self) -> &[ScheduledAnimation<G>] {
        &self.animations
    }

    /// Number of registered instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.values().map(Vec::len).sum()
    }

    /// Number of registered dependencies
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Register an instruction at `tick`
    pub fn add_instruction_at<F>(&mut self, tick: Tick, instruction: F)
    where
        F: FnMut(&mut TickContext<'_, G>) + 'static,
    {
        self.instructions
            .entry(tick)
            .or_default()
            .push(Box::new(instruction));
    }

    /// Register an instruction at the cursor
    pub fn add_instruction<F>(&mut self, instruction: F)
    where
        F: FnMut(&mut TickContext<'_, G>) + 'static,
    {
        self.add_instruction_at(self.calculation_tick, instruction);
    }

    /// Register a per-tick dependency
    pub fn add_dependency<F>(&mut self, dependency: F)
    where
        F: FnMut(&mut TickContext<'_, G>, Tick, f32) + 'static,
    {
        self.dependencies.push(Box::new(dependency));
    }

    /// Pin one animation at `start`; returns its length
    fn push_animation(&mut self, start: Tick, animation: Animation<G>) -> Tick {
        let len = animation.len() as Tick;
        match ScheduledAnimation::new(start, animation) {
            Some(scheduled) => self.animations.push(scheduled),
            None => tracing::trace!("Skipping empty animation at tick {}", start),
        }
        len
    }

    /// Schedule animations at the cursor and advance it by the longest one
    pub fn add_anim(&mut self, animations: impl IntoIterator<Item = Animation<G>>) -> Tick {
        let start = self.calculation_tick;
        let longest = animations
            .into_iter()
            .map(|animation| self.push_animation(start, animation))
            .max()
            .unwrap_or(0);
        self.calculation_tick += longest;
        longest
    }

    /// Schedule animations at an explicit tick without moving the cursor
    pub fn insert_anim_at(&mut self, tick: Tick, animations: impl IntoIterator<Item = Animation<G>>) {
        for animation in animations {
            self.push_animation(tick, animation);
        }
    }

    /// Chain animations back to back from `cursor + padding` without moving
    /// the cursor. Returns the tick after the chain.
    pub fn add_sequential_background_anims(
        &mut self,
        padding: Tick,
        animations: impl IntoIterator<Item = Animation<G>>,
    ) -> Tick {
        let mut start = self.calculation_tick + padding;
        for animation in animations {
            start += self.push_animation(start, animation);
        }
        start
    }

    /// Hold the cursor still for `duration_ms`
    pub fn add_wait(&mut self, duration_ms: f32) -> Tick {
        let wait = Animation::idle(ease_constant(0.0, duration_ms, self.fps));
        self.add_anim([wait])
    }

    /// Freeze the timeline length at `cursor + 1`
    pub fn end(&mut self) -> Result<Tick, TimelineError> {
        if let Some(total) = self.total_ticks {
            return Err(TimelineError::AlreadyEnded(total));
        }
        let total = self.calculation_tick + 1;
        self.total_ticks = Some(total);
        Ok(total)
    }

    fn merge_inserted(&mut self, inserted: &mut Vec<(Tick, Animation<G>)>) {
        for (tick, animation) in inserted.drain(..) {
            self.push_animation(tick, animation);
        }
    }

    /// Run the three phases for `tick`
    pub fn trace_tick(&mut self, tick: Tick, scene: &mut G, camera: &mut Camera) -> TickReport {
        let mut report = TickReport::default();
        let mut inserted = Vec::new();

        if let Some(instructions) = self.instructions.get_mut(&tick) {
            let mut ctx = TickContext::new(&mut *scene, &mut *camera, tick, self.fps, &mut inserted);
            for instruction in instructions.iter_mut() {
                instruction(&mut ctx);
                report.instructions += 1;
            }
        }
        self.merge_inserted(&mut inserted);

        {
            let mut ctx = TickContext::new(&mut *scene, &mut *camera, tick, self.fps, &mut inserted);
            for animation in &self.animations {
                if animation.apply(&mut ctx) {
                    report.animations += 1;
                }
            }
        }
        self.merge_inserted(&mut inserted);

        {
            let elapsed = self.fps.ticks_to_millis(tick);
            let mut ctx = TickContext::new(&mut *scene, &mut *camera, tick, self.fps, &mut inserted);
            for dependency in &mut self.dependencies {
                dependency(&mut ctx, tick, elapsed);
                report.dependencies += 1;
            }
        }
        self.merge_inserted(&mut inserted);

        report
    }

    /// Run every instruction keyed before `target`, in tick then
    /// registration order. Returns how many ran.
    pub fn run_instructions_before(&mut self, target: Tick, scene: &mut G, camera: &mut Camera) -> usize {
        let mut inserted = Vec::new();
        let mut count = 0;
        for (&tick, instructions) in self.instructions.range_mut(..target) {
            let mut ctx = TickContext::new(&mut *scene, &mut *camera, tick, self.fps, &mut inserted);
            for instruction in instructions.iter_mut() {
                instruction(&mut ctx);
                count += 1;
            }
        }
        self.merge_inserted(&mut inserted);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DEFAULT_FOV;
    use crate::interpolation::Interpolation;

    type Log = Vec<String>;

    const FPS: FrameRate = FrameRate::new(120);

    fn camera() -> Camera {
        Camera::perspective(DEFAULT_FOV, 1.0, 0.1, 100.0)
    }

    fn logging(len: usize, name: &'static str) -> Animation<Log> {
        Animation::new(
            Interpolation::from_samples(vec![0.0; len]),
            move |ctx: &mut TickContext<'_, Log>, _, tick, _| ctx.scene.push(format!("{name}@{tick}")),
        )
    }

    #[test]
    fn test_add_anim_advances_by_longest() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_instruction(|_| {});
        let advance = schedule.add_anim([logging(10, "a"), logging(25, "b"), logging(3, "c")]);
        assert_eq!(advance, 25);
        assert_eq!(schedule.calculation_tick(), 25);
        assert!(schedule.animations().iter().all(|a| a.start_tick() == 0));
    }

    #[test]
    fn test_empty_add_anim_keeps_cursor() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        assert_eq!(schedule.add_anim(Vec::new()), 0);
        assert_eq!(schedule.calculation_tick(), 0);
    }

    #[test]
    fn test_background_chain_does_not_move_cursor() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_anim([logging(5, "lead")]);
        let after = schedule.add_sequential_background_anims(2, [logging(4, "x"), logging(6, "y")]);
        assert_eq!(schedule.calculation_tick(), 5);
        assert_eq!(after, 17);
        let starts: Vec<_> = schedule.animations().iter().map(|a| a.start_tick()).collect();
        assert_eq!(starts, vec![0, 7, 11]);
    }

    #[test]
    fn test_add_wait_half_second() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        assert_eq!(schedule.add_wait(500.0), 60);
        assert_eq!(schedule.calculation_tick(), 60);
    }

    #[test]
    fn test_end_twice_fails() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_wait(1000.0);
        assert_eq!(schedule.end().unwrap(), 121);
        assert!(matches!(schedule.end(), Err(TimelineError::AlreadyEnded(121))));
    }

    #[test]
    fn test_phase_order() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_dependency(|ctx, tick, _| ctx.scene.push(format!("dep@{tick}")));
        schedule.add_instruction_at(1, |ctx| {
            let tick = ctx.tick();
            ctx.scene.push(format!("do@{tick}"));
        });
        schedule.insert_anim_at(1, [logging(1, "anim")]);

        let mut log = Log::new();
        let mut camera = camera();
        let report = schedule.trace_tick(1, &mut log, &mut camera);
        assert_eq!(log, vec!["do@1", "anim@1", "dep@1"]);
        assert_eq!(
            report,
            TickReport {
                instructions: 1,
                animations: 1,
                dependencies: 1
            }
        );
    }

    #[test]
    fn test_inserted_from_instruction_runs_same_tick() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_instruction_at(3, |ctx| {
            let tick = ctx.tick();
            ctx.insert_anim_at(tick, [logging(2, "event")]);
        });
        let mut log = Log::new();
        let mut camera = camera();
        for tick in 0..6 {
            schedule.trace_tick(tick, &mut log, &mut camera);
        }
        assert_eq!(log, vec!["event@3", "event@4"]);
    }

    #[test]
    fn test_inserted_from_dependency_runs_next_tick() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_dependency(|ctx, tick, _| {
            if tick == 2 {
                ctx.insert_anim_at(tick, [logging(3, "late")]);
            }
        });
        let mut log = Log::new();
        let mut camera = camera();
        for tick in 0..6 {
            schedule.trace_tick(tick, &mut log, &mut camera);
        }
        assert_eq!(log, vec!["late@3", "late@4"]);
    }

    #[test]
    fn test_run_instructions_before_target() {
        let mut schedule: Schedule<Log> = Schedule::new(FPS);
        schedule.add_instruction_at(4, |ctx| ctx.scene.push("four".into()));
        schedule.add_instruction_at(0, |ctx| ctx.scene.push("zero".into()));
        schedule.add_instruction_at(0, |ctx| ctx.scene.push("zero-b".into()));
        schedule.add_instruction_at(9, |ctx| ctx.scene.push("nine".into()));

        let mut log = Log::new();
        let mut camera = camera();
        assert_eq!(schedule.run_instructions_before(9, &mut log, &mut camera), 3);
        assert_eq!(log, vec!["zero", "zero-b", "four"]);
    }
}
