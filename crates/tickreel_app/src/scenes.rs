// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo scenes.

use crate::anims::{
    fade_in, fade_in_towards_end, fade_out, move_to, set_opacity, set_scale, zoom_in, zoom_out,
    DEFAULT_DURATION_MS,
};
use crate::stage::{Connector, Node, NodeKind, SceneData};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use tickreel_sequencer::camera::add_scaled;
use tickreel_sequencer::{move_camera, BoxError, SceneBuilder};

/// Sound played by the sequence demo, relative to the assets root
pub const POP_SOUND: &str = "sfx/pop.wav";

/// Build function signature shared by every demo
pub type DemoBuild = fn(&mut SceneBuilder<'_, SceneData>) -> Result<(), BoxError>;

/// Built-in scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoScene {
    /// Orbiting spheres tied together by connectors
    Dependency,
    /// Fades, moves, waits and audio cues
    Sequence,
    /// Background camera sway with event-triggered fades
    Sway,
}

impl DemoScene {
    /// Every demo
    pub const ALL: [DemoScene; 3] = [DemoScene::Dependency, DemoScene::Sequence, DemoScene::Sway];

    /// Name used in settings and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            DemoScene::Dependency => "dependency",
            DemoScene::Sequence => "sequence",
            DemoScene::Sway => "sway",
        }
    }

    /// Build function for this scene
    pub fn build_fn(&self) -> DemoBuild {
        match self {
            DemoScene::Dependency => dependency,
            DemoScene::Sequence => sequence,
            DemoScene::Sway => sway,
        }
    }
}

impl fmt::Display for DemoScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized scene name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scene '{0}', expected one of: dependency, sequence, sway")]
pub struct UnknownScene(pub String);

impl FromStr for DemoScene {
    type Err = UnknownScene;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DemoScene::ALL
            .into_iter()
            .find(|scene| scene.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownScene(s.to_string()))
    }
}

/// Planet position around the origin after `elapsed_ms`
pub fn planet_position(elapsed_ms: f32) -> [f32; 3] {
    let angle = elapsed_ms / 1000.0 * 0.8;
    [8.0 * angle.cos(), 8.0 * angle.sin(), 0.0]
}

/// Moon position around `planet` after `elapsed_ms`
pub fn moon_position(planet: [f32; 3], elapsed_ms: f32) -> [f32; 3] {
    let angle = elapsed_ms / 1000.0 * 3.0;
    add_scaled(planet, [angle.cos(), angle.sin(), 0.0], 2.5)
}

fn dependency(scene: &mut SceneBuilder<'_, SceneData>) -> Result<(), BoxError> {
    let fps = scene.fps();
    let sun = scene.add(Node::group(
        "sun",
        vec![
            Node::sphere("corona", 2.6).colored([1.0, 0.5, 0.1]),
            Node::sphere("core", 2.0).colored([1.0, 0.8, 0.2]),
        ],
    ));
    let planet = scene.add(Node::sphere("planet", 1.0).colored([0.3, 0.6, 1.0]));
    let moon = scene.add(Node::sphere("moon", 0.5).colored([0.8, 0.8, 0.8]));
    let mut sun_link = Connector::attach(scene.scene(), "sun-planet", [0.6, 0.6, 0.6]);
    let mut moon_link = Connector::attach(scene.scene(), "planet-moon", [0.4, 0.4, 0.4]);
    let links = [sun_link.id(), moon_link.id()];
    for link in links {
        set_opacity(scene.scene(), link, 0.0);
    }

    scene.on_each_tick(move |ctx, _, elapsed| {
        let planet_at = planet_position(elapsed);
        let moon_at = moon_position(planet_at, elapsed);
        if let Some(node) = ctx.scene.get_mut(planet) {
            node.transform.position = planet_at;
        }
        if let Some(node) = ctx.scene.get_mut(moon) {
            node.transform.position = moon_at;
        }
        let sun_at = ctx
            .scene
            .get(sun)
            .map(|node| node.transform.position)
            .unwrap_or_default();
        sun_link.update(ctx.scene, sun_at, planet_at, 2.5);
        moon_link.update(ctx.scene, planet_at, moon_at, 1.0);
    });

    scene.add_anim([
        fade_in(sun, DEFAULT_DURATION_MS, fps),
        fade_in(planet, DEFAULT_DURATION_MS, fps),
        fade_in(moon, DEFAULT_DURATION_MS, fps),
    ]);
    // Links show up once the bodies are visible
    scene.add_anim(links.map(|link| fade_in_towards_end(link, 1200.0, fps)));
    scene.add_wait(6000.0);
    scene.end()?;
    Ok(())
}

fn sequence(scene: &mut SceneBuilder<'_, SceneData>) -> Result<(), BoxError> {
    let fps = scene.fps();
    scene.register_audio(POP_SOUND);

    let title = scene.add(Node::text("title", "tickreel", 2.0).at([-8.0, 12.0, 0.0]));
    set_scale(scene.scene(), title, 0.0);
    scene.add_anim([zoom_in(title, 600.0, 1.0, fps)]);

    let colors = [[0.9, 0.3, 0.3], [0.3, 0.9, 0.3], [0.3, 0.3, 0.9]];
    let mut balls = Vec::with_capacity(colors.len());
    for (i, color) in colors.into_iter().enumerate() {
        let x = -6.0 + 6.0 * i as f32;
        let ball = scene.add(
            Node::sphere(format!("ball{i}"), 1.5)
                .at([x, 0.0, 0.0])
                .colored(color)
                .with_opacity(0.0),
        );
        scene.play_audio(POP_SOUND, 0.8);
        scene.add_anim([fade_in(ball, 400.0, fps)]);
        balls.push((ball, x));
    }

    scene.add_wait(300.0);
    scene.add_anim(
        balls
            .iter()
            .map(|&(ball, x)| move_to(ball, [x, -8.0, 0.0], DEFAULT_DURATION_MS, fps)),
    );
    scene.do_at_cursor(move |ctx| {
        if let Some(node) = ctx.scene.get_mut(title) {
            if let NodeKind::Text { content, .. } = &mut node.kind {
                *content = "done".to_string();
            }
        }
    });
    scene.add_wait(500.0);
    scene.add_anim(
        balls
            .iter()
            .map(|&(ball, _)| fade_out(ball, 600.0, fps))
            .chain([zoom_out(title, 600.0, 1.0, fps)]),
    );
    scene.end()?;
    Ok(())
}

fn sway(scene: &mut SceneBuilder<'_, SceneData>) -> Result<(), BoxError> {
    let fps = scene.fps();
    let mut drift = Vec::new();
    for i in 0..6 {
        // Same draws on every rebuild, the RNG is reseeded
        let side = if i % 2 == 0 { 1.0 } else { -1.0 };
        let x = side * scene.rng().random_range(1.0..3.0f32);
        let y = scene.rng().random_range(-1.0..1.0f32);
        drift.push(move_camera([x, y], 1200.0, fps).add_noise(0.02, scene.rng()));
    }
    scene.add_sequential_background_anims(drift);

    for row in 0..3 {
        for col in 0..3 {
            let position = [-6.0 + 6.0 * col as f32, -6.0 + 6.0 * row as f32, 0.0];
            let dot = scene.add(
                Node::sphere(format!("dot{row}{col}"), 1.0)
                    .at(position)
                    .with_opacity(0.0),
            );
            scene.do_at_cursor(move |ctx| {
                let (tick, fps) = (ctx.tick(), ctx.fps());
                ctx.insert_anim_at(tick, [fade_in(dot, 500.0, fps)]);
            });
            scene.add_wait(250.0);
        }
    }
    scene.add_wait(1500.0);
    scene.end()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_names_round_trip() {
        for scene in DemoScene::ALL {
            assert_eq!(scene.name().parse::<DemoScene>(), Ok(scene));
        }
        assert_eq!(" SWAY ".parse::<DemoScene>(), Ok(DemoScene::Sway));
        assert_eq!(
            "nope".parse::<DemoScene>(),
            Err(UnknownScene("nope".to_string()))
        );
    }

    #[test]
    fn test_orbits() {
        assert_eq!(planet_position(0.0), [8.0, 0.0, 0.0]);
        let moon = moon_position([8.0, 0.0, 0.0], 0.0);
        assert_eq!(moon, [10.5, 0.0, 0.0]);
    }
}
