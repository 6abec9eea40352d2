// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ready-made node animations.
//!
//! Each helper returns an [`Animation`] over [`SceneData`] that addresses
//! its node by ID, so the same animation keeps working after a rebuild as
//! long as the build function hands it the new ID.

use crate::stage::{Node, NodeKind, SceneData};
use tickreel_sequencer::interpolation::{ease_constant, ease_in_out_quad, lerp_vec3};
use tickreel_sequencer::{Animation, FrameRate, NodeId};

/// Default duration of the helpers, in milliseconds
pub const DEFAULT_DURATION_MS: f32 = 800.0;

fn apply_opacity(node: &mut Node, opacity: f32) {
    node.opacity = opacity;
    if let NodeKind::Group { children } = &mut node.kind {
        for child in children {
            apply_opacity(child, opacity);
        }
    }
}

/// Set the opacity of a node and, for groups, every descendant
pub fn set_opacity(scene: &mut SceneData, id: NodeId, opacity: f32) -> bool {
    match scene.get_mut(id) {
        Some(node) => {
            apply_opacity(node, opacity.clamp(0.0, 1.0));
            true
        }
        None => false,
    }
}

/// Set a uniform scale on a node
pub fn set_scale(scene: &mut SceneData, id: NodeId, scale: f32) -> bool {
    match scene.get_mut(id) {
        Some(node) => {
            node.transform.set_uniform_scale(scale);
            true
        }
        None => false,
    }
}

/// Fade a node from transparent to opaque
pub fn fade_in(id: NodeId, duration_ms: f32, fps: FrameRate) -> Animation<SceneData> {
    Animation::<SceneData>::new(
        ease_in_out_quad(0.0, 1.0, duration_ms, fps),
        move |ctx, value, _, _| {
            set_opacity(ctx.scene, id, value);
        },
    )
}

/// Stay transparent for the first third, then fade in
pub fn fade_in_towards_end(id: NodeId, duration_ms: f32, fps: FrameRate) -> Animation<SceneData> {
    fade_in(id, duration_ms * 2.0 / 3.0, fps)
        .map_interpolation(|fade| ease_constant(0.0, duration_ms / 3.0, fps).then(fade))
}

/// Fade a node from opaque to transparent
pub fn fade_out(id: NodeId, duration_ms: f32, fps: FrameRate) -> Animation<SceneData> {
    fade_in(id, duration_ms, fps).reverse()
}

/// Grow a node from nothing to `endpoint` scale
pub fn zoom_in(id: NodeId, duration_ms: f32, endpoint: f32, fps: FrameRate) -> Animation<SceneData> {
    Animation::<SceneData>::new(
        ease_in_out_quad(0.0, endpoint, duration_ms, fps),
        move |ctx, value, _, _| {
            set_scale(ctx.scene, id, value);
        },
    )
}

/// Shrink a node from `endpoint` scale to nothing
pub fn zoom_out(id: NodeId, duration_ms: f32, endpoint: f32, fps: FrameRate) -> Animation<SceneData> {
    zoom_in(id, duration_ms, endpoint, fps).reverse()
}

/// Move a node to `target`, starting from wherever it is when the
/// animation begins
pub fn move_to(id: NodeId, target: [f32; 3], duration_ms: f32, fps: FrameRate) -> Animation<SceneData> {
    let mut start: Option<[f32; 3]> = None;
    Animation::<SceneData>::new(
        ease_in_out_quad(0.0, 1.0, duration_ms, fps),
        move |ctx, progress, _, _| {
            let Some(node) = ctx.scene.get_mut(id) else {
                return;
            };
            if progress == 0.0 || start.is_none() {
                start = Some(node.transform.position);
            }
            if let Some(from) = start {
                node.transform.position = lerp_vec3(from, target, progress);
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickreel_sequencer::SceneGraph;

    const FPS: FrameRate = FrameRate::new(10);

    #[test]
    fn test_set_opacity_reaches_group_children() {
        let mut scene = SceneData::new();
        let group = scene.insert(Node::group(
            "pair",
            vec![Node::sphere("a", 1.0), Node::sphere("b", 1.0)],
        ));
        assert!(set_opacity(&mut scene, group, 0.25));

        let node = scene.get(group).unwrap();
        assert_eq!(node.opacity, 0.25);
        match &node.kind {
            NodeKind::Group { children } => assert!(children.iter().all(|c| c.opacity == 0.25)),
            other => panic!("expected a group, got {other:?}"),
        }
        assert!(!set_opacity(&mut scene, NodeId::new(), 1.0));
    }

    #[test]
    fn test_fade_curves() {
        let id = NodeId::new();
        let fade = fade_in(id, 1000.0, FPS);
        assert_eq!(fade.len(), 10);
        assert_eq!(fade.interpolation().get(0), Some(0.0));
        assert_eq!(fade.interpolation().get(9), Some(1.0));

        let out = fade_out(id, 1000.0, FPS);
        assert_eq!(out.interpolation().get(0), Some(1.0));
        assert_eq!(out.interpolation().get(9), Some(0.0));
    }

    #[test]
    fn test_fade_in_towards_end_holds_first_third() {
        let fade = fade_in_towards_end(NodeId::new(), 900.0, FPS);
        let samples = fade.interpolation().samples();
        assert_eq!(samples.len(), 9);
        assert!(samples[..3].iter().all(|v| *v == 0.0));
        assert_eq!(samples.last(), Some(&1.0));
    }

    #[test]
    fn test_zoom_endpoints() {
        let zoom = zoom_in(NodeId::new(), 500.0, 2.0, FPS);
        assert_eq!(zoom.interpolation().samples().last(), Some(&2.0));
        let zoom = zoom_out(NodeId::new(), 500.0, 2.0, FPS);
        assert_eq!(zoom.interpolation().get(0), Some(2.0));
    }
}
