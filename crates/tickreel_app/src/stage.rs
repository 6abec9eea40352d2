// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retained-mode scene graph driven by the timeline.
//!
//! Nodes live in insertion order at the root. Groups carry their children
//! inline, so removing a group drops its whole subtree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tickreel_sequencer::camera::{add_scaled, length, normalize, sub};
use tickreel_sequencer::{NodeId, Rgb, SceneGraph};

/// Transform component data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    /// Position (x, y, z)
    pub position: [f32; 3],
    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// Scale
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl Transform {
    /// Uniform scale, taken from the x axis
    pub fn uniform_scale(&self) -> f32 {
        self.scale[0]
    }

    /// Set all three scale axes
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = [scale; 3];
    }
}

/// Geometry carried by a node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NodeKind {
    /// Sphere centered on the node position
    Sphere {
        /// Radius in world units
        radius: f32,
    },
    /// Segment in node-local space
    Line {
        /// Start point
        from: [f32; 3],
        /// End point
        to: [f32; 3],
        /// Stroke width in pixels
        width: f32,
    },
    /// Text label anchored at the node position
    Text {
        /// Label content
        content: String,
        /// Glyph height in world units
        size: f32,
    },
    /// Container whose transform and opacity apply to its children
    Group {
        /// Child nodes
        children: Vec<Node>,
    },
}

/// A scene node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Display name, used for lookups from build functions
    pub name: String,
    /// Geometry
    pub kind: NodeKind,
    /// Transform
    pub transform: Transform,
    /// Base color
    pub color: Rgb,
    /// Opacity in `0..=1`
    pub opacity: f32,
    /// Whether the node is drawn at all
    pub visible: bool,
}

impl Node {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            visible: true,
        }
    }

    /// Sphere of `radius` at the origin
    pub fn sphere(name: impl Into<String>, radius: f32) -> Self {
        Self::with_kind(name, NodeKind::Sphere { radius })
    }

    /// Line between two local points
    pub fn line(name: impl Into<String>, from: [f32; 3], to: [f32; 3]) -> Self {
        Self::with_kind(name, NodeKind::Line { from, to, width: 2.0 })
    }

    /// Text label
    pub fn text(name: impl Into<String>, content: impl Into<String>, size: f32) -> Self {
        Self::with_kind(
            name,
            NodeKind::Text {
                content: content.into(),
                size,
            },
        )
    }

    /// Group of child nodes
    pub fn group(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self::with_kind(name, NodeKind::Group { children })
    }

    /// Builder-style position
    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.transform.position = position;
        self
    }

    /// Builder-style color
    pub fn colored(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Builder-style opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Scene data containing all root nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneData {
    /// All root nodes in insertion order
    pub nodes: IndexMap<NodeId, Node>,
    #[serde(skip)]
    disposed: usize,
}

impl SceneData {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable reference to a node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// First node with the given name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
    }

    /// Number of root nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes disposed since the scene was created
    pub fn disposed(&self) -> usize {
        self.disposed
    }
}

impl SceneGraph for SceneData {
    type Node = Node;

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, node);
        id
    }

    fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.shift_remove(&id)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn dispose(&mut self, node: Node) {
        tracing::trace!("Disposing node '{}'", node.name);
        self.disposed += 1;
    }
}

/// A line node kept between two moving points
///
/// The endpoints are pulled inward by `padding` so the line stops at the
/// surface of whatever it connects. When the points are closer than twice
/// the padding the line is hidden.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    id: NodeId,
    endpoints: Option<([f32; 3], [f32; 3], f32)>,
}

impl Connector {
    /// Insert a hidden line node and wrap it
    pub fn attach(scene: &mut SceneData, name: impl Into<String>, color: Rgb) -> Self {
        let mut node = Node::line(name, [0.0; 3], [0.0; 3]).colored(color);
        node.visible = false;
        Self {
            id: scene.insert(node),
            endpoints: None,
        }
    }

    /// Underlying line node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Move the line to connect `p1` and `p2`. Returns whether the node
    /// changed.
    pub fn update(&mut self, scene: &mut SceneData, p1: [f32; 3], p2: [f32; 3], padding: f32) -> bool {
        if self.endpoints == Some((p1, p2, padding)) {
            return false;
        }
        let Some(node) = scene.get_mut(self.id) else {
            return false;
        };
        self.endpoints = Some((p1, p2, padding));

        let delta = sub(p2, p1);
        if length(delta) <= 2.0 * padding {
            node.visible = false;
            return true;
        }
        let dir = normalize(delta);
        if let NodeKind::Line { from, to, .. } = &mut node.kind {
            *from = add_scaled(p1, dir, padding);
            *to = add_scaled(p2, dir, -padding);
        }
        node.visible = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_keeps_order() {
        let mut scene = SceneData::new();
        let a = scene.insert(Node::sphere("a", 1.0));
        let b = scene.insert(Node::sphere("b", 1.0));
        let c = scene.insert(Node::sphere("c", 1.0));

        assert_eq!(scene.remove(b).map(|n| n.name), Some("b".to_string()));
        assert_eq!(scene.node_ids(), vec![a, c]);
        assert!(!scene.contains(b));
        assert_eq!(scene.find("c"), Some(c));
    }

    #[test]
    fn test_dispose_counts() {
        let mut scene = SceneData::new();
        let id = scene.insert(Node::text("label", "hello", 1.0));
        let node = scene.remove(id).unwrap();
        scene.dispose(node);
        assert_eq!(scene.disposed(), 1);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_connector_pads_endpoints() {
        let mut scene = SceneData::new();
        let mut link = Connector::attach(&mut scene, "link", [1.0, 0.0, 0.0]);

        assert!(link.update(&mut scene, [0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 1.0));
        let node = scene.get(link.id()).unwrap();
        assert!(node.visible);
        match &node.kind {
            NodeKind::Line { from, to, .. } => {
                assert_eq!(*from, [1.0, 0.0, 0.0]);
                assert_eq!(*to, [9.0, 0.0, 0.0]);
            }
            other => panic!("expected a line, got {other:?}"),
        }

        // Same endpoints again is a no-op
        assert!(!link.update(&mut scene, [0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 1.0));
    }

    #[test]
    fn test_connector_hides_when_too_close() {
        let mut scene = SceneData::new();
        let mut link = Connector::attach(&mut scene, "link", [1.0; 3]);
        link.update(&mut scene, [0.0; 3], [1.5, 0.0, 0.0], 1.0);
        assert!(!scene.get(link.id()).unwrap().visible);
    }

    #[test]
    fn test_connector_ignores_removed_node() {
        let mut scene = SceneData::new();
        let mut link = Connector::attach(&mut scene, "link", [1.0; 3]);
        scene.remove(link.id());
        assert!(!link.update(&mut scene, [0.0; 3], [5.0, 0.0, 0.0], 0.0));
    }
}
