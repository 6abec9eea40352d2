// SPDX-License-Identifier: MIT OR Apache-2.0
//! CPU renderer.
//!
//! Projects the scene through the timeline camera and paints flat-shaded
//! primitives back to front into an RGBA image. No depth buffer and no
//! lighting. Shadows are tracked as a flag only.

use crate::stage::{Node, NodeKind, SceneData};
use image::{Rgba, RgbaImage};
use tickreel_sequencer::camera::{conjugate, rotate_vector, sub};
use tickreel_sequencer::{Camera, Projection, Renderer, Rgb};

/// Something painted on screen, in pixel space
#[derive(Debug, Clone, PartialEq)]
enum Primitive {
    Disk {
        center: [f32; 2],
        radius: f32,
    },
    Segment {
        from: [f32; 2],
        to: [f32; 2],
        width: f32,
    },
    Glyphs {
        origin: [f32; 2],
        cell: f32,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Paint {
    depth: f32,
    color: Rgb,
    alpha: f32,
    primitive: Primitive,
}

/// Inherited group state
#[derive(Debug, Clone, Copy)]
struct Parent {
    offset: [f32; 3],
    scale: f32,
    opacity: f32,
}

const ROOT: Parent = Parent {
    offset: [0.0; 3],
    scale: 1.0,
    opacity: 1.0,
};

/// Camera projection into pixel space
struct View<'a> {
    camera: &'a Camera,
    inverse_rotation: [f32; 4],
    width: f32,
    height: f32,
}

impl<'a> View<'a> {
    fn new(camera: &'a Camera, width: u32, height: u32) -> Self {
        Self {
            camera,
            inverse_rotation: conjugate(camera.rotation),
            width: width as f32,
            height: height as f32,
        }
    }

    /// Pixel position, depth, and pixels per world unit at that depth
    fn project(&self, point: [f32; 3]) -> Option<([f32; 2], f32, f32)> {
        let v = rotate_vector(self.inverse_rotation, sub(point, self.camera.position));
        let depth = -v[2];
        if depth < self.camera.near || depth > self.camera.far {
            return None;
        }
        let (ndc, units) = match self.camera.projection {
            Projection::Perspective { fov, aspect } => {
                let half = (fov.to_radians() / 2.0).tan() * depth;
                ([v[0] / (half * aspect), v[1] / half], half)
            }
            Projection::Orthographic(bounds) => {
                let zoom = if bounds.zoom > 0.0 { bounds.zoom } else { 1.0 };
                let half_w = (bounds.right - bounds.left) / (2.0 * zoom);
                let half_h = (bounds.top - bounds.bottom) / (2.0 * zoom);
                let cx = (bounds.right + bounds.left) / 2.0;
                let cy = (bounds.top + bounds.bottom) / 2.0;
                ([(v[0] - cx) / half_w, (v[1] - cy) / half_h], half_h)
            }
        };
        let pixel = [
            (ndc[0] + 1.0) / 2.0 * self.width,
            (1.0 - ndc[1]) / 2.0 * self.height,
        ];
        Some((pixel, depth, self.height / (2.0 * units)))
    }
}

/// Software renderer producing an RGBA image
#[derive(Debug, Clone)]
pub struct SoftwareRenderer {
    image: RgbaImage,
    clear_color: Rgb,
    clear_alpha: f32,
    shadows: bool,
    frames: u64,
}

impl SoftwareRenderer {
    /// Renderer with a `width` x `height` drawing buffer and a black clear color
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            clear_color: [0.0, 0.0, 0.0],
            clear_alpha: 1.0,
            shadows: false,
            frames: 0,
        }
    }

    /// Frames rendered since creation
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn collect(view: &View<'_>, node: &Node, parent: Parent, out: &mut Vec<Paint>) {
        if !node.visible {
            return;
        }
        let alpha = (node.opacity * parent.opacity).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let scale = node.transform.uniform_scale() * parent.scale;
        let position = [
            parent.offset[0] + node.transform.position[0] * parent.scale,
            parent.offset[1] + node.transform.position[1] * parent.scale,
            parent.offset[2] + node.transform.position[2] * parent.scale,
        ];
        let local = |p: [f32; 3]| {
            [
                position[0] + p[0] * scale,
                position[1] + p[1] * scale,
                position[2] + p[2] * scale,
            ]
        };

        match &node.kind {
            NodeKind::Sphere { radius } => {
                if let Some((center, depth, ppu)) = view.project(position) {
                    out.push(Paint {
                        depth,
                        color: node.color,
                        alpha,
                        primitive: Primitive::Disk {
                            center,
                            radius: radius * scale * ppu,
                        },
                    });
                }
            }
            NodeKind::Line { from, to, width } => {
                if let (Some((a, da, _)), Some((b, db, _))) =
                    (view.project(local(*from)), view.project(local(*to)))
                {
                    out.push(Paint {
                        depth: (da + db) / 2.0,
                        color: node.color,
                        alpha,
                        primitive: Primitive::Segment {
                            from: a,
                            to: b,
                            width: *width,
                        },
                    });
                }
            }
            NodeKind::Text { content, size } => {
                if let Some((origin, depth, ppu)) = view.project(position) {
                    out.push(Paint {
                        depth,
                        color: node.color,
                        alpha,
                        primitive: Primitive::Glyphs {
                            origin,
                            cell: size * scale * ppu,
                            count: content.chars().filter(|c| !c.is_whitespace()).count(),
                        },
                    });
                }
            }
            NodeKind::Group { children } => {
                let inherited = Parent {
                    offset: position,
                    scale,
                    opacity: alpha,
                };
                for child in children {
                    Self::collect(view, child, inherited, out);
                }
            }
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height()) {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for (channel, value) in pixel.0.iter_mut().take(3).zip(color) {
            let dst = f32::from(*channel) / 255.0;
            *channel = to_byte(value * alpha + dst * (1.0 - alpha));
        }
        let dst_alpha = f32::from(pixel.0[3]) / 255.0;
        pixel.0[3] = to_byte(alpha + dst_alpha * (1.0 - alpha));
    }

    fn fill_rect(&mut self, min: [f32; 2], max: [f32; 2], color: Rgb, alpha: f32) {
        for y in min[1].floor() as i64..max[1].ceil() as i64 {
            for x in min[0].floor() as i64..max[0].ceil() as i64 {
                self.blend(x, y, color, alpha);
            }
        }
    }

    fn paint(&mut self, paint: &Paint) {
        let Paint {
            color, alpha, primitive, ..
        } = paint;
        match *primitive {
            Primitive::Disk { center, radius } => {
                let r2 = radius * radius;
                let (w, h) = (i64::from(self.image.width()), i64::from(self.image.height()));
                let ys = ((center[1] - radius).floor() as i64).max(0)..=((center[1] + radius).ceil() as i64).min(h - 1);
                let xs = ((center[0] - radius).floor() as i64).max(0)..=((center[0] + radius).ceil() as i64).min(w - 1);
                for y in ys {
                    for x in xs.clone() {
                        let dx = x as f32 + 0.5 - center[0];
                        let dy = y as f32 + 0.5 - center[1];
                        if dx * dx + dy * dy <= r2 {
                            self.blend(x, y, *color, *alpha);
                        }
                    }
                }
            }
            Primitive::Segment { from, to, width } => {
                let steps = (to[0] - from[0]).abs().max((to[1] - from[1]).abs()).ceil().max(1.0) as usize;
                let half = (width / 2.0).max(0.5);
                for i in 0..=steps {
                    let t = i as f32 / steps as f32;
                    let x = from[0] + (to[0] - from[0]) * t;
                    let y = from[1] + (to[1] - from[1]) * t;
                    self.fill_rect([x - half, y - half], [x + half, y + half], *color, *alpha);
                }
            }
            Primitive::Glyphs { origin, cell, count } => {
                let glyph = cell * 0.6;
                for i in 0..count {
                    let x = origin[0] + i as f32 * cell * 0.7;
                    self.fill_rect([x, origin[1] - cell], [x + glyph, origin[1]], *color, *alpha);
                }
            }
        }
    }
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Renderer<SceneData> for SoftwareRenderer {
    type Surface = RgbaImage;

    fn render_frame(&mut self, scene: &SceneData, camera: &Camera) {
        let clear = Rgba([
            to_byte(self.clear_color[0]),
            to_byte(self.clear_color[1]),
            to_byte(self.clear_color[2]),
            to_byte(self.clear_alpha),
        ]);
        for pixel in self.image.pixels_mut() {
            *pixel = clear;
        }

        let (width, height) = self.image.dimensions();
        let view = View::new(camera, width, height);
        let mut paints = Vec::new();
        for node in scene.nodes.values() {
            Self::collect(&view, node, ROOT, &mut paints);
        }
        // Farthest first
        paints.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        for paint in &paints {
            self.paint(paint);
        }
        self.frames += 1;
        tracing::trace!("Rendered frame {} with {} primitives", self.frames, paints.len());
    }

    fn surface(&self) -> &RgbaImage {
        &self.image
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn set_clear_color(&mut self, color: Rgb, alpha: f32) {
        self.clear_color = color;
        self.clear_alpha = alpha;
    }

    fn clear_color(&self) -> Rgb {
        self.clear_color
    }

    fn clear_alpha(&self) -> f32 {
        self.clear_alpha
    }

    fn shadows_enabled(&self) -> bool {
        self.shadows
    }

    fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickreel_sequencer::SceneGraph;

    fn camera() -> Camera {
        let mut camera = Camera::orthographic(10.0, 1.0, 1.0, 100.0);
        camera.position = [0.0, 0.0, 30.0];
        camera
    }

    #[test]
    fn test_clear_fills_surface() {
        let mut renderer = SoftwareRenderer::new(4, 4);
        renderer.set_clear_color([1.0, 0.0, 0.0], 0.5);
        renderer.render_frame(&SceneData::new(), &camera());
        assert_eq!(renderer.surface().get_pixel(2, 2).0, [255, 0, 0, 128]);
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn test_sphere_covers_center() {
        let mut renderer = SoftwareRenderer::new(40, 40);
        let mut scene = SceneData::new();
        scene.insert(Node::sphere("ball", 2.0).colored([0.0, 1.0, 0.0]));
        renderer.render_frame(&scene, &camera());

        let surface = renderer.surface();
        assert_eq!(surface.get_pixel(20, 20).0, [0, 255, 0, 255]);
        assert_eq!(surface.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_opacity_blends_with_clear() {
        let mut renderer = SoftwareRenderer::new(40, 40);
        let mut scene = SceneData::new();
        scene.insert(Node::sphere("ball", 5.0).with_opacity(0.5));
        renderer.render_frame(&scene, &camera());
        assert_eq!(renderer.surface().get_pixel(20, 20).0[0], 128);
    }

    #[test]
    fn test_hidden_and_behind_nodes_are_skipped() {
        let mut renderer = SoftwareRenderer::new(40, 40);
        let mut scene = SceneData::new();
        let mut hidden = Node::sphere("hidden", 5.0);
        hidden.visible = false;
        scene.insert(hidden);
        scene.insert(Node::sphere("behind", 5.0).at([0.0, 0.0, 50.0]));
        renderer.render_frame(&scene, &camera());
        assert!(renderer.surface().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_resize_replaces_buffer() {
        let mut renderer = SoftwareRenderer::new(4, 4);
        renderer.resize(8, 2);
        assert_eq!(renderer.size(), (8, 2));
        assert_eq!(renderer.surface().dimensions(), (8, 2));
    }
}
