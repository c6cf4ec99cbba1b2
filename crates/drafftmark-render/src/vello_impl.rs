//! Vello-based renderer implementation.

use crate::renderer::{RenderContext, Renderer};
use drafftmark_core::{DisplayList, Primitive};
use kurbo::{Affine, Cap, Join, Stroke};
use peniko::{Color, Fill};
use vello::Scene;

/// Encodes the annotation display list into a Vello scene.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Primitives encoded into the current scene.
    draw_calls: usize,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            draw_calls: 0,
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        self.draw_calls = 0;
        std::mem::take(&mut self.scene)
    }

    /// Number of primitives in the current scene.
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Replace the scene with `list`, painted through `transform`.
    ///
    /// Shadows and primaries arrive already ordered. Fully faded primitives are skipped.
    pub fn build_list(&mut self, list: &DisplayList, transform: Affine) {
        self.scene.reset();
        self.draw_calls = 0;
        for primitive in list {
            self.render_primitive(primitive, transform);
        }
        log::trace!("encoded {} primitives", self.draw_calls);
    }

    fn render_primitive(&mut self, primitive: &Primitive, transform: Affine) {
        let alpha = primitive.alpha();
        if alpha <= 0.0 {
            return;
        }
        match primitive {
            Primitive::Stroke {
                path, width, color, ..
            } => {
                let stroke = Stroke::new(*width).with_caps(Cap::Round).with_join(Join::Round);
                let color = Color::from(*color).multiply_alpha(alpha as f32);
                self.scene.stroke(&stroke, transform, color, None, path);
            }
            Primitive::Fill { path, color, .. } => {
                let color = Color::from(*color).multiply_alpha(alpha as f32);
                self.scene.fill(Fill::NonZero, transform, color, None, path);
            }
        }
        self.draw_calls += 1;
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.build_list(ctx.list, ctx.transform());
    }
}
