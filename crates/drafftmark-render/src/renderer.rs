//! Renderer trait abstraction.

use drafftmark_core::DisplayList;
use kurbo::{Affine, Size};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// Annotation layer to paint, in world coordinates.
    pub list: &'a DisplayList,
    /// World → screen transform of the host canvas.
    pub view: Affine,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Clear color. The layer is drawn over the host scene, so this is usually transparent.
    pub background_color: Color,
}

impl<'a> RenderContext<'a> {
    pub fn new(list: &'a DisplayList, viewport_size: Size) -> Self {
        Self {
            list,
            view: Affine::IDENTITY,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::TRANSPARENT,
        }
    }

    pub fn with_view(mut self, view: Affine) -> Self {
        self.view = view;
        self
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Full device transform: HiDPI scale applied after the view.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.scale_factor) * self.view
    }
}

/// Trait for rendering backends.
pub trait Renderer: Send + Sync {
    /// Build the command buffer for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_transform_applies_scale_after_view() {
        let list = DisplayList::new();
        let ctx = RenderContext::new(&list, Size::new(800.0, 600.0))
            .with_view(Affine::translate((10.0, 0.0)))
            .with_scale_factor(2.0);
        assert_eq!(ctx.transform() * Point::new(1.0, 1.0), Point::new(22.0, 2.0));
    }
}
