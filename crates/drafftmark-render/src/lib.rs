//! drafftmark Render Library
//!
//! Renderer abstraction for the annotation layer's display list.
//! The default implementation encodes it into a Vello scene.

mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use renderer::{RenderContext, RenderResult, Renderer, RendererError};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
