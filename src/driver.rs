//! Driver and engine abstraction traits.
//!
//! The frame graph never talks to a GPU API directly. Everything it needs
//! from the outside world is expressed by two traits: [`Driver`], an opaque
//! handle factory and command submission sink, and [`Engine`], an optional
//! host hook pumped between passes. Backends implement these; the frame
//! graph stays backend-agnostic.

use crate::types::TextureDescriptor;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Null handle, used for imported render targets whose backing surface
    /// is not sampleable.
    pub const NULL: Self = Self(0);
}

/// Handle to a GPU render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub u64);

/// Concrete attachments of a render target, resolved to driver handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TargetAttachments {
    pub color: Option<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub stencil: Option<TextureHandle>,
}

/// Everything the driver needs to create a concrete render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetSpec {
    pub attachments: TargetAttachments,
    pub width: u32,
    pub height: u32,
    pub samples: u8,
}

/// Opaque GPU driver interface.
///
/// The frame graph uses the driver as a handle factory during resource
/// resolution and flushes it after each executed pass. Pass executors
/// receive `&mut dyn Driver` and may downcast or wrap it however their
/// backend requires; the frame graph itself records nothing through it.
pub trait Driver {
    /// Create a texture.
    fn create_texture(&mut self, name: &str, desc: &TextureDescriptor) -> TextureHandle;

    /// Destroy a texture.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Create a render target over already-created attachments.
    fn create_render_target(&mut self, name: &str, spec: &RenderTargetSpec) -> RenderTargetHandle;

    /// Destroy a render target. Its attachments are destroyed separately.
    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    /// Submit all commands recorded since the previous flush.
    fn flush(&mut self);
}

/// Host engine hook.
///
/// [`FrameGraph::execute_with_engine`](crate::FrameGraph::execute_with_engine)
/// calls [`flush`](Engine::flush) after each executed pass, between the
/// driver flush and the next pass, so the host can pump background work.
pub trait Engine {
    fn flush(&mut self);
}

static_assertions::assert_impl_all!(TextureHandle: Send, Sync, Copy);
static_assertions::assert_impl_all!(RenderTargetHandle: Send, Sync, Copy);
