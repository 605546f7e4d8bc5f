//! # Frame Graph
//!
//! A declarative frame graph for scheduling one frame of GPU rendering
//! work, inspired by the "FrameGraph: Extensible Rendering Architecture in
//! Frostbite" design.
//!
//! Rendering code registers passes; each pass declares the virtual
//! resources it reads and writes. The graph then culls passes whose outputs
//! nobody consumes, assigns pooled concrete resources with lifetimes shrunk
//! to the exact interval of use, coalesces compatible render targets and
//! derives attachment discard hints, and finally executes the survivors in
//! declaration order against an opaque driver.
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Graph | [`FrameGraph`] | Pass registration, compile, execute |
//! | Builder | [`Builder`] | Per-pass resource declarations |
//! | Allocator | [`ResourceAllocator`] | Pooled concrete resource backing |
//! | Driver | [`Driver`] | Opaque handle factory and command sink |
//!
//! The frame graph is single-threaded and frame-scoped: build, compile and
//! execute one instance per frame. Multiple instances (one per rendering
//! thread) may share one allocator.

pub mod allocator;
pub mod driver;
pub mod graph;
pub mod profiling;
pub mod types;

pub use allocator::{PooledAllocator, ResourceAllocator, SharedAllocator};
pub use driver::{
    Driver, Engine, RenderTargetHandle, RenderTargetSpec, TargetAttachments, TextureHandle,
};
pub use graph::{
    Builder, FrameGraph, FrameGraphHandle, FrameGraphId, FrameGraphPassResources,
    FrameGraphTexture, MAX_EXECUTOR_SIZE, PassRef, RenderTargetAttachments,
    RenderTargetDescriptor, RenderTargetInfo, ResourceHints, ResourceType,
};
pub use types::{
    RenderPassParams, TargetBufferFlags, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
