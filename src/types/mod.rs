//! Common types shared between the frame graph and its collaborators.

mod target;
mod texture;

pub use target::{RenderPassParams, TargetBufferFlags};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
