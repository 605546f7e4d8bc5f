//! Texture formats, usage flags and descriptors.

use crate::types::TargetBufferFlags;

/// Texture formats the frame graph schedules attachments and sampled
/// resources for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rg16Float,
    Depth32Float,
    Depth24Stencil8,
}

impl TextureFormat {
    /// Attachment slots a texture of this format can back.
    ///
    /// Used when validating render target declarations: a color slot needs
    /// a color format, a stencil slot a format with a stencil aspect.
    pub fn aspects(self) -> TargetBufferFlags {
        match self {
            TextureFormat::Depth32Float => TargetBufferFlags::DEPTH,
            TextureFormat::Depth24Stencil8 => TargetBufferFlags::DEPTH_AND_STENCIL,
            _ => TargetBufferFlags::COLOR,
        }
    }
}

/// Texture usage flags.
///
/// The frame graph only distinguishes the two usages that affect resource
/// planning: whether a sampleable view is required and whether the texture
/// can back a render target attachment. `Builder::read_attachment` strips
/// the sampled bit before the descriptor reaches the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage(u32);

impl TextureUsage {
    /// The texture is sampled by some pass and needs a sampleable view.
    pub const TEXTURE_BINDING: Self = Self(1 << 0);
    /// The texture backs a render target attachment.
    pub const RENDER_ATTACHMENT: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Return these flags with `other` removed.
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Texture descriptor.
///
/// Describes the observable properties of a texture. Descriptors are used as
/// pooling keys by the resource allocator, so they are `Eq + Hash` and carry
/// no label; virtual resources are named at the frame graph level instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub samples: u8,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            samples: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        }
    }
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor with the given size and format.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }
}
