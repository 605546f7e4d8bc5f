//! Render target declarations and their coalesced concrete backings.

use crate::driver::RenderTargetHandle;
use crate::graph::handle::FrameGraphId;
use crate::graph::resource::FrameGraphTexture;
use crate::types::TargetBufferFlags;

/// Attachment set of a render target declaration.
///
/// Each slot names a resource version that must have been read or written
/// by the declaring pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTargetAttachments {
    pub color: Option<FrameGraphId<FrameGraphTexture>>,
    pub depth: Option<FrameGraphId<FrameGraphTexture>>,
    pub stencil: Option<FrameGraphId<FrameGraphTexture>>,
}

impl RenderTargetAttachments {
    /// Attachments with a single color slot.
    pub fn color(id: FrameGraphId<FrameGraphTexture>) -> Self {
        Self {
            color: Some(id),
            ..Default::default()
        }
    }

    /// Iterate occupied slots as `(slot flag, id)` pairs.
    pub fn slots(
        &self,
    ) -> impl Iterator<Item = (TargetBufferFlags, FrameGraphId<FrameGraphTexture>)> + '_ {
        [
            (TargetBufferFlags::COLOR, self.color),
            (TargetBufferFlags::DEPTH, self.depth),
            (TargetBufferFlags::STENCIL, self.stencil),
        ]
        .into_iter()
        .filter_map(|(flag, id)| id.map(|id| (flag, id)))
    }
}

/// Render target descriptor: attachments plus multisampling.
#[derive(Debug, Clone, Copy)]
pub struct RenderTargetDescriptor {
    pub attachments: RenderTargetAttachments,
    pub samples: u8,
}

impl Default for RenderTargetDescriptor {
    fn default() -> Self {
        Self {
            attachments: RenderTargetAttachments::default(),
            samples: 1,
        }
    }
}

/// A per-pass render target declaration.
///
/// Several declarations may share one [`RenderTargetResource`] after
/// compilation; the discard flags below are derived per declaration from
/// the cohort's usage.
#[derive(Debug)]
pub(crate) struct RenderTarget {
    pub name: String,
    pub desc: RenderTargetDescriptor,
    pub clear_flags: TargetBufferFlags,
    /// Declaring pass index.
    pub pass: usize,
    /// Index into the graph's render target cache, set by compile.
    pub cache: Option<usize>,
    pub discard_start: TargetBufferFlags,
    pub discard_end: TargetBufferFlags,
}

impl RenderTarget {
    pub fn new(
        name: &str,
        desc: RenderTargetDescriptor,
        clear_flags: TargetBufferFlags,
        pass: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            desc,
            clear_flags,
            pass,
            cache: None,
            discard_start: TargetBufferFlags::NONE,
            discard_end: TargetBufferFlags::NONE,
        }
    }
}

/// Attachment slots of a coalesced render target, as entry indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AttachmentEntries {
    pub color: Option<usize>,
    pub depth: Option<usize>,
    pub stencil: Option<usize>,
}

impl AttachmentEntries {
    pub fn slots(&self) -> impl Iterator<Item = (TargetBufferFlags, usize)> + '_ {
        [
            (TargetBufferFlags::COLOR, self.color),
            (TargetBufferFlags::DEPTH, self.depth),
            (TargetBufferFlags::STENCIL, self.stencil),
        ]
        .into_iter()
        .filter_map(|(flag, entry)| entry.map(|entry| (flag, entry)))
    }

    /// Whether both attachment sets occupy the same slots.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.color.is_some() == other.color.is_some()
            && self.depth.is_some() == other.depth.is_some()
            && self.stencil.is_some() == other.stencil.is_some()
    }
}

/// Concrete backing shared by a cohort of render target declarations.
#[derive(Debug)]
pub(crate) struct RenderTargetResource {
    pub name: String,
    pub imported: bool,
    pub width: u32,
    pub height: u32,
    pub samples: u8,
    pub attachments: AttachmentEntries,
    /// Caller-declared boundary flags; only meaningful when imported.
    pub declared_discard_start: TargetBufferFlags,
    pub declared_discard_end: TargetBufferFlags,
    /// First and last surviving pass of the cohort.
    pub first_use: Option<usize>,
    pub last_use: Option<usize>,
    /// Bound during execute for transient targets, up front for imports.
    pub concrete: Option<RenderTargetHandle>,
    /// Spec used at acquire time, kept so the release is symmetric.
    pub spec: Option<crate::driver::RenderTargetSpec>,
}

impl RenderTargetResource {
    pub fn transient(
        name: &str,
        width: u32,
        height: u32,
        samples: u8,
        attachments: AttachmentEntries,
    ) -> Self {
        Self {
            name: name.to_string(),
            imported: false,
            width,
            height,
            samples,
            attachments,
            declared_discard_start: TargetBufferFlags::NONE,
            declared_discard_end: TargetBufferFlags::NONE,
            first_use: None,
            last_use: None,
            concrete: None,
            spec: None,
        }
    }

    pub fn imported(
        name: &str,
        width: u32,
        height: u32,
        samples: u8,
        attachments: AttachmentEntries,
        target: RenderTargetHandle,
        discard_start: TargetBufferFlags,
        discard_end: TargetBufferFlags,
    ) -> Self {
        Self {
            name: name.to_string(),
            imported: true,
            width,
            height,
            samples,
            attachments,
            declared_discard_start: discard_start,
            declared_discard_end: discard_end,
            first_use: None,
            last_use: None,
            concrete: Some(target),
            spec: None,
        }
    }

    /// Record one more cohort member at the given pass.
    pub fn extend_lifetime(&mut self, pass: usize) {
        if self.first_use.is_none_or(|first| pass < first) {
            self.first_use = Some(pass);
        }
        if self.last_use.is_none_or(|last| pass > last) {
            self.last_use = Some(pass);
        }
    }
}
