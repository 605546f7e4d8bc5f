//! Resolved view of a pass's resources during execution.

use crate::driver::{RenderTargetHandle, TextureHandle};
use crate::graph::handle::FrameGraphId;
use crate::graph::resource::{FrameGraphTexture, ResourceEntry, ResourceType};
use crate::graph::FrameGraph;
use crate::types::RenderPassParams;

/// Render target resolved for a pass: concrete handle plus derived
/// parameters (clears, discard hints, dimensions).
#[derive(Debug, Clone, Copy)]
pub struct RenderTargetInfo {
    pub target: RenderTargetHandle,
    pub params: RenderPassParams,
}

/// Maps a pass's declared handles to concrete resources.
///
/// Handed to the pass's execute callback. Only resources the pass declared
/// during setup may be requested; anything else is a fatal programming
/// error.
pub struct FrameGraphPassResources<'a> {
    graph: &'a FrameGraph,
    pass: usize,
}

impl<'a> FrameGraphPassResources<'a> {
    pub(crate) fn new(graph: &'a FrameGraph, pass: usize) -> Self {
        Self { graph, pass }
    }

    /// Name of the executing pass.
    pub fn pass_name(&self) -> &str {
        &self.graph.passes[self.pass].name
    }

    /// Concrete resource behind a declared handle.
    pub fn get<T: ResourceType>(&self, id: FrameGraphId<T>) -> &T {
        let handle = id.handle();
        let pass = &self.graph.passes[self.pass];
        assert!(
            pass.declares(handle),
            "pass `{}` requested resource it did not declare",
            pass.name
        );
        let entry = self.entry::<T>(id);
        entry.concrete.as_ref().unwrap_or_else(|| {
            panic!(
                "resource `{}` has no concrete backing in pass `{}`",
                entry.base.name, pass.name
            )
        })
    }

    /// Convenience accessor for the driver handle of a texture resource.
    pub fn get_texture(&self, id: FrameGraphId<FrameGraphTexture>) -> TextureHandle {
        self.get(id).handle
    }

    /// Descriptor of a declared resource.
    pub fn descriptor<T: ResourceType>(&self, id: FrameGraphId<T>) -> &T::Descriptor {
        &self.entry::<T>(id).descriptor
    }

    /// Render target this pass declared over the given attachment.
    pub fn get_render_target(&self, id: FrameGraphId<FrameGraphTexture>) -> RenderTargetInfo {
        let handle = id.handle();
        let pass = &self.graph.passes[self.pass];
        for &rt_index in &pass.render_targets {
            let rt = &self.graph.render_targets[rt_index];
            let is_attachment = rt
                .desc
                .attachments
                .slots()
                .any(|(_, attachment)| attachment.handle() == handle);
            if !is_attachment {
                continue;
            }
            let cache = rt
                .cache
                .expect("render target was not assigned a concrete resource");
            let resource = &self.graph.render_target_cache[cache];
            let target = resource.concrete.unwrap_or_else(|| {
                panic!("render target `{}` is not realized", resource.name)
            });
            return RenderTargetInfo {
                target,
                params: RenderPassParams {
                    clear_flags: rt.clear_flags,
                    discard_start: rt.discard_start,
                    discard_end: rt.discard_end,
                    width: resource.width,
                    height: resource.height,
                    samples: resource.samples,
                },
            };
        }
        panic!(
            "pass `{}` declared no render target over the requested attachment",
            pass.name
        );
    }

    fn entry<T: ResourceType>(&self, id: FrameGraphId<T>) -> &ResourceEntry<T> {
        let node = &self.graph.nodes[id.handle().index()];
        let entry = &self.graph.entries[node.entry];
        entry
            .as_any()
            .downcast_ref::<ResourceEntry<T>>()
            .unwrap_or_else(|| {
                panic!(
                    "resource `{}` accessed through a handle of the wrong type",
                    entry.base().name
                )
            })
    }
}
