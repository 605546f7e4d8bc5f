//! Frame graph core.
//!
//! A frame graph describes one frame's worth of rendering work as passes
//! reading and writing virtual resources. Passes declare their resource use
//! in a synchronous *setup* callback; the graph is then compiled (culling,
//! lifetime analysis, render target coalescing) and executed (resource
//! resolution, callback invocation, driver flushing) in declaration order.
//!
//! # Architecture
//!
//! | Stage | Entry point | Purpose |
//! |-------|-------------|---------|
//! | Build | [`FrameGraph::add_pass`] | Declare passes and resource edges |
//! | Compile | [`FrameGraph::compile`] | Cull, plan lifetimes, coalesce targets |
//! | Execute | [`FrameGraph::execute`] | Run surviving passes against the driver |
//!
//! # Example
//!
//! ```ignore
//! let mut fg = FrameGraph::new(PooledAllocator::shared());
//!
//! #[derive(Default)]
//! struct ColorData {
//!     output: Option<FrameGraphId<FrameGraphTexture>>,
//! }
//!
//! fg.add_pass(
//!     "color",
//!     |builder, data: &mut ColorData| {
//!         let desc = TextureDescriptor::new_2d(
//!             1024, 1024,
//!             TextureFormat::Rgba8Unorm,
//!             TextureUsage::RENDER_ATTACHMENT,
//!         );
//!         let color = builder.create_texture("color", desc);
//!         data.output = Some(builder.use_as_render_target(color, TargetBufferFlags::COLOR));
//!     },
//!     move |resources, data, driver| {
//!         let info = resources.get_render_target(data.output.unwrap());
//!         // record draw commands against info.target ...
//!     },
//! );
//!
//! fg.present(output);
//! fg.compile().execute(&mut driver);
//! ```

mod compile;
mod execute;
mod graphviz;
mod handle;
mod pass;
mod resource;
mod resources;
mod target;

pub use handle::{FrameGraphHandle, FrameGraphId};
pub use resource::{FrameGraphTexture, ResourceHints, ResourceType};
pub use resources::{FrameGraphPassResources, RenderTargetInfo};
pub use target::{RenderTargetAttachments, RenderTargetDescriptor};

use crate::allocator::SharedAllocator;
use crate::driver::{Driver, RenderTargetHandle, TextureHandle};
use crate::graph::pass::{FrameGraphPass, PassExecutor, PassNode};
use crate::graph::resource::{ErasedResourceEntry, ResourceEntry, ResourceNode};
use crate::graph::target::{AttachmentEntries, RenderTarget, RenderTargetResource};
use crate::types::{TargetBufferFlags, TextureDescriptor};

/// Upper bound on the captured state of an execute closure.
///
/// Execute callbacks are stored for the whole frame; anything bigger than
/// this should live in the pass's data struct instead.
pub const MAX_EXECUTOR_SIZE: usize = 1024;

/// Reference to a registered pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassRef {
    index: usize,
}

/// A `move_resource` request, applied during compilation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Alias {
    pub from: FrameGraphHandle,
    pub to: FrameGraphHandle,
}

/// The frame graph. See the [module documentation](self) for an overview.
///
/// All nodes, entries, passes and render targets live in append-only
/// vectors scoped to one frame (the frame arena); [`execute`](Self::execute)
/// drops them all at once. The graph is single-threaded; multiple graphs
/// may share one allocator across threads.
pub struct FrameGraph {
    pub(crate) allocator: SharedAllocator,
    pub(crate) passes: Vec<PassNode>,
    pub(crate) executors: Vec<Option<Box<dyn PassExecutor>>>,
    pub(crate) nodes: Vec<ResourceNode>,
    pub(crate) entries: Vec<Box<dyn ErasedResourceEntry>>,
    pub(crate) render_targets: Vec<RenderTarget>,
    pub(crate) render_target_cache: Vec<RenderTargetResource>,
    pub(crate) aliases: Vec<Alias>,
    pub(crate) presented: Vec<FrameGraphHandle>,
    pub(crate) compiled: bool,
    next_entry_id: u16,
}

impl FrameGraph {
    /// Create an empty frame graph backed by the given allocator.
    pub fn new(allocator: SharedAllocator) -> Self {
        Self {
            allocator,
            passes: Vec::new(),
            executors: Vec::new(),
            nodes: Vec::new(),
            entries: Vec::new(),
            render_targets: Vec::new(),
            render_target_cache: Vec::new(),
            aliases: Vec::new(),
            presented: Vec::new(),
            compiled: false,
            next_entry_id: 0,
        }
    }

    /// Add a pass to the frame graph.
    ///
    /// `setup` runs synchronously, right here, and declares the pass's
    /// resource use through the [`Builder`]; it may borrow freely from the
    /// caller. `execute` runs later, from [`execute`](Self::execute), and
    /// must capture by value; its captured state is bounded by
    /// [`MAX_EXECUTOR_SIZE`]. Anything larger belongs in the `Data` struct,
    /// which `setup` fills and `execute` receives back.
    pub fn add_pass<Data, Setup, Execute>(
        &mut self,
        name: &str,
        setup: Setup,
        execute: Execute,
    ) -> PassRef
    where
        Data: Default + 'static,
        Setup: FnOnce(&mut Builder<'_>, &mut Data),
        Execute: for<'a> FnOnce(&FrameGraphPassResources<'a>, &Data, &mut dyn Driver) + 'static,
    {
        const {
            assert!(
                std::mem::size_of::<Execute>() < MAX_EXECUTOR_SIZE,
                "execute closure is capturing too much data"
            );
        }

        let index = self.passes.len();
        self.passes.push(PassNode::new(name));

        let mut data = Data::default();
        {
            let mut builder = Builder {
                graph: self,
                pass: index,
            };
            setup(&mut builder, &mut data);
        }

        self.executors
            .push(Some(Box::new(FrameGraphPass::new(data, execute))));
        debug_assert_eq!(self.executors.len(), self.passes.len());

        PassRef { index }
    }

    /// Add a reference to a resource version, preventing its producers from
    /// being culled. This is how a frame's final outputs are marked.
    pub fn present<T: ResourceType>(&mut self, id: FrameGraphId<T>) {
        let handle = id.handle();
        self.assert_valid(handle);
        self.presented.push(handle);
    }

    /// Wrap a caller-owned concrete resource as a virtual one.
    ///
    /// Imported resources are never passed to the allocator, and writing to
    /// them marks the writing pass as a side effect.
    pub fn import<T: ResourceType>(
        &mut self,
        name: &str,
        desc: T::Descriptor,
        resource: T,
    ) -> FrameGraphId<T> {
        let entry_index = self.entries.len();
        let id = self.next_entry_id();
        self.entries
            .push(Box::new(ResourceEntry::<T>::imported(name, id, desc, resource)));
        FrameGraphId::new(self.push_node(entry_index, 0))
    }

    /// Import a write-only render target from outside the frame graph.
    ///
    /// The returned handle stands for the target's color surface; it cannot
    /// be sampled. The declared discard flags survive compilation untouched
    /// and reach the pass that renders into the target.
    pub fn import_render_target(
        &mut self,
        name: &str,
        desc: TextureDescriptor,
        target: RenderTargetHandle,
        width: u32,
        height: u32,
        discard_start: TargetBufferFlags,
        discard_end: TargetBufferFlags,
    ) -> FrameGraphId<FrameGraphTexture> {
        let samples = desc.samples;
        let id = self.import::<FrameGraphTexture>(
            name,
            desc,
            FrameGraphTexture {
                handle: TextureHandle::NULL,
            },
        );
        let entry = self.nodes[id.handle().index()].entry;
        self.render_target_cache.push(RenderTargetResource::imported(
            name,
            width,
            height,
            samples,
            AttachmentEntries {
                color: Some(entry),
                depth: None,
                stencil: None,
            },
            target,
            discard_start,
            discard_end,
        ));
        id
    }

    /// Move the resource behind `from` onto the identity of `to`.
    ///
    /// After compilation every handle that ever referred to `to`, past or
    /// future, resolves to `from`'s resource, and the passes that produced
    /// `to`'s versions lose those write references. Returns a fresh handle
    /// for `from` and invalidates the old one, as a write would.
    pub fn move_resource<T: ResourceType>(
        &mut self,
        from: FrameGraphId<T>,
        to: FrameGraphId<T>,
    ) -> FrameGraphId<T> {
        self.assert_valid(from.handle());
        self.assert_valid(to.handle());
        self.aliases.push(Alias {
            from: from.handle(),
            to: to.handle(),
        });

        // Behaves like a write: bump the version so stale handles die.
        let entry_index = self.nodes[from.handle().index()].entry;
        let version = {
            let base = self.entries[entry_index].base_mut();
            base.version += 1;
            base.version
        };
        FrameGraphId::new(self.push_node(entry_index, version))
    }

    /// Whether the handle still refers to the latest version of its
    /// resource. Handles are invalidated by writes.
    pub fn is_valid<T: ResourceType>(&self, id: FrameGraphId<T>) -> bool {
        self.handle_is_valid(id.handle())
    }

    /// Descriptor of the resource behind a handle. The handle must be valid.
    pub fn descriptor<T: ResourceType>(&self, id: FrameGraphId<T>) -> &T::Descriptor {
        self.assert_valid(id.handle());
        &self.typed_entry::<T>(id.handle()).descriptor
    }

    /// Name of the resource behind a handle (any version).
    pub fn name_of<T: ResourceType>(&self, id: FrameGraphId<T>) -> &str {
        &self.entry_base(id.handle()).name
    }

    /// Number of registered passes, surviving or not.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Whether the pass survived culling. Only meaningful after
    /// [`compile`](Self::compile).
    pub fn is_pass_culled(&self, pass: PassRef) -> bool {
        self.passes[pass.index].is_culled()
    }

    // ------------------------------------------------------------------
    // internals shared with Builder and the compile/execute stages
    // ------------------------------------------------------------------

    pub(crate) fn create_entry<T: ResourceType>(
        &mut self,
        name: &str,
        desc: T::Descriptor,
    ) -> FrameGraphId<T> {
        let entry_index = self.entries.len();
        let id = self.next_entry_id();
        self.entries
            .push(Box::new(ResourceEntry::<T>::new(name, id, desc)));
        FrameGraphId::new(self.push_node(entry_index, 0))
    }

    pub(crate) fn push_node(&mut self, entry: usize, version: u16) -> FrameGraphHandle {
        let handle = FrameGraphHandle::new(self.nodes.len());
        self.nodes.push(ResourceNode::new(entry, version));
        handle
    }

    pub(crate) fn handle_is_valid(&self, handle: FrameGraphHandle) -> bool {
        let Some(node) = self.nodes.get(handle.index()) else {
            return false;
        };
        node.version == self.entries[node.entry].base().version
    }

    pub(crate) fn assert_valid(&self, handle: FrameGraphHandle) {
        assert!(
            self.handle_is_valid(handle),
            "use of an invalid frame graph handle (resource `{}` was written since)",
            self.nodes
                .get(handle.index())
                .map(|node| self.entries[node.entry].base().name.as_str())
                .unwrap_or("<unknown>")
        );
    }

    pub(crate) fn entry_base(&self, handle: FrameGraphHandle) -> &crate::graph::resource::EntryBase {
        self.entries[self.nodes[handle.index()].entry].base()
    }

    pub(crate) fn typed_entry<T: ResourceType>(&self, handle: FrameGraphHandle) -> &ResourceEntry<T> {
        let entry = &self.entries[self.nodes[handle.index()].entry];
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

    fn next_entry_id(&mut self) -> u16 {
        let id = self.next_entry_id;
        self.next_entry_id = self
            .next_entry_id
            .checked_add(1)
            .expect("too many resource entries");
        id
    }

    /// Drop the frame's arena. Imported concretes are left untouched; the
    /// caller still owns them.
    pub(crate) fn reset(&mut self) {
        self.passes.clear();
        self.executors.clear();
        self.nodes.clear();
        self.entries.clear();
        self.render_targets.clear();
        self.render_target_cache.clear();
        self.aliases.clear();
        self.presented.clear();
        self.compiled = false;
        self.next_entry_id = 0;
    }
}

/// Declares a pass's resource use during setup.
///
/// Handed to the setup callback of [`FrameGraph::add_pass`]; every method
/// records edges against the pass under construction.
pub struct Builder<'a> {
    graph: &'a mut FrameGraph,
    pass: usize,
}

impl Builder<'_> {
    /// Create a virtual resource. It becomes concrete only if the pass
    /// survives culling, and only for the interval it is actually used.
    pub fn create<T: ResourceType>(&mut self, name: &str, desc: T::Descriptor) -> FrameGraphId<T> {
        self.graph.create_entry(name, desc)
    }

    /// Helper to create a texture resource.
    pub fn create_texture(
        &mut self,
        name: &str,
        desc: TextureDescriptor,
    ) -> FrameGraphId<FrameGraphTexture> {
        self.create::<FrameGraphTexture>(name, desc)
    }

    /// Declare that this pass reads a resource version.
    ///
    /// Reading does not invalidate the handle; the same handle is returned
    /// for convenience.
    pub fn read<T: ResourceType>(&mut self, id: FrameGraphId<T>) -> FrameGraphId<T> {
        self.read_impl(id.handle(), true);
        id
    }

    /// Declare a read of a texture used purely as a render target
    /// attachment: no sampleable view is required. Advisory hint to the
    /// allocator.
    pub fn read_attachment(
        &mut self,
        id: FrameGraphId<FrameGraphTexture>,
    ) -> FrameGraphId<FrameGraphTexture> {
        self.read_impl(id.handle(), false);
        id
    }

    /// Declare that this pass produces a new version of a resource.
    ///
    /// The given handle becomes invalid; the returned handle refers to the
    /// new version. Writing to an imported resource marks the pass as a
    /// side effect.
    pub fn write<T: ResourceType>(&mut self, id: FrameGraphId<T>) -> FrameGraphId<T> {
        let handle = id.handle();
        self.graph.assert_valid(handle);

        let node = self.graph.nodes[handle.index()];
        if node.writer == Some(self.pass) {
            // Writing twice from the same pass keeps the same version.
            return id;
        }

        let entry_index = node.entry;
        let version = {
            let base = self.graph.entries[entry_index].base_mut();
            base.version += 1;
            base.version
        };
        let new_handle = self.graph.push_node(entry_index, version);
        self.graph.nodes[new_handle.index()].writer = Some(self.pass);
        self.graph.passes[self.pass].writes.push(new_handle);

        if self.graph.entries[entry_index].base().imported {
            self.graph.passes[self.pass].side_effect = true;
        }

        FrameGraphId::new(new_handle)
    }

    /// Register a render target owned by this pass.
    ///
    /// Every attachment in `desc` must already have been read or written by
    /// this pass, with a format matching its slot.
    pub fn create_render_target(
        &mut self,
        name: &str,
        desc: RenderTargetDescriptor,
        clear_flags: TargetBufferFlags,
    ) {
        let pass = &self.graph.passes[self.pass];
        for (slot, attachment) in desc.attachments.slots() {
            assert!(
                pass.declares(attachment.handle()),
                "render target `{}` references an attachment not read or written by pass `{}`",
                name,
                pass.name
            );
            let format = self
                .graph
                .typed_entry::<FrameGraphTexture>(attachment.handle())
                .descriptor
                .format;
            assert!(
                format.aspects().contains(slot),
                "render target `{}` attachment `{}` cannot back its {:?} slot",
                name,
                self.graph.name_of(attachment),
                slot
            );
        }
        let index = self.graph.render_targets.len();
        self.graph
            .render_targets
            .push(RenderTarget::new(name, desc, clear_flags, self.pass));
        self.graph.passes[self.pass].render_targets.push(index);
    }

    /// Helper for the common single-color-attachment case: writes the
    /// texture and declares a render target over the new version in one
    /// step. Returns the post-write handle.
    pub fn use_as_render_target(
        &mut self,
        texture: FrameGraphId<FrameGraphTexture>,
        clear_flags: TargetBufferFlags,
    ) -> FrameGraphId<FrameGraphTexture> {
        let output = self.write(texture);
        let name = self.graph.entry_base(output.handle()).name.clone();
        self.create_render_target(
            &name,
            RenderTargetDescriptor {
                attachments: RenderTargetAttachments::color(output),
                samples: 1,
            },
            clear_flags,
        );
        output
    }

    /// Declare that this pass has side effects outside the frame graph and
    /// must not be culled.
    pub fn side_effect(&mut self) -> &mut Self {
        self.graph.passes[self.pass].side_effect = true;
        self
    }

    /// Name of the pass being built.
    pub fn pass_name(&self) -> &str {
        &self.graph.passes[self.pass].name
    }

    /// Name of the resource behind a handle.
    pub fn name_of<T: ResourceType>(&self, id: FrameGraphId<T>) -> &str {
        self.graph.name_of(id)
    }

    /// Descriptor of the resource behind a handle.
    pub fn descriptor<T: ResourceType>(&self, id: FrameGraphId<T>) -> &T::Descriptor {
        &self.graph.typed_entry::<T>(id.handle()).descriptor
    }

    /// Sample count of the render target the texture is attached to, or 1
    /// if it is not an attachment.
    pub fn samples(&self, id: FrameGraphId<FrameGraphTexture>) -> u8 {
        self.find_render_target(id)
            .map(|rt| rt.desc.samples)
            .unwrap_or(1)
    }

    /// Whether the texture is an attachment of some declared render target.
    pub fn is_attachment(&self, id: FrameGraphId<FrameGraphTexture>) -> bool {
        self.find_render_target(id).is_some()
    }

    /// Descriptor of the render target the attachment belongs to.
    pub fn render_target_descriptor(
        &self,
        id: FrameGraphId<FrameGraphTexture>,
    ) -> &RenderTargetDescriptor {
        &self
            .find_render_target(id)
            .expect("texture is not a render target attachment")
            .desc
    }

    fn read_impl(&mut self, handle: FrameGraphHandle, needs_texture: bool) {
        self.graph.assert_valid(handle);
        if needs_texture {
            let entry = self.graph.nodes[handle.index()].entry;
            self.graph.entries[entry].base_mut().needs_texture = true;
        }
        let pass = &mut self.graph.passes[self.pass];
        if !pass.reads_node(handle) {
            pass.reads.push(handle);
        }
    }

    fn find_render_target(&self, id: FrameGraphId<FrameGraphTexture>) -> Option<&RenderTarget> {
        let handle = id.handle();
        self.graph.render_targets.iter().find(|rt| {
            rt.desc
                .attachments
                .slots()
                .any(|(_, attachment)| attachment.handle() == handle)
        })
    }
}
