//! Concrete resource acquisition and release.
//!
//! The frame graph acquires backing resources when a virtual resource's
//! lifetime begins and releases them when it ends. It does so through the
//! [`ResourceAllocator`] trait so the pooling policy stays pluggable. The
//! in-tree [`PooledAllocator`] keeps released textures in descriptor-keyed
//! free lists; since lifetimes are shrunk to the exact interval of use,
//! resources with disjoint lifetimes naturally alias the same GPU memory.
//!
//! One allocator is typically shared by every frame graph in the process
//! (one graph per rendering thread), wrapped in
//! `Arc<parking_lot::Mutex<_>>`; see [`SharedAllocator`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{Driver, RenderTargetHandle, RenderTargetSpec, TextureHandle};
use crate::types::TextureDescriptor;

/// A thread-safe allocator shared between frame graphs.
pub type SharedAllocator = Arc<Mutex<dyn ResourceAllocator>>;

/// Allocation strategy for concrete textures and render targets.
///
/// The frame graph guarantees call symmetry: every acquire is matched by
/// exactly one release with the same descriptor, in lifetime order.
/// Implementations are free to pool or to create fresh resources every time.
pub trait ResourceAllocator: Send {
    /// Acquire a texture matching `desc`.
    fn acquire_texture(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        desc: &TextureDescriptor,
    ) -> TextureHandle;

    /// Release a texture previously acquired with the same descriptor.
    fn release_texture(
        &mut self,
        driver: &mut dyn Driver,
        desc: &TextureDescriptor,
        texture: TextureHandle,
    );

    /// Acquire a render target over concrete attachments.
    fn acquire_render_target(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        spec: &RenderTargetSpec,
    ) -> RenderTargetHandle;

    /// Release a render target previously acquired with the same spec.
    fn release_render_target(
        &mut self,
        driver: &mut dyn Driver,
        spec: &RenderTargetSpec,
        target: RenderTargetHandle,
    );
}

/// Descriptor-keyed pooling allocator.
///
/// Released textures go to a free list keyed by their descriptor and are
/// handed back on the next acquire with an equal descriptor. Render targets
/// are created and destroyed through the driver directly: they are cheap
/// attachment views, and the frame graph already coalesces them.
#[derive(Default)]
pub struct PooledAllocator {
    free_textures: HashMap<TextureDescriptor, Vec<TextureHandle>>,
}

impl PooledAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pooled allocator ready for sharing between frame graphs.
    pub fn shared() -> SharedAllocator {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Destroy every pooled texture. Call at teardown, or periodically to
    /// bound pool growth after a resolution change.
    pub fn purge(&mut self, driver: &mut dyn Driver) {
        for (desc, handles) in self.free_textures.drain() {
            log::debug!(
                "purging {} pooled texture(s) {}x{} {:?}",
                handles.len(),
                desc.width,
                desc.height,
                desc.format
            );
            for handle in handles {
                driver.destroy_texture(handle);
            }
        }
    }

    /// Number of textures currently sitting in the pool.
    pub fn pooled_count(&self) -> usize {
        self.free_textures.values().map(Vec::len).sum()
    }
}

impl ResourceAllocator for PooledAllocator {
    fn acquire_texture(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        desc: &TextureDescriptor,
    ) -> TextureHandle {
        if let Some(handle) = self.free_textures.get_mut(desc).and_then(Vec::pop) {
            log::trace!("texture `{}` reuses pooled {:?}", name, handle);
            return handle;
        }
        let handle = driver.create_texture(name, desc);
        log::trace!("texture `{}` created as {:?}", name, handle);
        handle
    }

    fn release_texture(
        &mut self,
        _driver: &mut dyn Driver,
        desc: &TextureDescriptor,
        texture: TextureHandle,
    ) {
        log::trace!("texture {:?} returned to pool", texture);
        self.free_textures.entry(desc.clone()).or_default().push(texture);
    }

    fn acquire_render_target(
        &mut self,
        driver: &mut dyn Driver,
        name: &str,
        spec: &RenderTargetSpec,
    ) -> RenderTargetHandle {
        driver.create_render_target(name, spec)
    }

    fn release_render_target(
        &mut self,
        driver: &mut dyn Driver,
        _spec: &RenderTargetSpec,
        target: RenderTargetHandle,
    ) {
        driver.destroy_render_target(target);
    }
}
