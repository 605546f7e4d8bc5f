//! Frame graph execution.
//!
//! Walks surviving passes in registration order. Concrete resources are
//! acquired exactly when a lifetime interval begins and released exactly
//! when it ends, so transient resources with disjoint lifetimes can alias
//! through the allocator's pool. The driver is flushed after every pass.

use std::sync::Arc;

use crate::allocator::ResourceAllocator;
use crate::driver::{Driver, Engine, RenderTargetSpec, TargetAttachments};
use crate::graph::resource::{FrameGraphTexture, ResourceEntry};
use crate::graph::resources::FrameGraphPassResources;
use crate::graph::FrameGraph;
use crate::profiling::profile_function;

impl FrameGraph {
    /// Execute all surviving passes and flush the driver after each.
    ///
    /// Consumes the frame: the graph's arena is reset afterward, and
    /// imported resources are back in their callers' hands untouched.
    pub fn execute(&mut self, driver: &mut dyn Driver) {
        self.execute_internal(driver, None);
    }

    /// Like [`execute`](Self::execute), additionally flushing the host
    /// engine between passes.
    pub fn execute_with_engine(&mut self, engine: &mut dyn Engine, driver: &mut dyn Driver) {
        self.execute_internal(driver, Some(engine));
    }

    fn execute_internal(&mut self, driver: &mut dyn Driver, mut engine: Option<&mut dyn Engine>) {
        profile_function!();
        assert!(self.compiled, "execute() called before compile()");

        let allocator = Arc::clone(&self.allocator);
        let mut allocator = allocator.lock();

        for index in 0..self.passes.len() {
            if self.passes[index].is_culled() {
                continue;
            }
            log::trace!("executing pass `{}`", self.passes[index].name);

            for entry in &mut self.entries {
                if entry.base().first_use == Some(index) {
                    entry.resolve(&mut *allocator, driver);
                }
            }
            self.realize_render_targets(index, &mut *allocator, driver);

            let mut executor = self.executors[index]
                .take()
                .expect("pass executor already consumed");
            {
                let resources = FrameGraphPassResources::new(self, index);
                executor.execute(&resources, driver);
            }
            driver.flush();
            if let Some(engine) = engine.as_deref_mut() {
                engine.flush();
            }

            for entry in &mut self.entries {
                if entry.base().last_use == Some(index) {
                    entry.release(&mut *allocator, driver);
                }
            }
            self.release_render_targets(index, &mut *allocator, driver);
        }

        drop(allocator);
        self.reset();
    }

    /// Acquire concrete render targets for cohorts starting at this pass.
    /// Imported targets already carry their handle and are skipped.
    fn realize_render_targets(
        &mut self,
        pass: usize,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    ) {
        for cache_index in 0..self.render_target_cache.len() {
            {
                let resource = &self.render_target_cache[cache_index];
                if resource.first_use != Some(pass) || resource.concrete.is_some() {
                    continue;
                }
            }
            let spec = self.render_target_spec(cache_index);
            let name = self.render_target_cache[cache_index].name.clone();
            let handle = allocator.acquire_render_target(driver, &name, &spec);
            log::trace!("render target `{}` realized as {:?}", name, handle);
            let resource = &mut self.render_target_cache[cache_index];
            resource.concrete = Some(handle);
            resource.spec = Some(spec);
        }
    }

    /// Release cohorts ending at this pass, with the spec they were
    /// acquired under.
    fn release_render_targets(
        &mut self,
        pass: usize,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    ) {
        for resource in &mut self.render_target_cache {
            if resource.last_use != Some(pass) || resource.imported {
                continue;
            }
            if let (Some(handle), Some(spec)) = (resource.concrete.take(), resource.spec.take()) {
                log::trace!("render target `{}` released", resource.name);
                allocator.release_render_target(driver, &spec, handle);
            }
        }
    }

    fn render_target_spec(&self, cache_index: usize) -> RenderTargetSpec {
        let resource = &self.render_target_cache[cache_index];
        let texture = |entry: Option<usize>| {
            entry.map(|entry| {
                self.entries[entry]
                    .as_any()
                    .downcast_ref::<ResourceEntry<FrameGraphTexture>>()
                    .expect("render target attachment is not a texture")
                    .concrete
                    .expect("attachment texture is not resolved")
                    .handle
            })
        };
        RenderTargetSpec {
            attachments: TargetAttachments {
                color: texture(resource.attachments.color),
                depth: texture(resource.attachments.depth),
                stencil: texture(resource.attachments.stencil),
            },
            width: resource.width,
            height: resource.height,
            samples: resource.samples,
        }
    }
}
