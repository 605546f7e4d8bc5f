//! Frame graph compilation.
//!
//! A single pass over the declared graph that:
//!
//! 1. Applies `move_resource` aliases (graph rewriting)
//! 2. Seeds reference counts from reads, writes and presents
//! 3. Culls passes and resource versions nobody observes
//! 4. Shrinks resource lifetimes to the exact interval of use
//! 5. Coalesces compatible render targets into shared backings
//! 6. Derives per-pass attachment discard hints
//!
//! Compilation does not reorder passes: survivors execute in registration
//! order, and the lifetime and discard computations rely on that total
//! order.

use std::collections::HashSet;

use crate::graph::resource::{FrameGraphTexture, ResourceEntry};
use crate::graph::target::{AttachmentEntries, RenderTargetResource};
use crate::graph::FrameGraph;
use crate::profiling::profile_function;
use crate::types::{TargetBufferFlags, TextureDescriptor};

/// Follow alias redirections to the node whose references count.
fn follow(redirects: &[usize], mut index: usize) -> usize {
    // Redirections form a forest except for pathological move cycles,
    // hence the bound.
    for _ in 0..redirects.len() {
        let next = redirects[index];
        if next == index {
            break;
        }
        index = next;
    }
    index
}

impl FrameGraph {
    /// Compile the graph: cull unreferenced passes and plan concrete
    /// resource assignment. Must be called once, before
    /// [`execute`](Self::execute).
    pub fn compile(&mut self) -> &mut Self {
        profile_function!();
        assert!(!self.compiled, "frame graph compiled twice");

        let redirects = self.resolve_aliases();
        self.count_references(&redirects);
        self.cull(&redirects);
        self.compute_lifetimes();
        self.coalesce_render_targets();
        self.derive_discard_flags();
        self.compiled = true;

        let culled = self.passes.iter().filter(|pass| pass.is_culled()).count();
        log::debug!(
            "compiled frame graph: {} passes ({} culled), {} resources, {} render targets ({} shared backings)",
            self.passes.len(),
            culled,
            self.entries.len(),
            self.render_targets.len(),
            self.render_target_cache.len(),
        );
        self
    }

    /// Apply recorded `move_resource` requests.
    ///
    /// Every node carrying `to`'s identity is retargeted onto `from`'s
    /// entry, so any handle that ever referred to `to` resolves to `from`'s
    /// resource. The writes that produced `to`'s versions are disconnected:
    /// their output is now observed under a different identity, so the
    /// producing passes lose those write references before counting.
    ///
    /// Returns a redirection table for reference counting: reads and
    /// presents recorded against a `to` version observe the moved-in
    /// version, and must keep *its* producer chain alive.
    fn resolve_aliases(&mut self) -> Vec<usize> {
        let mut redirects: Vec<usize> = (0..self.nodes.len()).collect();
        for k in 0..self.aliases.len() {
            let alias = self.aliases[k];
            let from_entry = self.nodes[alias.from.index()].entry;
            let to_entry = self.nodes[alias.to.index()].entry;
            if from_entry == to_entry {
                continue;
            }
            log::debug!(
                "moving resource `{}` over `{}`",
                self.entries[from_entry].base().name,
                self.entries[to_entry].base().name,
            );

            let nodes = &self.nodes;
            for pass in &mut self.passes {
                pass.writes
                    .retain(|handle| nodes[handle.index()].entry != to_entry);
            }
            for (index, node) in self.nodes.iter_mut().enumerate() {
                if node.entry == to_entry {
                    node.writer = None;
                    node.entry = from_entry;
                    redirects[index] = alias.from.index();
                }
            }
        }
        redirects
    }

    /// Seed reference counts: a node is referenced once per read and once
    /// per present; a pass once per surviving write plus one for a side
    /// effect.
    fn count_references(&mut self, redirects: &[usize]) {
        for node in &mut self.nodes {
            node.ref_count = 0;
        }
        for pass in &mut self.passes {
            pass.ref_count = pass.writes.len() as u32 + u32::from(pass.side_effect);
        }
        let nodes = &mut self.nodes;
        for pass in &self.passes {
            for handle in &pass.reads {
                nodes[follow(redirects, handle.index())].ref_count += 1;
            }
        }
        for handle in &self.presented {
            nodes[follow(redirects, handle.index())].ref_count += 1;
        }
    }

    /// Worklist culling to a fixpoint.
    ///
    /// Unreferenced nodes take a reference away from their producing pass;
    /// a pass dropping to zero returns the references it held on everything
    /// it read. Side-effect passes hold an extra reference and never drop.
    fn cull(&mut self, redirects: &[usize]) {
        let mut stack: Vec<usize> = (0..self.nodes.len())
            .filter(|&index| self.nodes[index].ref_count == 0)
            .collect();

        while let Some(index) = stack.pop() {
            let Some(writer) = self.nodes[index].writer else {
                continue;
            };
            // Each write node pops at most once, so the writer still holds
            // a reference for it here.
            let pass = &mut self.passes[writer];
            debug_assert!(pass.ref_count > 0);
            pass.ref_count -= 1;
            if pass.ref_count > 0 {
                continue;
            }
            log::debug!("culling pass `{}`", pass.name);
            for k in 0..self.passes[writer].reads.len() {
                let handle = self.passes[writer].reads[k];
                let target = follow(redirects, handle.index());
                let node = &mut self.nodes[target];
                if node.ref_count > 0 {
                    node.ref_count -= 1;
                    if node.ref_count == 0 {
                        stack.push(target);
                    }
                }
            }
        }
    }

    /// Compute `[first_use, last_use]` for every entry over the surviving
    /// passes, in registration order.
    fn compute_lifetimes(&mut self) {
        let nodes = &self.nodes;
        let entries = &mut self.entries;
        for (index, pass) in self.passes.iter().enumerate() {
            if pass.is_culled() {
                continue;
            }
            for handle in pass.reads.iter().chain(pass.writes.iter()) {
                let base = entries[nodes[handle.index()].entry].base_mut();
                if base.first_use.is_none() {
                    base.first_use = Some(index);
                }
                base.last_use = Some(index);
            }
        }
    }

    /// Assign each surviving render target declaration a concrete backing,
    /// sharing backings across declarations that are compatible.
    ///
    /// Two declarations share when their attachments resolve to the same
    /// entries (any version), or when their descriptors are structurally
    /// equal (same formats, dimensions and sample count) and the
    /// attachment lifetimes are disjoint, so the same GPU target can serve
    /// both without their contents colliding. Imported targets participate
    /// by identity only.
    fn coalesce_render_targets(&mut self) {
        for rt_index in 0..self.render_targets.len() {
            let pass = self.render_targets[rt_index].pass;
            if self.passes[pass].is_culled() {
                continue;
            }

            let samples = self.render_targets[rt_index].desc.samples;
            let attachments = self.member_attachments(rt_index);

            let found = (0..self.render_target_cache.len()).find(|&cache_index| {
                self.shares_backing(
                    &self.render_target_cache[cache_index],
                    &attachments,
                    samples,
                )
            });

            let cache_index = found.unwrap_or_else(|| {
                let (width, height) = self.attachment_extent(&attachments);
                let name = self.render_targets[rt_index].name.clone();
                self.render_target_cache.push(RenderTargetResource::transient(
                    &name,
                    width,
                    height,
                    samples,
                    attachments,
                ));
                self.render_target_cache.len() - 1
            });

            self.render_target_cache[cache_index].extend_lifetime(pass);
            self.render_targets[rt_index].cache = Some(cache_index);
        }
    }

    fn shares_backing(
        &self,
        cached: &RenderTargetResource,
        attachments: &AttachmentEntries,
        samples: u8,
    ) -> bool {
        if cached.samples != samples || !cached.attachments.same_shape(attachments) {
            return false;
        }
        // Same entries, possibly through different versions: one backing.
        if cached.attachments == *attachments {
            return true;
        }
        // Imported targets are someone else's surface; identity only.
        if cached.imported {
            return false;
        }
        // Structural match: slot-wise equal observable descriptors, and the
        // cached cohort's attachments must be dead before ours come alive.
        for ((_, cached_entry), (_, new_entry)) in
            cached.attachments.slots().zip(attachments.slots())
        {
            let cached_desc = self.texture_descriptor(cached_entry);
            let new_desc = self.texture_descriptor(new_entry);
            if cached_desc.format != new_desc.format
                || cached_desc.width != new_desc.width
                || cached_desc.height != new_desc.height
                || cached_desc.samples != new_desc.samples
            {
                return false;
            }
            let cached_base = self.entries[cached_entry].base();
            let new_base = self.entries[new_entry].base();
            match (cached_base.last_use, new_base.first_use) {
                (Some(last), Some(first)) if last < first => {}
                _ => return false,
            }
        }
        true
    }

    /// Derive per-declaration discard hints within each cohort.
    ///
    /// Only the cohort's first pass may discard at start (attachments it
    /// does not read; clearing implies discarding) and only its last pass
    /// may discard at end (attachments no later surviving pass reads and
    /// that are not presented). Imported targets override both boundaries
    /// with their caller-declared flags.
    fn derive_discard_flags(&mut self) {
        let presented_entries: HashSet<usize> = self
            .presented
            .iter()
            .map(|handle| self.nodes[handle.index()].entry)
            .collect();

        for cache_index in 0..self.render_target_cache.len() {
            let mut members: Vec<usize> = (0..self.render_targets.len())
                .filter(|&rt| self.render_targets[rt].cache == Some(cache_index))
                .collect();
            members.sort_by_key(|&rt| self.render_targets[rt].pass);

            let imported = self.render_target_cache[cache_index].imported;
            let count = members.len();
            for (position, &rt_index) in members.iter().enumerate() {
                let pass = self.render_targets[rt_index].pass;
                let clear_flags = self.render_targets[rt_index].clear_flags;
                let attachments = self.member_attachments(rt_index);

                // Clearing implies discarding whatever was there before.
                let mut start = clear_flags;
                if position == 0 {
                    for (flag, entry) in attachments.slots() {
                        if !self.pass_reads_entry(pass, entry) {
                            start |= flag;
                        }
                    }
                    if imported {
                        start = self.render_target_cache[cache_index].declared_discard_start;
                    }
                }

                let mut end = TargetBufferFlags::NONE;
                if position + 1 == count {
                    for (flag, entry) in attachments.slots() {
                        if !self.entry_read_after(entry, pass)
                            && !presented_entries.contains(&entry)
                        {
                            end |= flag;
                        }
                    }
                    if imported {
                        end = self.render_target_cache[cache_index].declared_discard_end;
                    }
                }

                let rt = &mut self.render_targets[rt_index];
                rt.discard_start = start;
                rt.discard_end = end;
            }
        }
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    fn member_attachments(&self, rt_index: usize) -> AttachmentEntries {
        let desc = &self.render_targets[rt_index].desc;
        AttachmentEntries {
            color: desc
                .attachments
                .color
                .map(|id| self.nodes[id.handle().index()].entry),
            depth: desc
                .attachments
                .depth
                .map(|id| self.nodes[id.handle().index()].entry),
            stencil: desc
                .attachments
                .stencil
                .map(|id| self.nodes[id.handle().index()].entry),
        }
    }

    fn pass_reads_entry(&self, pass: usize, entry: usize) -> bool {
        self.passes[pass]
            .reads
            .iter()
            .any(|handle| self.nodes[handle.index()].entry == entry)
    }

    fn entry_read_after(&self, entry: usize, pass: usize) -> bool {
        self.passes
            .iter()
            .enumerate()
            .skip(pass + 1)
            .filter(|(_, later)| !later.is_culled())
            .any(|(_, later)| {
                later
                    .reads
                    .iter()
                    .any(|handle| self.nodes[handle.index()].entry == entry)
            })
    }

    fn texture_descriptor(&self, entry: usize) -> &TextureDescriptor {
        &self.entries[entry]
            .as_any()
            .downcast_ref::<ResourceEntry<FrameGraphTexture>>()
            .expect("render target attachment is not a texture")
            .descriptor
    }

    fn attachment_extent(&self, attachments: &AttachmentEntries) -> (u32, u32) {
        let mut width = u32::MAX;
        let mut height = u32::MAX;
        for (_, entry) in attachments.slots() {
            let desc = self.texture_descriptor(entry);
            width = width.min(desc.width);
            height = height.min(desc.height);
        }
        if width == u32::MAX {
            (0, 0)
        } else {
            (width, height)
        }
    }
}
