//! Virtual resources: typed entries and versioned nodes.
//!
//! A [`ResourceEntry`] is the logical identity of a virtual resource: its
//! name, descriptor and (after resolution) concrete backing. A
//! [`ResourceNode`] is one *version* of an entry: every write produces a new
//! node against the same entry, so readers keep seeing the version that was
//! current when they declared the read.
//!
//! Entries live in an append-only vector owned by the frame graph (the
//! frame arena) behind the type-erased [`ErasedResourceEntry`] trait, with
//! `Any`-based downcasts back to the typed entry.

use std::any::Any;
use std::fmt;

use crate::allocator::ResourceAllocator;
use crate::driver::{Driver, TextureHandle};
use crate::types::{TextureDescriptor, TextureUsage};

/// Allocation hints accumulated from read declarations.
#[derive(Debug, Clone, Copy)]
pub struct ResourceHints {
    /// Whether any pass samples the resource, i.e. a sampleable view is
    /// required. Attachments only ever used as render targets clear this.
    pub needs_texture: bool,
}

/// A type usable as a virtual frame graph resource.
///
/// Implementations turn a descriptor into a concrete resource through the
/// allocator when the entry's lifetime begins, and hand it back when it
/// ends. [`FrameGraphTexture`] is the built-in implementation; clients with
/// their own resource kinds implement this trait for them.
pub trait ResourceType: 'static {
    type Descriptor: Clone + fmt::Debug + 'static;

    fn create(
        name: &str,
        desc: &Self::Descriptor,
        hints: ResourceHints,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    ) -> Self;

    fn destroy(
        self,
        desc: &Self::Descriptor,
        hints: ResourceHints,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    );
}

/// Built-in texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGraphTexture {
    pub handle: TextureHandle,
}

impl FrameGraphTexture {
    /// The descriptor the allocator actually sees: if no pass samples the
    /// texture, the sampleable-usage bit is dropped (advisory hint).
    fn allocation_descriptor(desc: &TextureDescriptor, hints: ResourceHints) -> TextureDescriptor {
        let mut desc = desc.clone();
        if !hints.needs_texture {
            desc.usage = desc.usage.without(TextureUsage::TEXTURE_BINDING);
        }
        desc
    }
}

impl ResourceType for FrameGraphTexture {
    type Descriptor = TextureDescriptor;

    fn create(
        name: &str,
        desc: &Self::Descriptor,
        hints: ResourceHints,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    ) -> Self {
        let desc = Self::allocation_descriptor(desc, hints);
        Self {
            handle: allocator.acquire_texture(driver, name, &desc),
        }
    }

    fn destroy(
        self,
        desc: &Self::Descriptor,
        hints: ResourceHints,
        allocator: &mut dyn ResourceAllocator,
        driver: &mut dyn Driver,
    ) {
        let desc = Self::allocation_descriptor(desc, hints);
        allocator.release_texture(driver, &desc, self.handle);
    }
}

/// State shared by every entry regardless of its resource type.
#[derive(Debug)]
pub(crate) struct EntryBase {
    pub name: String,
    pub id: u16,
    pub imported: bool,
    /// Latest version; handles to older versions are invalid.
    pub version: u16,
    /// Set when some pass reads the resource without the
    /// render-target-only hint.
    pub needs_texture: bool,
    /// First surviving pass using the entry, in registration order.
    pub first_use: Option<usize>,
    /// Last surviving pass using the entry, in registration order.
    pub last_use: Option<usize>,
}

impl EntryBase {
    fn new(name: &str, id: u16, imported: bool) -> Self {
        Self {
            name: name.to_string(),
            id,
            imported,
            version: 0,
            needs_texture: false,
            first_use: None,
            last_use: None,
        }
    }
}

/// Typed entry: descriptor plus the concrete resource once resolved.
pub(crate) struct ResourceEntry<T: ResourceType> {
    pub base: EntryBase,
    pub descriptor: T::Descriptor,
    pub concrete: Option<T>,
}

impl<T: ResourceType> ResourceEntry<T> {
    pub fn new(name: &str, id: u16, descriptor: T::Descriptor) -> Self {
        Self {
            base: EntryBase::new(name, id, false),
            descriptor,
            concrete: None,
        }
    }

    pub fn imported(name: &str, id: u16, descriptor: T::Descriptor, concrete: T) -> Self {
        Self {
            base: EntryBase::new(name, id, true),
            descriptor,
            concrete: Some(concrete),
        }
    }
}

/// Type-erased view of a [`ResourceEntry`] as stored in the frame arena.
pub(crate) trait ErasedResourceEntry: Any {
    fn base(&self) -> &EntryBase;
    fn base_mut(&mut self) -> &mut EntryBase;

    /// Bind the concrete resource at the start of the entry's lifetime.
    /// Imported entries already carry theirs and are left alone.
    fn resolve(&mut self, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver);

    /// Return the concrete resource at the end of the entry's lifetime.
    /// Imported entries are handed back to the caller untouched.
    fn release(&mut self, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ResourceType> ErasedResourceEntry for ResourceEntry<T> {
    fn base(&self) -> &EntryBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntryBase {
        &mut self.base
    }

    fn resolve(&mut self, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver) {
        if self.base.imported || self.concrete.is_some() {
            return;
        }
        log::trace!("resolving resource `{}`", self.base.name);
        let hints = ResourceHints {
            needs_texture: self.base.needs_texture,
        };
        self.concrete = Some(T::create(
            &self.base.name,
            &self.descriptor,
            hints,
            allocator,
            driver,
        ));
    }

    fn release(&mut self, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver) {
        if self.base.imported {
            return;
        }
        if let Some(concrete) = self.concrete.take() {
            log::trace!("releasing resource `{}`", self.base.name);
            let hints = ResourceHints {
                needs_texture: self.base.needs_texture,
            };
            T::destroy(concrete, &self.descriptor, hints, allocator, driver);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One version of a resource entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResourceNode {
    /// Index of the entry this version belongs to. Rewritten during alias
    /// resolution: after `move_resource(from, to)`, nodes of `to`'s entry
    /// point at `from`'s.
    pub entry: usize,
    pub version: u16,
    /// Pass that produced this version, if any.
    pub writer: Option<usize>,
    /// Reads plus presents against this version; filled in by compile.
    pub ref_count: u32,
}

impl ResourceNode {
    pub fn new(entry: usize, version: u16) -> Self {
        Self {
            entry,
            version,
            writer: None,
            ref_count: 0,
        }
    }

    pub fn is_culled(&self) -> bool {
        self.ref_count == 0
    }
}
