//! Handles identifying versions of virtual resources.

use std::fmt;
use std::marker::PhantomData;

use crate::graph::resource::ResourceType;

/// Untyped handle to a resource version.
///
/// Indexes a resource node inside the frame graph that issued it. A handle
/// is valid from creation until the node's entry is written again; writing
/// yields a fresh handle for the next version and invalidates this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGraphHandle {
    index: u16,
}

impl FrameGraphHandle {
    pub(crate) fn new(index: usize) -> Self {
        assert!(index <= u16::MAX as usize, "too many resource nodes");
        Self {
            index: index as u16,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

/// Typed handle to a resource version.
///
/// Carries the resource type as a phantom parameter so that reads, writes
/// and descriptor lookups of mismatched types are rejected at compile time.
/// `FrameGraphId` is `Copy` and cheap to pass around; it is only meaningful
/// within the frame graph that created it.
pub struct FrameGraphId<T: ResourceType> {
    handle: FrameGraphHandle,
    marker: PhantomData<fn() -> T>,
}

impl<T: ResourceType> FrameGraphId<T> {
    pub(crate) fn new(handle: FrameGraphHandle) -> Self {
        Self {
            handle,
            marker: PhantomData,
        }
    }

    /// The untyped handle identifying the same resource version.
    pub fn handle(self) -> FrameGraphHandle {
        self.handle
    }
}

// Manual impls: derives would put bounds on T, which is only a marker here.
impl<T: ResourceType> Clone for FrameGraphId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ResourceType> Copy for FrameGraphId<T> {}

impl<T: ResourceType> PartialEq for FrameGraphId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: ResourceType> Eq for FrameGraphId<T> {}

impl<T: ResourceType> fmt::Debug for FrameGraphId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrameGraphId").field(&self.handle).finish()
    }
}

impl<T: ResourceType> From<FrameGraphId<T>> for FrameGraphHandle {
    fn from(id: FrameGraphId<T>) -> Self {
        id.handle
    }
}
