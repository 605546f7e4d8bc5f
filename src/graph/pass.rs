//! Pass nodes and type-erased pass executors.

use crate::driver::Driver;
use crate::graph::handle::FrameGraphHandle;
use crate::graph::resources::FrameGraphPassResources;

/// A registered pass: its declared edges and culling state.
///
/// The execute callback lives in a parallel vector on the frame graph as a
/// boxed [`PassExecutor`], so the node itself stays cheap to scan during
/// compilation.
#[derive(Debug)]
pub(crate) struct PassNode {
    pub name: String,
    /// Resource versions this pass depends on.
    pub reads: Vec<FrameGraphHandle>,
    /// Resource versions this pass produces.
    pub writes: Vec<FrameGraphHandle>,
    /// Render targets declared by this pass, by index into the graph's list.
    pub render_targets: Vec<usize>,
    /// Writes plus one for a side effect; filled in by compile.
    pub ref_count: u32,
    /// Forces survival through culling.
    pub side_effect: bool,
}

impl PassNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reads: Vec::new(),
            writes: Vec::new(),
            render_targets: Vec::new(),
            ref_count: 0,
            side_effect: false,
        }
    }

    pub fn reads_node(&self, handle: FrameGraphHandle) -> bool {
        self.reads.contains(&handle)
    }

    pub fn writes_node(&self, handle: FrameGraphHandle) -> bool {
        self.writes.contains(&handle)
    }

    /// Whether the pass declared the resource version at all.
    pub fn declares(&self, handle: FrameGraphHandle) -> bool {
        self.reads_node(handle) || self.writes_node(handle)
    }

    pub fn is_culled(&self) -> bool {
        self.ref_count == 0 && !self.side_effect
    }
}

/// Type-erased pass execute callback.
pub(crate) trait PassExecutor {
    fn execute(&mut self, resources: &FrameGraphPassResources<'_>, driver: &mut dyn Driver);
}

/// A pass's data struct paired with its execute closure.
///
/// The closure is `FnOnce` and consumed by execution; the `Option` lets the
/// boxed pass hand it out by value. The data struct was filled in by the
/// setup callback and is borrowed by the closure at execute time.
pub(crate) struct FrameGraphPass<D, E>
where
    E: for<'a> FnOnce(&FrameGraphPassResources<'a>, &D, &mut dyn Driver),
{
    data: D,
    execute: Option<E>,
}

impl<D, E> FrameGraphPass<D, E>
where
    E: for<'a> FnOnce(&FrameGraphPassResources<'a>, &D, &mut dyn Driver),
{
    pub fn new(data: D, execute: E) -> Self {
        Self {
            data,
            execute: Some(execute),
        }
    }
}

impl<D, E> PassExecutor for FrameGraphPass<D, E>
where
    E: for<'a> FnOnce(&FrameGraphPassResources<'a>, &D, &mut dyn Driver),
{
    fn execute(&mut self, resources: &FrameGraphPassResources<'_>, driver: &mut dyn Driver) {
        let execute = self
            .execute
            .take()
            .expect("pass executor invoked more than once");
        execute(resources, &self.data, driver);
    }
}
