use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::collections::ordered::IndexMap;
use crate::context::ContextScope;
use crate::element::VNode;
use crate::error::RenderError;
use crate::events::{EventRegistry, NativeEvent};
use crate::host::{HostNodeId, HostTree};
use crate::reconciler::MountedNode;
use crate::scheduler::Scheduler;

/// State shared by everything mounted through one [`Runtime`].
pub(crate) struct RuntimeInner {
    host: RefCell<Box<dyn HostTree>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) events: EventRegistry,
    /// Providers enclosing the subtree currently being reconciled.
    pub(crate) context: RefCell<ContextScope>,
    roots: RefCell<IndexMap<HostNodeId, MountedNode>>,
    pub(crate) self_ref: Weak<RuntimeInner>,
}

impl RuntimeInner {
    /// Runs `f` against the host tree. `f` must not call back into the
    /// runtime.
    pub(crate) fn with_host<R>(&self, f: impl FnOnce(&mut dyn HostTree) -> R) -> R {
        let mut host = self.host.borrow_mut();
        f(host.as_mut())
    }
}

/// Entry point: owns the host tree and the trees rendered into it.
///
/// Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(host: impl HostTree) -> Self {
        let host: Box<dyn HostTree> = Box::new(host);
        let inner = Rc::new_cyclic(|self_ref| RuntimeInner {
            host: RefCell::new(host),
            scheduler: Scheduler::default(),
            events: EventRegistry::default(),
            context: RefCell::new(ContextScope::default()),
            roots: RefCell::new(IndexMap::default()),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// Renders `vnode` into `container`.
    ///
    /// The first call mounts into the container; later calls reconcile
    /// against the tree rendered by the previous one.
    pub fn render(&self, vnode: VNode, container: HostNodeId) -> Result<(), RenderError> {
        let previous = self.inner.roots.borrow_mut().shift_remove(&container);
        log::debug!(
            "render {} into {container} ({})",
            vnode.kind().name(),
            if previous.is_some() { "update" } else { "mount" }
        );
        match self.inner.patch(container, previous, Some(vnode), None) {
            Ok(mounted) => {
                self.keep_root(container, mounted);
                Ok(())
            }
            Err(failed) => {
                self.keep_root(container, failed.kept);
                Err(failed.error)
            }
        }
    }

    /// Unmounts whatever was rendered into `container`. Returns false when
    /// nothing was.
    pub fn unmount(&self, container: HostNodeId) -> Result<bool, RenderError> {
        let Some(previous) = self.inner.roots.borrow_mut().shift_remove(&container) else {
            return Ok(false);
        };
        match self.inner.patch(container, Some(previous), None, None) {
            Ok(_) => Ok(true),
            Err(failed) => {
                self.keep_root(container, failed.kept);
                Err(failed.error)
            }
        }
    }

    /// Records what is attached to `container` after a patch, successful or not.
    fn keep_root(&self, container: HostNodeId, mounted: Option<MountedNode>) {
        if let Some(mounted) = mounted {
            self.inner.roots.borrow_mut().insert(container, mounted);
        }
    }

    /// Delivers a native event through the delegated listener path.
    pub fn dispatch(&self, native: &NativeEvent) -> Result<(), RenderError> {
        self.inner.dispatch(native)
    }

    /// Runs `f` inside a batch: every update it requests is applied once `f`
    /// returns. Nested calls join the outermost batch.
    pub fn batched_updates<R>(&self, f: impl FnOnce() -> R) -> Result<R, RenderError> {
        let batch = self.inner.scheduler.begin_batch();
        let result = f();
        self.inner.finish_batch(batch)?;
        Ok(result)
    }

    pub fn is_batching(&self) -> bool {
        self.inner.scheduler.is_batching()
    }

    /// Borrows the host tree as its concrete type; `None` if it is not an `H`.
    pub fn with_host<H: HostTree, R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        self.inner
            .with_host(|host| host.as_any_mut().downcast_mut::<H>().map(f))
    }

    /// Number of `on<Event>` handlers currently registered.
    pub fn handler_count(&self) -> usize {
        self.inner.events.handler_count()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("roots", &self.inner.roots.borrow().len())
            .field("batching", &self.is_batching())
            .finish()
    }
}
