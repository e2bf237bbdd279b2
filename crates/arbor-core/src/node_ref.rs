use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::host::HostNodeId;

/// Handle to the host node created for the element carrying it.
///
/// The reconciler writes the handle when the element's host node is created
/// and clears it when that node is unmounted. Consumers only read it.
#[derive(Clone, Default)]
pub struct NodeRef {
    current: Rc<Cell<Option<HostNodeId>>>,
}

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<HostNodeId> {
        self.current.get()
    }

    pub(crate) fn attach(&self, node: HostNodeId) {
        self.current.set(Some(node));
    }

    pub(crate) fn detach(&self, node: HostNodeId) {
        if self.current.get() == Some(node) {
            self.current.set(None);
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.current, &other.current)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.current.get()).finish()
    }
}
