//! Host tree adapter.
//!
//! The reconciler never touches a real tree directly; every mutation goes
//! through [`HostTree`]. Implementations either perform the operation or
//! return a [`HostError`]; nothing is retried.

use std::any::Any;
use std::fmt;

use crate::events::DelegatedListener;
use crate::value::Value;

pub type HostNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { id: HostNodeId },
    NotAChild { parent: HostNodeId, child: HostNodeId },
    NotAnElement { id: HostNodeId },
    NotAText { id: HostNodeId },
    Detached { id: HostNodeId },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::NotAnElement { id } => write!(f, "host node {id} is not an element"),
            HostError::NotAText { id } => write!(f, "host node {id} is not a text node"),
            HostError::Detached { id } => write!(f, "host node {id} has no parent"),
        }
    }
}

impl std::error::Error for HostError {}

pub trait HostTree: Any {
    fn create_element(&mut self, tag: &str) -> HostNodeId;
    fn create_text(&mut self, content: &str) -> HostNodeId;
    fn set_text(&mut self, node: HostNodeId, content: &str) -> Result<(), HostError>;
    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError>;
    fn insert_before(
        &mut self,
        parent: HostNodeId,
        child: HostNodeId,
        anchor: HostNodeId,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError>;
    fn set_property(&mut self, node: HostNodeId, key: &str, value: &Value)
        -> Result<(), HostError>;
    fn set_style_field(
        &mut self,
        node: HostNodeId,
        field: &str,
        value: &Value,
    ) -> Result<(), HostError>;

    /// Installs the single delegated listener for `event_type` on the
    /// tree's root.
    fn install_delegated_listener(&mut self, event_type: &str, listener: DelegatedListener);

    fn parent(&self, node: HostNodeId) -> Option<HostNodeId>;

    /// `node` followed by each of its ancestors up to the root.
    fn ancestor_chain(&self, node: HostNodeId) -> Vec<HostNodeId> {
        let mut chain = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
