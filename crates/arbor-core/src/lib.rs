//! Retained-mode UI core: a virtual tree reconciler, a batched update
//! scheduler and an event delegation layer over an abstract host tree.
//!
//! Components describe what to show as [`VNode`] trees. A [`Runtime`]
//! mounts those trees into a [`HostTree`], re-renders class components when
//! their state changes and patches only what differs.

pub mod collections;
mod component;
mod context;
mod element;
mod error;
mod events;
mod host;
mod memory_host;
mod node_ref;
mod reconciler;
mod runtime;
mod scheduler;
mod updater;
mod value;

pub use component::{Component, ComponentClass, ComponentHandle, ComponentType, Hooks};
pub use context::{Context, ContextMode, PROVIDER_VALUE};
pub use element::{
    class, element, function, make_element, memo, text, Children, FunctionComponent, NodeKind,
    RenderFunction, VNode, CHILDREN, CONTENT,
};
pub use error::RenderError;
pub use events::{event_type_of, DelegatedListener, EventHandler, NativeEvent, SyntheticEvent};
pub use host::{HostError, HostNodeId, HostTree};
pub use memory_host::{HostOp, MemoryHost};
pub use node_ref::NodeRef;
pub use runtime::Runtime;
pub use updater::StateDelta;
pub use value::{merge, shallow_equal, Callback, Map, RenderFn, Value};
