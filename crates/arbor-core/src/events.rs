//! Event delegation.
//!
//! Handlers declared as `on<Event>` props are kept per host node instead of
//! being attached to it. One delegated listener per event type is installed
//! on the host tree; when it fires, [`RuntimeInner::dispatch`] bubbles a
//! synthetic event through the target's ancestor chain inside a single batch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::error::RenderError;
use crate::host::HostNodeId;
use crate::runtime::RuntimeInner;
use crate::value::{Map, Value};

pub type EventHandler = Rc<dyn Fn(&SyntheticEvent)>;

/// Listener installed on the host tree, one per event type.
pub type DelegatedListener = Rc<dyn Fn(&NativeEvent) -> Result<(), RenderError>>;

const TYPE_FIELD: &str = "type";
const TARGET_FIELD: &str = "target";

/// Event as reported by the host tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub event_type: String,
    pub target: HostNodeId,
    pub fields: Map,
}

impl NativeEvent {
    pub fn new(event_type: impl Into<String>, target: HostNodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The carrier handed to handlers while an event bubbles.
///
/// A single carrier is reused for every dispatch and its fields are nulled
/// once bubbling ends. Handlers that need the data later must copy it out
/// with [`SyntheticEvent::persist`].
#[derive(Default)]
pub struct SyntheticEvent {
    fields: RefCell<Map>,
    current_target: Cell<Option<HostNodeId>>,
    stopped: Cell<bool>,
}

impl SyntheticEvent {
    pub fn event_type(&self) -> String {
        self.field(TYPE_FIELD).to_string()
    }

    pub fn target(&self) -> Option<HostNodeId> {
        self.field(TARGET_FIELD)
            .as_int()
            .and_then(|id| HostNodeId::try_from(id).ok())
    }

    /// Host node whose handler is running.
    pub fn current_target(&self) -> Option<HostNodeId> {
        self.current_target.get()
    }

    pub fn field(&self, key: &str) -> Value {
        self.fields.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Copies the current fields out of the carrier.
    pub fn persist(&self) -> Map {
        self.fields.borrow().clone()
    }

    /// Stops the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    fn fill(&self, native: &NativeEvent) {
        let mut fields = self.fields.borrow_mut();
        fields.clear();
        fields.extend(native.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields.insert(TYPE_FIELD.to_owned(), Value::from(native.event_type.as_str()));
        fields.insert(TARGET_FIELD.to_owned(), Value::from(native.target));
        self.stopped.set(false);
    }

    fn reset(&self) {
        for value in self.fields.borrow_mut().values_mut() {
            *value = Value::Null;
        }
        self.current_target.set(None);
        self.stopped.set(false);
    }
}

impl fmt::Debug for SyntheticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticEvent")
            .field("fields", &*self.fields.borrow())
            .field("current_target", &self.current_target.get())
            .finish()
    }
}

/// Event type named by an `on<event>` prop: `onClick` and `onclick` both
/// yield `click`.
///
/// The reconciler only treats the prop as an event when it holds a handler;
/// other values under such keys (`once`, `online`) stay plain properties.
pub fn event_type_of(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

#[derive(Default)]
pub(crate) struct EventRegistry {
    handlers: RefCell<HashMap<HostNodeId, HashMap<String, EventHandler>>>,
    installed: RefCell<HashSet<String>>,
    carrier: SyntheticEvent,
    dispatching: Cell<bool>,
}

impl EventRegistry {
    /// Stores `handler`; returns true when `event_type` has never been
    /// registered before and its delegated listener must be installed.
    pub(crate) fn register(
        &self,
        node: HostNodeId,
        event_type: &str,
        handler: EventHandler,
    ) -> bool {
        self.handlers
            .borrow_mut()
            .entry(node)
            .or_default()
            .insert(event_type.to_owned(), handler);
        self.installed.borrow_mut().insert(event_type.to_owned())
    }

    pub(crate) fn unregister(&self, node: HostNodeId, event_type: &str) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(table) = handlers.get_mut(&node) {
            table.remove(event_type);
            if table.is_empty() {
                handlers.remove(&node);
            }
        }
    }

    /// Drops every handler registered on `node`.
    pub(crate) fn forget(&self, node: HostNodeId) {
        self.handlers.borrow_mut().remove(&node);
    }

    fn handler(&self, node: HostNodeId, event_type: &str) -> Option<EventHandler> {
        self.handlers
            .borrow()
            .get(&node)
            .and_then(|table| table.get(event_type))
            .cloned()
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.borrow().values().map(|table| table.len()).sum()
    }
}

/// Marks a dispatch in progress and resets the carrier when bubbling ends.
struct DispatchGuard<'a> {
    registry: &'a EventRegistry,
}

impl<'a> DispatchGuard<'a> {
    fn new(registry: &'a EventRegistry) -> Self {
        registry.dispatching.set(true);
        Self { registry }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.registry.carrier.reset();
        self.registry.dispatching.set(false);
    }
}

impl RuntimeInner {
    pub(crate) fn register_handler(
        &self,
        node: HostNodeId,
        event_type: &str,
        handler: EventHandler,
    ) {
        if self.events.register(node, event_type, handler) {
            log::debug!("installing delegated listener for {event_type}");
            let listener = self.delegated_listener();
            self.with_host(|host| host.install_delegated_listener(event_type, listener));
        }
    }

    fn delegated_listener(&self) -> DelegatedListener {
        let runtime = self.self_ref.clone();
        Rc::new(move |native: &NativeEvent| {
            let runtime = runtime.upgrade().ok_or(RenderError::RuntimeDropped)?;
            runtime.dispatch(native)
        })
    }

    /// Bubbles `native` from its target to the root, then flushes every
    /// update its handlers requested.
    pub(crate) fn dispatch(&self, native: &NativeEvent) -> Result<(), RenderError> {
        if self.events.dispatching.get() {
            return Err(RenderError::ReentrantDispatch {
                event_type: native.event_type.clone(),
            });
        }
        let path = self.with_host(|host| host.ancestor_chain(native.target));
        let batch = self.scheduler.begin_batch();
        {
            let _dispatching = DispatchGuard::new(&self.events);
            let carrier = &self.events.carrier;
            carrier.fill(native);
            let mut invoked = 0usize;
            for node in path {
                let Some(handler) = self.events.handler(node, &native.event_type) else {
                    continue;
                };
                carrier.current_target.set(Some(node));
                handler(carrier);
                invoked += 1;
                if carrier.is_propagation_stopped() {
                    log::trace!("{} propagation stopped at {node}", native.event_type);
                    break;
                }
            }
            log::trace!(
                "dispatched {} from {} to {invoked} handlers",
                native.event_type,
                native.target
            );
        }
        self.finish_batch(batch)
    }
}
