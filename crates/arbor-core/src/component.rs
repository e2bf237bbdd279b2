//! Class components and their lifecycle contract.
//!
//! A class component is split in two traits:
//!
//! - [`Component`] holds the per-instance hooks and stays dyn-compatible so
//!   instances can be stored behind `Rc<dyn Component>`.
//! - [`ComponentClass`] carries the static side: construction, initial and
//!   derived state, context binding and the [`Hooks`] it declares.
//!
//! Only hooks listed in [`ComponentClass::HOOKS`] are invoked. The set is
//! checked once per type, when the type is first registered through
//! [`ComponentType::of`].

use bitflags::bitflags;
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::collections::map::HashSet;
use crate::context::{Context, ContextCell, ContextScope};
use crate::element::VNode;
use crate::error::RenderError;
use crate::reconciler::MountedNode;
use crate::runtime::RuntimeInner;
use crate::updater::{StateDelta, Updater};
use crate::value::{Map, Value};

bitflags! {
    /// Lifecycle hooks a component type implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Hooks: u16 {
        const WILL_MOUNT = 1 << 0;
        const DID_MOUNT = 1 << 1;
        const DERIVE_STATE = 1 << 2;
        const SHOULD_UPDATE = 1 << 3;
        const WILL_UPDATE = 1 << 4;
        const SNAPSHOT = 1 << 5;
        const DID_UPDATE = 1 << 6;
        const WILL_UNMOUNT = 1 << 7;
    }
}

pub trait Component: 'static {
    fn render(&self, this: &ComponentHandle) -> VNode;

    /// Runs before the first render. State set here is folded in before
    /// rendering, without an extra render pass.
    fn will_mount(&self, _this: &ComponentHandle) {}

    /// Runs once the component's host nodes are attached, children first.
    fn did_mount(&self, _this: &ComponentHandle) {}

    fn should_update(&self, _this: &ComponentHandle, _next_props: &Map, _next_state: &Map) -> bool {
        true
    }

    /// Runs before props and state are committed.
    fn will_update(&self, _this: &ComponentHandle) {}

    /// Runs after the commit and before the patch; the result is handed to
    /// [`Component::did_update`].
    fn snapshot_before_update(
        &self,
        _this: &ComponentHandle,
        _prev_props: &Map,
        _prev_state: &Map,
    ) -> Value {
        Value::Null
    }

    fn did_update(
        &self,
        _this: &ComponentHandle,
        _prev_props: &Map,
        _prev_state: &Map,
        _snapshot: &Value,
    ) {
    }

    fn will_unmount(&self, _this: &ComponentHandle) {}
}

pub trait ComponentClass: Component + Sized {
    const HOOKS: Hooks = Hooks::empty();

    /// Gate updates on shallow equality of props and state when no
    /// should-update hook is declared.
    const PURE: bool = false;

    fn create(props: &Map) -> Self;

    fn initial_state(_props: &Map) -> Map {
        Map::new()
    }

    /// Merged into state before every render when [`Hooks::DERIVE_STATE`]
    /// is declared.
    fn derive_state_from_props(_props: &Map, _state: &Map) -> Option<Map> {
        None
    }

    fn context_type() -> Option<Context> {
        None
    }
}

thread_local! {
    static REGISTERED_TYPES: RefCell<HashSet<TypeId>> = RefCell::new(HashSet::default());
}

fn construct<C: ComponentClass>(props: &Map) -> Rc<dyn Component> {
    Rc::new(C::create(props))
}

/// Type-erased descriptor of a [`ComponentClass`].
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    hooks: Hooks,
    pure: bool,
    construct: fn(&Map) -> Rc<dyn Component>,
    initial_state: fn(&Map) -> Map,
    derive_state: fn(&Map, &Map) -> Option<Map>,
    context: fn() -> Option<Context>,
}

impl ComponentType {
    pub fn of<C: ComponentClass>() -> Self {
        let ty = Self {
            id: TypeId::of::<C>(),
            name: short_type_name(std::any::type_name::<C>()),
            hooks: C::HOOKS,
            pure: C::PURE,
            construct: construct::<C>,
            initial_state: C::initial_state,
            derive_state: C::derive_state_from_props,
            context: C::context_type,
        };
        let first_seen = REGISTERED_TYPES.with(|types| types.borrow_mut().insert(ty.id));
        if first_seen {
            ty.validate();
        }
        ty
    }

    fn validate(&self) {
        log::debug!("registered component {} with hooks {:?}", self.name, self.hooks);
        if self.hooks.contains(Hooks::SNAPSHOT) && !self.hooks.contains(Hooks::DID_UPDATE) {
            log::warn!(
                "{} declares snapshot_before_update without did_update; the snapshot is discarded",
                self.name
            );
        }
        if self.pure && self.hooks.contains(Hooks::SHOULD_UPDATE) {
            log::warn!(
                "{} is pure and declares should_update; should_update takes precedence",
                self.name
            );
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn hooks(&self) -> Hooks {
        self.hooks
    }

    pub(crate) fn is_pure(&self) -> bool {
        self.pure
    }

    pub(crate) fn same(&self, other: &ComponentType) -> bool {
        self.id == other.id
    }

    pub(crate) fn construct(&self, props: &Map) -> Rc<dyn Component> {
        (self.construct)(props)
    }

    pub(crate) fn initial_state(&self, props: &Map) -> Map {
        (self.initial_state)(props)
    }

    pub(crate) fn context(&self) -> Option<Context> {
        (self.context)()
    }

    /// Applies the derivation hook, if declared, to `state`.
    pub(crate) fn derive_into(&self, props: &Map, state: &mut Map) {
        if !self.hooks.contains(Hooks::DERIVE_STATE) {
            return;
        }
        if let Some(derived) = (self.derive_state)(props, state) {
            crate::value::merge(state, derived);
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .finish()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Mounted state of one class component.
pub(crate) struct ComponentInstance {
    pub(crate) ty: ComponentType,
    pub(crate) behavior: Rc<dyn Component>,
    pub(crate) props: RefCell<Map>,
    pub(crate) state: RefCell<Map>,
    pub(crate) context: RefCell<Option<ContextCell>>,
    /// Providers enclosing the instance when it was mounted.
    pub(crate) scope: ContextScope,
    pub(crate) updater: Updater,
    pub(crate) rendered: RefCell<Option<MountedNode>>,
    pub(crate) runtime: Weak<RuntimeInner>,
    pub(crate) flushing: Cell<bool>,
    pub(crate) unmounted: Cell<bool>,
    self_ref: Weak<ComponentInstance>,
}

impl ComponentInstance {
    pub(crate) fn new(
        ty: ComponentType,
        props: Map,
        scope: ContextScope,
        runtime: Weak<RuntimeInner>,
    ) -> Rc<Self> {
        let behavior = ty.construct(&props);
        let state = ty.initial_state(&props);
        Rc::new_cyclic(|self_ref| Self {
            ty,
            behavior,
            props: RefCell::new(props),
            state: RefCell::new(state),
            context: RefCell::new(None),
            scope,
            updater: Updater::new(),
            rendered: RefCell::new(None),
            runtime,
            flushing: Cell::new(false),
            unmounted: Cell::new(false),
            self_ref: self_ref.clone(),
        })
    }

    pub(crate) fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            instance: self.self_ref.clone(),
        }
    }

    pub(crate) fn has(&self, hook: Hooks) -> bool {
        self.ty.hooks.contains(hook)
    }

    pub(crate) fn name(&self) -> &'static str {
        self.ty.name
    }
}

/// Marks an instance as mid-update for the guard's lifetime.
///
/// Updates requested for the instance while the flag is set stay pending and
/// are picked up by the update already in progress.
pub(crate) struct FlushGuard<'a> {
    instance: &'a ComponentInstance,
}

impl<'a> FlushGuard<'a> {
    pub(crate) fn new(instance: &'a ComponentInstance) -> Self {
        instance.flushing.set(true);
        Self { instance }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.instance.flushing.set(false);
    }
}

/// Handle given to hooks and captured by event handlers.
///
/// Holds the instance weakly: once the component is unmounted, reads return
/// empty maps and updates are ignored.
#[derive(Clone)]
pub struct ComponentHandle {
    instance: Weak<ComponentInstance>,
}

impl ComponentHandle {
    pub fn is_mounted(&self) -> bool {
        self.instance
            .upgrade()
            .is_some_and(|instance| !instance.unmounted.get())
    }

    pub fn props(&self) -> Map {
        self.instance
            .upgrade()
            .map(|instance| instance.props.borrow().clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Map {
        self.instance
            .upgrade()
            .map(|instance| instance.state.borrow().clone())
            .unwrap_or_default()
    }

    pub fn prop(&self, key: &str) -> Value {
        self.instance
            .upgrade()
            .and_then(|instance| instance.props.borrow().get(key).cloned())
            .unwrap_or_default()
    }

    pub fn state_value(&self, key: &str) -> Value {
        self.instance
            .upgrade()
            .and_then(|instance| instance.state.borrow().get(key).cloned())
            .unwrap_or_default()
    }

    /// Value of the context declared by [`ComponentClass::context_type`].
    pub fn context(&self) -> Map {
        self.instance
            .upgrade()
            .and_then(|instance| instance.context.borrow().as_ref().map(ContextCell::get))
            .unwrap_or_default()
    }

    pub fn set_state(&self, delta: Map) -> Result<(), RenderError> {
        self.enqueue(StateDelta::Merge(delta), None)
    }

    pub fn set_state_with(
        &self,
        f: impl FnOnce(&Map, &Map) -> Map + 'static,
    ) -> Result<(), RenderError> {
        self.enqueue(StateDelta::compute(f), None)
    }

    /// Enqueues `delta`; `callback` runs after the update consuming it has
    /// committed and patched the host tree. If that update fails, the
    /// callback is dropped without running.
    pub fn set_state_then(
        &self,
        delta: impl Into<StateDelta>,
        callback: impl FnOnce() + 'static,
    ) -> Result<(), RenderError> {
        self.enqueue(delta.into(), Some(Box::new(callback)))
    }

    pub fn force_update(&self) -> Result<(), RenderError> {
        let Some(instance) = self.instance.upgrade() else {
            return Ok(());
        };
        let runtime = instance.runtime.upgrade().ok_or(RenderError::RuntimeDropped)?;
        runtime.force_update(&instance)
    }

    fn enqueue(
        &self,
        delta: StateDelta,
        callback: Option<Box<dyn FnOnce()>>,
    ) -> Result<(), RenderError> {
        let Some(instance) = self.instance.upgrade() else {
            log::debug!("set_state ignored: component was dropped");
            return Ok(());
        };
        let runtime = instance.runtime.upgrade().ok_or(RenderError::RuntimeDropped)?;
        runtime.set_state(&instance, delta, callback)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance.upgrade() {
            Some(instance) => write!(f, "ComponentHandle({})", instance.name()),
            None => f.write_str("ComponentHandle(<dropped>)"),
        }
    }
}
