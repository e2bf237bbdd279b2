//! Per-component queue of pending state changes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::value::{merge, Map};

pub(crate) type UpdaterId = usize;

pub(crate) type StateCallback = Box<dyn FnOnce()>;

static NEXT_UPDATER_ID: AtomicUsize = AtomicUsize::new(1);

fn next_updater_id() -> UpdaterId {
    NEXT_UPDATER_ID.fetch_add(1, Ordering::Relaxed)
}

/// One pending state change.
pub enum StateDelta {
    /// Shallow-merged into state as-is.
    Merge(Map),
    /// Computed from `(state, props)` as accumulated so far, then merged.
    Compute(Box<dyn FnOnce(&Map, &Map) -> Map>),
}

impl StateDelta {
    pub fn compute(f: impl FnOnce(&Map, &Map) -> Map + 'static) -> Self {
        StateDelta::Compute(Box::new(f))
    }

    fn resolve(self, state: &Map, props: &Map) -> Map {
        match self {
            StateDelta::Merge(delta) => delta,
            StateDelta::Compute(f) => f(state, props),
        }
    }
}

impl From<Map> for StateDelta {
    fn from(delta: Map) -> Self {
        StateDelta::Merge(delta)
    }
}

impl fmt::Debug for StateDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateDelta::Merge(delta) => f.debug_tuple("Merge").field(delta).finish(),
            StateDelta::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// Left fold of `deltas` over `state`, in insertion order.
pub(crate) fn fold_deltas(state: &Map, props: &Map, deltas: Vec<StateDelta>) -> Map {
    deltas.into_iter().fold(state.clone(), |mut next, delta| {
        let resolved = delta.resolve(&next, props);
        merge(&mut next, resolved);
        next
    })
}

/// Everything an updater had pending when it was drained.
pub(crate) struct PendingUpdate {
    pub(crate) props: Option<Map>,
    pub(crate) deltas: Vec<StateDelta>,
    pub(crate) callbacks: Vec<StateCallback>,
    pub(crate) forced: bool,
}

impl PendingUpdate {
    pub(crate) fn is_empty(&self) -> bool {
        self.props.is_none() && self.deltas.is_empty() && !self.forced
    }
}

pub(crate) struct Updater {
    id: UpdaterId,
    pending: RefCell<Vec<StateDelta>>,
    callbacks: RefCell<Vec<StateCallback>>,
    pending_props: RefCell<Option<Map>>,
    forced: Cell<bool>,
}

impl Updater {
    pub(crate) fn new() -> Self {
        Self {
            id: next_updater_id(),
            pending: RefCell::new(Vec::new()),
            callbacks: RefCell::new(Vec::new()),
            pending_props: RefCell::new(None),
            forced: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> UpdaterId {
        self.id
    }

    pub(crate) fn push(&self, delta: StateDelta, callback: Option<StateCallback>) {
        self.pending.borrow_mut().push(delta);
        if let Some(callback) = callback {
            self.callbacks.borrow_mut().push(callback);
        }
    }

    pub(crate) fn set_pending_props(&self, props: Map) {
        *self.pending_props.borrow_mut() = Some(props);
    }

    pub(crate) fn request_force(&self) {
        self.forced.set(true);
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
            || self.pending_props.borrow().is_some()
            || self.forced.get()
    }

    /// Swaps every pending buffer out, leaving the updater empty.
    pub(crate) fn take(&self) -> PendingUpdate {
        PendingUpdate {
            props: self.pending_props.borrow_mut().take(),
            deltas: std::mem::take(&mut *self.pending.borrow_mut()),
            callbacks: std::mem::take(&mut *self.callbacks.borrow_mut()),
            forced: self.forced.replace(false),
        }
    }
}
