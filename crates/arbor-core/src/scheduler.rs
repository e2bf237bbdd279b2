//! Batched update scheduling.
//!
//! Outside a batch every `set_state` flushes its component immediately.
//! Inside one (an event dispatch or [`Runtime::batched_updates`]) updaters
//! are queued once each, in first-enqueue order, and flushed when the
//! outermost batch closes.
//!
//! [`Runtime::batched_updates`]: crate::Runtime::batched_updates

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::collections::ordered::IndexMap;
use crate::component::{ComponentInstance, FlushGuard, Hooks};
use crate::error::RenderError;
use crate::runtime::RuntimeInner;
use crate::updater::{fold_deltas, PendingUpdate, StateCallback, StateDelta, UpdaterId};
use crate::value::{shallow_equal, Map, Value};

#[derive(Default)]
pub(crate) struct Scheduler {
    batching: Cell<bool>,
    queue: RefCell<IndexMap<UpdaterId, Weak<ComponentInstance>>>,
}

impl Scheduler {
    pub(crate) fn is_batching(&self) -> bool {
        self.batching.get()
    }

    /// Opens a batch. Nested calls return a guard that does not own the
    /// batch, so only the outermost one flushes.
    pub(crate) fn begin_batch(&self) -> BatchGuard<'_> {
        let owner = !self.batching.replace(true);
        BatchGuard {
            scheduler: self,
            owner,
        }
    }

    fn enqueue(&self, instance: &Rc<ComponentInstance>) {
        self.queue
            .borrow_mut()
            .entry(instance.updater.id())
            .or_insert_with(|| Rc::downgrade(instance));
    }

    fn take_queue(&self) -> Vec<Weak<ComponentInstance>> {
        self.queue.borrow_mut().drain(..).map(|(_, instance)| instance).collect()
    }
}

/// Keeps a batch open; dropping the owning guard clears the flag and the
/// queue even when a hook unwinds.
pub(crate) struct BatchGuard<'a> {
    scheduler: &'a Scheduler,
    owner: bool,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.owner {
            self.scheduler.batching.set(false);
            self.scheduler.queue.borrow_mut().clear();
        }
    }
}

impl RuntimeInner {
    pub(crate) fn set_state(
        &self,
        instance: &Rc<ComponentInstance>,
        delta: StateDelta,
        callback: Option<StateCallback>,
    ) -> Result<(), RenderError> {
        if instance.unmounted.get() {
            log::debug!("set_state on unmounted {} ignored", instance.name());
            return Ok(());
        }
        instance.updater.push(delta, callback);
        self.schedule(instance)
    }

    pub(crate) fn force_update(&self, instance: &Rc<ComponentInstance>) -> Result<(), RenderError> {
        if instance.unmounted.get() {
            log::debug!("force_update on unmounted {} ignored", instance.name());
            return Ok(());
        }
        instance.updater.request_force();
        self.schedule(instance)
    }

    /// Queues the instance when batching, otherwise flushes it now.
    pub(crate) fn schedule(&self, instance: &Rc<ComponentInstance>) -> Result<(), RenderError> {
        if self.scheduler.is_batching() {
            self.scheduler.enqueue(instance);
            Ok(())
        } else {
            self.flush_one(instance, None)
        }
    }

    /// Hands new props from a parent render to an existing instance.
    pub(crate) fn emit_update(
        &self,
        instance: &Rc<ComponentInstance>,
        props: Map,
    ) -> Result<(), RenderError> {
        self.flush_one(instance, Some(props))
    }

    /// Applies everything pending on the instance's updater.
    ///
    /// An instance already being updated is not re-entered: whatever it
    /// receives meanwhile stays pending and is consumed by the loop of the
    /// update in progress.
    pub(crate) fn flush_one(
        &self,
        instance: &Rc<ComponentInstance>,
        next_props: Option<Map>,
    ) -> Result<(), RenderError> {
        if let Some(props) = next_props {
            instance.updater.set_pending_props(props);
        }
        if instance.unmounted.get() {
            log::debug!("skipping flush of unmounted {}", instance.name());
            return Ok(());
        }
        if instance.flushing.get() {
            log::trace!("{} is updating; deferring to the running flush", instance.name());
            return Ok(());
        }

        let _flushing = FlushGuard::new(instance);
        loop {
            let mut pending = instance.updater.take();
            if pending.is_empty() {
                break;
            }
            let callbacks = std::mem::take(&mut pending.callbacks);
            // Callbacks of a failed update are dropped along with it.
            self.update_instance(instance, pending)?;
            for callback in callbacks {
                callback();
            }
        }
        Ok(())
    }

    fn update_instance(
        &self,
        instance: &Rc<ComponentInstance>,
        pending: PendingUpdate,
    ) -> Result<(), RenderError> {
        let PendingUpdate {
            props,
            deltas,
            forced,
            ..
        } = pending;
        let prev_props = instance.props.borrow().clone();
        let prev_state = instance.state.borrow().clone();
        let next_props = props.unwrap_or_else(|| prev_props.clone());

        log::debug!(
            "flushing {} ({} deltas, forced: {forced})",
            instance.name(),
            deltas.len()
        );
        let mut next_state = fold_deltas(&prev_state, &next_props, deltas);
        instance.ty.derive_into(&next_props, &mut next_state);

        let behavior = Rc::clone(&instance.behavior);
        let handle = instance.handle();
        let render = if forced {
            true
        } else if instance.has(Hooks::SHOULD_UPDATE) {
            behavior.should_update(&handle, &next_props, &next_state)
        } else if instance.ty.is_pure() {
            !(shallow_equal(&prev_props, &next_props) && shallow_equal(&prev_state, &next_state))
        } else {
            true
        };

        if render && instance.has(Hooks::WILL_UPDATE) {
            behavior.will_update(&handle);
        }
        *instance.props.borrow_mut() = next_props;
        *instance.state.borrow_mut() = next_state;

        if !render {
            log::trace!("{} skipped rendering", instance.name());
            return Ok(());
        }
        self.rerender(instance, &prev_props, &prev_state)
    }

    /// Renders the instance again and patches its subtree in place.
    fn rerender(
        &self,
        instance: &Rc<ComponentInstance>,
        prev_props: &Map,
        prev_state: &Map,
    ) -> Result<(), RenderError> {
        let behavior = Rc::clone(&instance.behavior);
        let handle = instance.handle();
        let snapshot = if instance.has(Hooks::SNAPSHOT) {
            behavior.snapshot_before_update(&handle, prev_props, prev_state)
        } else {
            Value::Null
        };
        let next = behavior.render(&handle);

        let not_mounted = || RenderError::NotMounted {
            component: instance.name().to_owned(),
        };
        let first = instance
            .rendered
            .borrow()
            .as_ref()
            .and_then(|rendered| rendered.first_host())
            .ok_or_else(not_mounted)?;
        let parent = self
            .with_host(|host| host.parent(first))
            .ok_or(crate::host::HostError::Detached { id: first })?;
        let old = instance.rendered.borrow_mut().take().ok_or_else(not_mounted)?;

        let outer = self.context.replace(instance.scope.clone());
        let patched = self.patch_in_place(parent, old, next);
        *self.context.borrow_mut() = outer;
        let patched = match patched {
            Ok(patched) => patched,
            Err(failed) => {
                log::debug!("{} failed to re-render: {}", instance.name(), failed.error);
                *instance.rendered.borrow_mut() = failed.kept;
                return Err(failed.error);
            }
        };
        *instance.rendered.borrow_mut() = Some(patched);

        if instance.has(Hooks::DID_UPDATE) {
            behavior.did_update(&handle, prev_props, prev_state, &snapshot);
        }
        Ok(())
    }

    /// Flushes a closing batch. Updates requested while flushing are queued
    /// again (the batch is still open) and handled in further rounds.
    pub(crate) fn finish_batch(&self, batch: BatchGuard<'_>) -> Result<(), RenderError> {
        if !batch.owner {
            return Ok(());
        }
        loop {
            let round = self.scheduler.take_queue();
            if round.is_empty() {
                break;
            }
            log::debug!("batch flush of {} updaters", round.len());
            for instance in round {
                let Some(instance) = instance.upgrade() else {
                    continue;
                };
                self.flush_one(&instance, None)?;
            }
        }
        drop(batch);
        Ok(())
    }
}
