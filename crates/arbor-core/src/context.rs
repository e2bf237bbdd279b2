//! Context handles, provider cells and the provider scope.
//!
//! A [`Context`] is created once and shared by the providers and consumers
//! built from it. How a consumer resolves its value depends on the handle's
//! [`ContextMode`].

use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::element::{make_element, NodeKind, VNode};
use crate::value::{merge, Map, Value};

/// Prop key holding the value of a provider.
pub const PROVIDER_VALUE: &str = "value";

pub(crate) type ContextId = usize;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Consumers read the nearest enclosing provider, else the default.
    Scoped,
    /// One value cell per handle. Every provider evaluation shallow-merges
    /// its value into it, whatever its position in the tree.
    Flat,
}

/// Shared, mutable value of one provider (or of a flat context).
#[derive(Clone, Default)]
pub(crate) struct ContextCell {
    value: Rc<RefCell<Map>>,
}

impl ContextCell {
    pub(crate) fn new(value: Map) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub(crate) fn get(&self) -> Map {
        self.value.borrow().clone()
    }

    pub(crate) fn replace(&self, value: Map) {
        *self.value.borrow_mut() = value;
    }

    pub(crate) fn merge(&self, delta: Map) {
        merge(&mut self.value.borrow_mut(), delta);
    }
}

struct ContextInner {
    id: ContextId,
    mode: ContextMode,
    default: ContextCell,
}

#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    pub fn new(default: Map) -> Self {
        Self::with_mode(default, ContextMode::Scoped)
    }

    pub fn flat(default: Map) -> Self {
        Self::with_mode(default, ContextMode::Flat)
    }

    pub fn with_mode(default: Map, mode: ContextMode) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                mode,
                default: ContextCell::new(default),
            }),
        }
    }

    pub fn mode(&self) -> ContextMode {
        self.inner.mode
    }

    /// Default value; for flat contexts this is the merged current value.
    pub fn default_value(&self) -> Map {
        self.inner.default.get()
    }

    /// A provider element. It expects exactly one child.
    pub fn provider(&self, value: Map, children: Vec<Value>) -> VNode {
        let mut config = Map::new();
        config.insert(PROVIDER_VALUE.to_owned(), Value::Map(value));
        make_element(NodeKind::Provider(self.clone()), config, children)
    }

    /// A consumer element rendering `render` with the resolved value.
    pub fn consumer(&self, render: impl Fn(&Map) -> VNode + 'static) -> VNode {
        make_element(
            NodeKind::Consumer(self.clone()),
            Map::new(),
            vec![Value::render_fn(render)],
        )
    }

    pub(crate) fn id(&self) -> ContextId {
        self.inner.id
    }

    pub(crate) fn same(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Cell a provider of this context should publish `value` through.
    ///
    /// Flat contexts merge into the shared cell; scoped ones get a fresh cell
    /// per provider, reused on later updates through [`ContextCell::replace`].
    pub(crate) fn provide(&self, value: Map) -> ContextCell {
        match self.inner.mode {
            ContextMode::Scoped => ContextCell::new(value),
            ContextMode::Flat => {
                self.inner.default.merge(value);
                self.inner.default.clone()
            }
        }
    }

    /// Publishes an updated value through a provider's existing cell.
    pub(crate) fn update(&self, cell: &ContextCell, value: Map) {
        match self.inner.mode {
            ContextMode::Scoped => cell.replace(value),
            ContextMode::Flat => self.inner.default.merge(value),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

/// Providers enclosing the node being reconciled, outermost first.
#[derive(Clone, Default)]
pub(crate) struct ContextScope {
    frames: SmallVec<[(ContextId, ContextCell); 4]>,
}

impl ContextScope {
    pub(crate) fn resolve(&self, context: &Context) -> ContextCell {
        if context.mode() == ContextMode::Flat {
            return context.inner.default.clone();
        }
        self.frames
            .iter()
            .rev()
            .find(|(id, _)| *id == context.id())
            .map(|(_, cell)| cell.clone())
            .unwrap_or_else(|| context.inner.default.clone())
    }

    /// Returns whether a frame was pushed; flat contexts never push.
    pub(crate) fn push(&mut self, context: &Context, cell: ContextCell) -> bool {
        if context.mode() == ContextMode::Flat {
            return false;
        }
        self.frames.push((context.id(), cell));
        true
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;

    #[test]
    fn scoped_resolves_nearest_provider() {
        let theme = Context::new(map! { "color" => "black" });
        let mut scope = ContextScope::default();
        assert_eq!(scope.resolve(&theme).get(), map! { "color" => "black" });

        assert!(scope.push(&theme, theme.provide(map! { "color" => "red" })));
        assert!(scope.push(&theme, theme.provide(map! { "shade" => "dark" })));
        assert_eq!(scope.resolve(&theme).get(), map! { "shade" => "dark" });

        scope.pop();
        assert_eq!(scope.resolve(&theme).get(), map! { "color" => "red" });
    }

    #[test]
    fn flat_providers_merge_into_one_cell() {
        let theme = Context::flat(Map::new());
        let mut scope = ContextScope::default();
        let outer = theme.provide(map! { "color" => "red" });
        assert!(!scope.push(&theme, outer));
        theme.provide(map! { "shade" => "dark" });

        assert_eq!(scope.depth(), 0);
        assert_eq!(
            scope.resolve(&theme).get(),
            map! { "color" => "red", "shade" => "dark" }
        );
    }

    #[test]
    fn other_contexts_fall_back_to_default() {
        let theme = Context::new(map! { "color" => "black" });
        let locale = Context::new(map! { "lang" => "en" });
        let mut scope = ContextScope::default();
        scope.push(&theme, theme.provide(map! { "color" => "red" }));
        assert_eq!(scope.resolve(&locale).get(), map! { "lang" => "en" });
        assert!(!theme.same(&locale));
    }
}
