//! Reconciler: mounts virtual trees and patches them into the host tree.
//!
//! Every mounted position is recorded as a [`MountedNode`] that owns the host
//! node it created and, for component kinds, what the component rendered.
//! Patching consumes the old record and returns the new one.
//!
//! Children are paired by position only. Keys are carried on virtual nodes
//! but do not influence pairing.

use std::rc::Rc;

use crate::component::{ComponentInstance, ComponentType, FlushGuard, Hooks};
use crate::context::{Context, ContextCell, PROVIDER_VALUE};
use crate::element::{NodeKind, VNode, CHILDREN, CONTENT};
use crate::error::RenderError;
use crate::events::event_type_of;
use crate::host::HostNodeId;
use crate::node_ref::NodeRef;
use crate::runtime::RuntimeInner;
use crate::updater::fold_deltas;
use crate::value::{shallow_equal, Map, Value};

const STYLE: &str = "style";

pub(crate) enum MountedNode {
    Text {
        vnode: VNode,
        host: HostNodeId,
    },
    Element {
        /// The element's vnode without its children.
        vnode: VNode,
        host: HostNodeId,
        /// One slot per child; `None` where the child renders nothing.
        children: Vec<Option<MountedNode>>,
    },
    /// Function, memo and consumer kinds.
    Composite {
        vnode: VNode,
        rendered: Box<MountedNode>,
    },
    Provider {
        vnode: VNode,
        cell: ContextCell,
        rendered: Box<MountedNode>,
    },
    Class {
        vnode: VNode,
        instance: Rc<ComponentInstance>,
    },
}

impl MountedNode {
    pub(crate) fn vnode(&self) -> &VNode {
        match self {
            MountedNode::Text { vnode, .. }
            | MountedNode::Element { vnode, .. }
            | MountedNode::Composite { vnode, .. }
            | MountedNode::Provider { vnode, .. }
            | MountedNode::Class { vnode, .. } => vnode,
        }
    }

    /// Root host node of this position, if it has one right now.
    pub(crate) fn first_host(&self) -> Option<HostNodeId> {
        match self {
            MountedNode::Text { host, .. } | MountedNode::Element { host, .. } => Some(*host),
            MountedNode::Composite { rendered, .. } | MountedNode::Provider { rendered, .. } => {
                rendered.first_host()
            }
            MountedNode::Class { instance, .. } => instance
                .rendered
                .borrow()
                .as_ref()
                .and_then(MountedNode::first_host),
        }
    }

    fn root_host(&self) -> Result<HostNodeId, RenderError> {
        self.first_host().ok_or_else(|| RenderError::NotMounted {
            component: self.vnode().kind().name().to_owned(),
        })
    }

    /// Collects, post-order, what unmounting this subtree has to release.
    fn collect(&self, released: &mut Released) {
        match self {
            MountedNode::Text { host, .. } => released.hosts.push(*host),
            MountedNode::Element {
                vnode,
                host,
                children,
            } => {
                for child in children.iter().flatten() {
                    child.collect(released);
                }
                released.hosts.push(*host);
                if let Some(node_ref) = vnode.node_ref() {
                    released.refs.push((node_ref.clone(), *host));
                }
            }
            MountedNode::Composite { rendered, .. } | MountedNode::Provider { rendered, .. } => {
                rendered.collect(released);
            }
            MountedNode::Class { instance, .. } => {
                if let Some(rendered) = instance.rendered.borrow().as_ref() {
                    rendered.collect(released);
                }
                released.instances.push(Rc::clone(instance));
            }
        }
    }
}

#[derive(Default)]
struct Released {
    /// Deepest first.
    instances: Vec<Rc<ComponentInstance>>,
    hosts: Vec<HostNodeId>,
    refs: Vec<(NodeRef, HostNodeId)>,
}

/// Instances mounted during one patch, children before parents.
type MountQueue = Vec<Rc<ComponentInstance>>;

/// A failed patch, with the record of whatever is still attached at that
/// position so the caller can keep owning it.
pub(crate) struct PatchError {
    pub(crate) error: RenderError,
    pub(crate) kept: Option<MountedNode>,
}

impl PatchError {
    fn keeping(kept: MountedNode, error: impl Into<RenderError>) -> Self {
        Self {
            error: error.into(),
            kept: Some(kept),
        }
    }

    fn lost(error: impl Into<RenderError>) -> Self {
        Self {
            error: error.into(),
            kept: None,
        }
    }
}

impl PatchError {
    /// Re-wraps the kept child record into its parent's record.
    fn wrap(self, parent: impl FnOnce(MountedNode) -> MountedNode) -> Self {
        Self {
            error: self.error,
            kept: self.kept.map(parent),
        }
    }
}

impl From<PatchError> for RenderError {
    fn from(failed: PatchError) -> Self {
        failed.error
    }
}

impl RuntimeInner {
    /// Reconciles `old` against `new` under `parent`.
    ///
    /// Newly mounted subtrees are inserted before `anchor` when given and
    /// appended otherwise.
    ///
    /// On failure the returned [`PatchError`] carries the record of what is
    /// still attached, which is the old record whenever the failure happened
    /// before the old subtree was touched.
    pub(crate) fn patch(
        &self,
        parent: HostNodeId,
        old: Option<MountedNode>,
        new: Option<VNode>,
        anchor: Option<HostNodeId>,
    ) -> Result<Option<MountedNode>, PatchError> {
        match (old, new) {
            (None, None) => Ok(None),
            (Some(old), None) => {
                self.unmount_node(parent, old)?;
                Ok(None)
            }
            (None, Some(new)) => {
                let mut mounts = MountQueue::new();
                let mounted = self.mount(new, &mut mounts).map_err(PatchError::lost)?;
                let host = mounted.root_host().map_err(PatchError::lost)?;
                self.with_host(|tree| match anchor {
                    Some(anchor) => tree.insert_before(parent, host, anchor),
                    None => tree.append_child(parent, host),
                })
                .map_err(PatchError::lost)?;
                if let Err(error) = self.run_mount_hooks(mounts) {
                    return Err(PatchError::keeping(mounted, error));
                }
                Ok(Some(mounted))
            }
            (Some(old), Some(new)) => self.patch_in_place(parent, old, new).map(Some),
        }
    }

    pub(crate) fn patch_in_place(
        &self,
        parent: HostNodeId,
        old: MountedNode,
        new: VNode,
    ) -> Result<MountedNode, PatchError> {
        if old.vnode().same_type(&new) {
            self.update(parent, old, new)
        } else {
            self.replace(parent, old, new)
        }
    }

    fn replace(
        &self,
        parent: HostNodeId,
        old: MountedNode,
        new: VNode,
    ) -> Result<MountedNode, PatchError> {
        log::trace!(
            "replacing {} with {}",
            old.vnode().kind().name(),
            new.kind().name()
        );
        let old_host = match old.root_host() {
            Ok(host) => host,
            Err(error) => return Err(PatchError::keeping(old, error)),
        };
        // The old subtree stays untouched until the new one is fully built.
        let mut mounts = MountQueue::new();
        let mounted = match self.mount(new, &mut mounts) {
            Ok(mounted) => mounted,
            Err(error) => return Err(PatchError::keeping(old, error)),
        };
        let new_host = match mounted.root_host() {
            Ok(host) => host,
            Err(error) => return Err(PatchError::keeping(old, error)),
        };
        if let Err(error) = self.with_host(|tree| tree.insert_before(parent, new_host, old_host)) {
            return Err(PatchError::keeping(old, error));
        }
        self.release(&old);
        if let Err(error) = self.with_host(|tree| tree.remove_child(parent, old_host)) {
            return Err(PatchError::keeping(mounted, error));
        }
        if let Err(error) = self.run_mount_hooks(mounts) {
            return Err(PatchError::keeping(mounted, error));
        }
        Ok(mounted)
    }

    fn update(
        &self,
        parent: HostNodeId,
        old: MountedNode,
        new: VNode,
    ) -> Result<MountedNode, PatchError> {
        match old {
            MountedNode::Text { vnode, host } => {
                if vnode.prop(CONTENT) != new.prop(CONTENT) {
                    let content = text_content(&new);
                    if let Err(error) = self.with_host(|tree| tree.set_text(host, &content)) {
                        return Err(PatchError::keeping(MountedNode::Text { vnode, host }, error));
                    }
                }
                Ok(MountedNode::Text { vnode: new, host })
            }
            MountedNode::Element {
                vnode,
                host,
                children,
            } => {
                let (new, new_children) = new.split_children();
                if let Err(error) = self.apply_props(host, vnode.props(), new.props()) {
                    let kept = MountedNode::Element {
                        vnode,
                        host,
                        children,
                    };
                    return Err(PatchError::keeping(kept, error));
                }
                if vnode.node_ref() != new.node_ref() {
                    if let Some(node_ref) = vnode.node_ref() {
                        node_ref.detach(host);
                    }
                    if let Some(node_ref) = new.node_ref() {
                        node_ref.attach(host);
                    }
                }
                match self.reconcile_children(host, children, new_children) {
                    Ok(children) => Ok(MountedNode::Element {
                        vnode: new,
                        host,
                        children,
                    }),
                    Err((children, error)) => {
                        let kept = MountedNode::Element {
                            vnode: new,
                            host,
                            children,
                        };
                        Err(PatchError::keeping(kept, error))
                    }
                }
            }
            MountedNode::Composite { vnode, rendered } => {
                let next = match new.kind().clone() {
                    NodeKind::Memo(_) if shallow_equal(vnode.props(), new.props()) => {
                        log::trace!("memo {} props unchanged", new.kind().name());
                        return Ok(MountedNode::Composite {
                            vnode: new,
                            rendered,
                        });
                    }
                    NodeKind::Function(component) | NodeKind::Memo(component) => {
                        Ok(component.call(new.props()))
                    }
                    NodeKind::Consumer(context) => self.render_consumer(&context, &new),
                    kind => Err(RenderError::InvalidElement {
                        kind: kind.name().to_owned(),
                        reason: "not a composite kind",
                    }),
                };
                let next = match next {
                    Ok(next) => next,
                    Err(error) => {
                        return Err(PatchError::keeping(
                            MountedNode::Composite { vnode, rendered },
                            error,
                        ))
                    }
                };
                match self.patch_in_place(parent, *rendered, next) {
                    Ok(rendered) => Ok(MountedNode::Composite {
                        vnode: new,
                        rendered: Box::new(rendered),
                    }),
                    Err(failed) => Err(failed.wrap(|rendered| MountedNode::Composite {
                        vnode,
                        rendered: Box::new(rendered),
                    })),
                }
            }
            MountedNode::Provider {
                vnode,
                cell,
                rendered,
            } => {
                let NodeKind::Provider(context) = new.kind().clone() else {
                    let error = RenderError::InvalidElement {
                        kind: new.kind().name().to_owned(),
                        reason: "not a provider",
                    };
                    let kept = MountedNode::Provider {
                        vnode,
                        cell,
                        rendered,
                    };
                    return Err(PatchError::keeping(kept, error));
                };
                let (new, child) = match provider_child(new) {
                    Ok(split) => split,
                    Err(error) => {
                        let kept = MountedNode::Provider {
                            vnode,
                            cell,
                            rendered,
                        };
                        return Err(PatchError::keeping(kept, error));
                    }
                };
                context.update(&cell, provided_value(&new));
                let old_child = *rendered;
                let patched = self.within_provider(&context, &cell, || {
                    self.patch_in_place(parent, old_child, child)
                });
                match patched {
                    Ok(rendered) => Ok(MountedNode::Provider {
                        vnode: new,
                        cell,
                        rendered: Box::new(rendered),
                    }),
                    Err(failed) => Err(failed.wrap(|rendered| MountedNode::Provider {
                        vnode: new,
                        cell,
                        rendered: Box::new(rendered),
                    })),
                }
            }
            MountedNode::Class { vnode, instance } => {
                // The instance restores its own rendered record on failure.
                match self.emit_update(&instance, new.props().clone()) {
                    Ok(()) => Ok(MountedNode::Class {
                        vnode: new,
                        instance,
                    }),
                    Err(error) => Err(PatchError::keeping(
                        MountedNode::Class { vnode, instance },
                        error,
                    )),
                }
            }
        }
    }

    /// Builds the host subtree for `vnode` without attaching its root.
    ///
    /// Class instances are pushed onto `mounts` after their children, so
    /// running the queue in order fires mount hooks bottom-up.
    pub(crate) fn mount(
        &self,
        vnode: VNode,
        mounts: &mut MountQueue,
    ) -> Result<MountedNode, RenderError> {
        log::trace!("mounting {}", vnode.kind().name());
        match vnode.kind().clone() {
            NodeKind::Text => {
                let content = text_content(&vnode);
                let host = self.with_host(|tree| tree.create_text(&content));
                Ok(MountedNode::Text { vnode, host })
            }
            NodeKind::Host(tag) => {
                if tag.is_empty() {
                    return Err(RenderError::InvalidElement {
                        kind: String::new(),
                        reason: "host elements need a tag name",
                    });
                }
                let host = self.with_host(|tree| tree.create_element(&tag));
                let (vnode, children) = vnode.split_children();
                self.apply_props(host, &Map::new(), vnode.props())?;
                let mut mounted = Vec::with_capacity(children.len());
                for child in children {
                    let Some(child) = child else {
                        mounted.push(None);
                        continue;
                    };
                    let child = self.mount(child, mounts)?;
                    let child_host = child.root_host()?;
                    self.with_host(|tree| tree.append_child(host, child_host))?;
                    mounted.push(Some(child));
                }
                if let Some(node_ref) = vnode.node_ref() {
                    node_ref.attach(host);
                }
                Ok(MountedNode::Element {
                    vnode,
                    host,
                    children: mounted,
                })
            }
            NodeKind::Function(component) | NodeKind::Memo(component) => {
                let rendered = self.mount(component.call(vnode.props()), mounts)?;
                Ok(MountedNode::Composite {
                    vnode,
                    rendered: Box::new(rendered),
                })
            }
            NodeKind::Class(ty) => self.mount_class(ty, vnode, mounts),
            NodeKind::Provider(context) => {
                let (vnode, child) = provider_child(vnode)?;
                let cell = context.provide(provided_value(&vnode));
                let rendered = self.within_provider(&context, &cell, || self.mount(child, mounts))?;
                Ok(MountedNode::Provider {
                    vnode,
                    cell,
                    rendered: Box::new(rendered),
                })
            }
            NodeKind::Consumer(context) => {
                let next = self.render_consumer(&context, &vnode)?;
                let rendered = self.mount(next, mounts)?;
                Ok(MountedNode::Composite {
                    vnode,
                    rendered: Box::new(rendered),
                })
            }
        }
    }

    fn mount_class(
        &self,
        ty: ComponentType,
        vnode: VNode,
        mounts: &mut MountQueue,
    ) -> Result<MountedNode, RenderError> {
        let scope = self.context.borrow().clone();
        let instance =
            ComponentInstance::new(ty, vnode.props().clone(), scope, self.self_ref.clone());
        if let Some(context) = ty.context() {
            let cell = instance.scope.resolve(&context);
            *instance.context.borrow_mut() = Some(cell);
        }

        let behavior = Rc::clone(&instance.behavior);
        let handle = instance.handle();
        let next = {
            // Updates requested before the first render stay pending.
            let _mounting = FlushGuard::new(&instance);
            let props = instance.props.borrow().clone();
            if instance.has(Hooks::WILL_MOUNT) {
                behavior.will_mount(&handle);
                let pending = instance.updater.take();
                let state = instance.state.borrow().clone();
                let state = fold_deltas(&state, &props, pending.deltas);
                *instance.state.borrow_mut() = state;
                for callback in pending.callbacks {
                    callback();
                }
            }
            let mut state = instance.state.borrow().clone();
            ty.derive_into(&props, &mut state);
            *instance.state.borrow_mut() = state;
            behavior.render(&handle)
        };

        let rendered = self.mount(next, mounts)?;
        *instance.rendered.borrow_mut() = Some(rendered);
        mounts.push(Rc::clone(&instance));
        Ok(MountedNode::Class { vnode, instance })
    }

    /// Runs mount-completion hooks once the subtree is attached, then
    /// schedules anything requested before the first render finished.
    pub(crate) fn run_mount_hooks(&self, mounts: MountQueue) -> Result<(), RenderError> {
        for instance in &mounts {
            if instance.unmounted.get() || !instance.has(Hooks::DID_MOUNT) {
                continue;
            }
            Rc::clone(&instance.behavior).did_mount(&instance.handle());
        }
        for instance in &mounts {
            if !instance.unmounted.get() && instance.updater.has_pending() {
                self.schedule(instance)?;
            }
        }
        Ok(())
    }

    fn unmount_node(&self, parent: HostNodeId, old: MountedNode) -> Result<(), PatchError> {
        log::trace!("unmounting {}", old.vnode().kind().name());
        let host = match old.root_host() {
            Ok(host) => host,
            Err(error) => return Err(PatchError::keeping(old, error)),
        };
        self.release(&old);
        self.with_host(|tree| tree.remove_child(parent, host))
            .map_err(PatchError::lost)
    }

    /// Runs unmount hooks deepest first and drops handlers and refs of the
    /// subtree. Host nodes stay attached; the caller detaches the root.
    fn release(&self, node: &MountedNode) {
        let mut released = Released::default();
        node.collect(&mut released);
        // Marked up front so updates requested from unmount hooks are ignored.
        for instance in &released.instances {
            instance.unmounted.set(true);
        }
        for instance in &released.instances {
            if instance.has(Hooks::WILL_UNMOUNT) {
                Rc::clone(&instance.behavior).will_unmount(&instance.handle());
            }
        }
        for host in &released.hosts {
            self.events.forget(*host);
        }
        for (node_ref, host) in &released.refs {
            node_ref.detach(*host);
        }
    }

    /// Property diff for one host element.
    ///
    /// Style fields are merged one by one and never removed. `on<event>`
    /// props holding a handler are routed to the event registry. Plain props
    /// missing from `new` are assigned `Null`.
    pub(crate) fn apply_props(
        &self,
        host: HostNodeId,
        old: &Map,
        new: &Map,
    ) -> Result<(), RenderError> {
        for (key, value) in new {
            if key == CHILDREN {
                continue;
            }
            let previous = old.get(key);
            if key == STYLE {
                self.apply_style(host, previous, value)?;
                continue;
            }
            if let Some(event_type) = event_type_of(key) {
                if let Value::Handler(handler) = value {
                    self.register_handler(host, &event_type, Rc::clone(handler));
                    continue;
                }
                if let Some(Value::Handler(_)) = previous {
                    self.events.unregister(host, &event_type);
                }
            }
            if previous == Some(value) {
                continue;
            }
            self.with_host(|tree| tree.set_property(host, key, value))?;
        }

        for (key, previous) in old {
            if key == CHILDREN || key == STYLE || new.contains_key(key) {
                continue;
            }
            match (event_type_of(key), previous) {
                (Some(event_type), Value::Handler(_)) => {
                    self.events.unregister(host, &event_type)
                }
                _ => self.with_host(|tree| tree.set_property(host, key, &Value::Null))?,
            }
        }
        Ok(())
    }

    fn apply_style(
        &self,
        host: HostNodeId,
        previous: Option<&Value>,
        style: &Value,
    ) -> Result<(), RenderError> {
        let Some(fields) = style.as_map() else {
            if previous != Some(style) {
                self.with_host(|tree| tree.set_property(host, STYLE, style))?;
            }
            return Ok(());
        };
        let previous = previous.and_then(Value::as_map);
        for (field, value) in fields {
            if previous.and_then(|old| old.get(field)) == Some(value) {
                continue;
            }
            self.with_host(|tree| tree.set_style_field(host, field, value))?;
        }
        Ok(())
    }

    /// Positional children diff over child slots.
    ///
    /// A child filling a previously empty slot is inserted before the
    /// nearest later old child that still has a host node, so it lands in
    /// document order.
    ///
    /// On failure the slots handed back describe the host children as they
    /// are: patched slots, the failing slot's kept record and the untouched
    /// old slots after it.
    pub(crate) fn reconcile_children(
        &self,
        parent: HostNodeId,
        mut old: Vec<Option<MountedNode>>,
        new: Vec<Option<VNode>>,
    ) -> Result<Vec<Option<MountedNode>>, (Vec<Option<MountedNode>>, RenderError)> {
        let new_len = new.len();
        let len = old.len().max(new_len);
        let mut new_slots = new.into_iter();
        let mut next = Vec::with_capacity(new_len);

        for index in 0..len {
            let old_child = old.get_mut(index).and_then(Option::take);
            let new_child = new_slots.next().flatten();
            let anchor = old
                .get(index + 1..)
                .into_iter()
                .flatten()
                .flatten()
                .find_map(MountedNode::first_host);
            match self.patch(parent, old_child, new_child, anchor) {
                Ok(mounted) => {
                    if index < new_len {
                        next.push(mounted);
                    }
                }
                Err(failed) => {
                    next.push(failed.kept);
                    next.extend(old.drain(..).skip(index + 1));
                    return Err((next, failed.error));
                }
            }
        }
        Ok(next)
    }

    fn render_consumer(&self, context: &Context, vnode: &VNode) -> Result<VNode, RenderError> {
        let render = vnode
            .children()
            .and_then(Value::as_render_fn)
            .cloned()
            .ok_or_else(|| RenderError::MissingRenderProp {
                component: vnode.kind().name().to_owned(),
            })?;
        let value = self.context.borrow().resolve(context).get();
        Ok(render(&value))
    }

    fn within_provider<R>(&self, context: &Context, cell: &ContextCell, f: impl FnOnce() -> R) -> R {
        let pushed = self.context.borrow_mut().push(context, cell.clone());
        let result = f();
        if pushed {
            self.context.borrow_mut().pop();
        }
        result
    }
}

fn text_content(vnode: &VNode) -> String {
    vnode.prop(CONTENT).map(Value::to_string).unwrap_or_default()
}

fn provided_value(vnode: &VNode) -> Map {
    vnode
        .prop(PROVIDER_VALUE)
        .and_then(Value::as_map)
        .cloned()
        .unwrap_or_default()
}

fn provider_child(vnode: VNode) -> Result<(VNode, VNode), RenderError> {
    let (vnode, children) = vnode.split_children();
    let mut children: Vec<VNode> = children.into_iter().flatten().collect();
    match children.pop() {
        Some(child) if children.is_empty() => Ok((vnode, child)),
        popped => Err(RenderError::ProviderChildren {
            count: children.len() + usize::from(popped.is_some()),
        }),
    }
}
