//! Virtual node model.
//!
//! A [`VNode`] describes one tree position for one render pass. Its
//! [`NodeKind`] is resolved once, at construction, into a tagged variant so
//! the reconciler never has to inspect a type at patch time.

use std::fmt;
use std::rc::Rc;

use crate::component::{ComponentClass, ComponentType};
use crate::context::Context;
use crate::node_ref::NodeRef;
use crate::value::{Map, Value};

/// Reserved prop key holding a node's children.
pub const CHILDREN: &str = "children";

/// Prop key holding the content of a text node.
pub const CONTENT: &str = "content";

const STRIPPED_CONFIG_KEYS: [&str; 2] = ["__source", "__self"];

/// Signature of a function component.
pub type RenderFunction = fn(&Map) -> VNode;

/// A stateless component: a named pure function from props to a tree.
///
/// Identity is the function pointer, so two elements built from the same
/// function are reconciled in place.
#[derive(Clone, Copy)]
pub struct FunctionComponent {
    name: &'static str,
    render: RenderFunction,
}

impl FunctionComponent {
    pub const fn new(name: &'static str, render: RenderFunction) -> Self {
        Self { name, render }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self, props: &Map) -> VNode {
        (self.render)(props)
    }

    fn same(&self, other: &Self) -> bool {
        self.render as usize == other.render as usize
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionComponent({})", self.name)
    }
}

#[derive(Clone)]
pub enum NodeKind {
    Text,
    Host(Rc<str>),
    Function(FunctionComponent),
    Class(ComponentType),
    /// Function component that skips re-invocation on shallow-equal props.
    Memo(FunctionComponent),
    Provider(Context),
    Consumer(Context),
}

impl NodeKind {
    pub fn host(tag: &str) -> Self {
        NodeKind::Host(Rc::from(tag))
    }

    pub fn class<C: ComponentClass>() -> Self {
        NodeKind::Class(ComponentType::of::<C>())
    }

    /// Two kinds are the same type when the reconciler may update one into
    /// the other in place.
    pub fn same_type(&self, other: &NodeKind) -> bool {
        match (self, other) {
            (NodeKind::Text, NodeKind::Text) => true,
            (NodeKind::Host(a), NodeKind::Host(b)) => a == b,
            (NodeKind::Function(a), NodeKind::Function(b)) => a.same(b),
            (NodeKind::Memo(a), NodeKind::Memo(b)) => a.same(b),
            (NodeKind::Class(a), NodeKind::Class(b)) => a.same(b),
            (NodeKind::Provider(a), NodeKind::Provider(b)) => a.same(b),
            (NodeKind::Consumer(a), NodeKind::Consumer(b)) => a.same(b),
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeKind::Text => "#text",
            NodeKind::Host(tag) => tag,
            NodeKind::Function(component) | NodeKind::Memo(component) => component.name(),
            NodeKind::Class(ty) => ty.name(),
            NodeKind::Provider(_) => "Provider",
            NodeKind::Consumer(_) => "Consumer",
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Text => f.write_str("Text"),
            NodeKind::Host(tag) => write!(f, "Host({tag})"),
            NodeKind::Function(component) => write!(f, "Function({})", component.name()),
            NodeKind::Memo(component) => write!(f, "Memo({})", component.name()),
            NodeKind::Class(ty) => write!(f, "Class({})", ty.name()),
            NodeKind::Provider(_) => f.write_str("Provider"),
            NodeKind::Consumer(_) => f.write_str("Consumer"),
        }
    }
}

/// Children stored under the [`CHILDREN`] prop.
///
/// A sequence keeps a `None` slot for every child that renders nothing
/// (`Null`, `Bool`), so conditional children keep their position.
#[derive(Clone, Debug, PartialEq)]
pub enum Children {
    Single(Box<VNode>),
    Many(Vec<Option<VNode>>),
}

impl Children {
    /// Number of slots, holes included.
    pub fn len(&self) -> usize {
        match self {
            Children::Single(_) => 1,
            Children::Many(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coerces to an ordered sequence of slots; a lone child becomes one.
    pub fn into_slots(self) -> Vec<Option<VNode>> {
        match self {
            Children::Single(node) => vec![Some(*node)],
            Children::Many(slots) => slots,
        }
    }

    /// The children that render something, in order.
    pub fn nodes(&self) -> impl Iterator<Item = &VNode> {
        let (single, many) = match self {
            Children::Single(node) => (Some(&**node), None),
            Children::Many(slots) => (None, Some(slots.iter().flatten())),
        };
        single.into_iter().chain(many.into_iter().flatten())
    }
}

/// Immutable description of one tree position for one render pass.
#[derive(Clone)]
pub struct VNode {
    kind: NodeKind,
    props: Map,
    key: Option<String>,
    node_ref: Option<NodeRef>,
}

impl VNode {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn props(&self) -> &Map {
        &self.props
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn children(&self) -> Option<&Value> {
        self.props.get(CHILDREN)
    }

    pub fn same_type(&self, other: &VNode) -> bool {
        self.kind.same_type(&other.kind)
    }

    /// Splits the node into itself without children and its child slots.
    ///
    /// Children that are not virtual nodes (render props, raw data) yield an
    /// empty sequence.
    pub(crate) fn split_children(mut self) -> (VNode, Vec<Option<VNode>>) {
        let children = match self.props.shift_remove(CHILDREN) {
            Some(Value::Children(children)) => children.into_slots(),
            Some(Value::Element(node)) => vec![Some(*node)],
            Some(other) => {
                self.props.insert(CHILDREN.to_owned(), other);
                Vec::new()
            }
            None => Vec::new(),
        };
        (self, children)
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other) && self.key == other.key && self.props == other.props
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("VNode");
        debug.field("kind", &self.kind);
        if let Some(key) = &self.key {
            debug.field("key", key);
        }
        debug.field("props", &self.props).finish()
    }
}

/// Builds a virtual node.
///
/// `key` and `ref` are lifted out of `config`, bookkeeping entries
/// (`__source`, `__self`) are dropped and every other entry becomes a prop.
/// String and number children are wrapped into text nodes; a single child is
/// stored as-is, several become an ordered sequence of slots in which
/// children rendering nothing leave a hole. A list child (typically a mapped
/// collection) is spliced into the sequence item by item.
pub fn make_element(kind: NodeKind, mut config: Map, children: Vec<Value>) -> VNode {
    for key in STRIPPED_CONFIG_KEYS {
        config.shift_remove(key);
    }
    let key = config
        .shift_remove("key")
        .filter(|value| !value.is_null())
        .map(|value| value.to_string());
    let node_ref = match config.shift_remove("ref") {
        Some(Value::Ref(node_ref)) => Some(node_ref),
        _ => None,
    };

    let mut props = config;
    let mut children = children;
    match children.len() {
        0 => {}
        1 => {
            if let Some(child) = children.pop().and_then(normalize_single) {
                props.insert(CHILDREN.to_owned(), child);
            }
        }
        _ => {
            let mut slots = Vec::with_capacity(children.len());
            for child in children {
                push_slots(child, &mut slots);
            }
            props.insert(CHILDREN.to_owned(), Value::Children(Children::Many(slots)));
        }
    }

    VNode {
        kind,
        props,
        key,
        node_ref,
    }
}

fn wrap_child(child: Value) -> Option<VNode> {
    match child {
        Value::Null | Value::Bool(_) => None,
        Value::Str(_) | Value::Int(_) | Value::Float(_) => Some(text(child)),
        Value::Element(node) => Some(*node),
        Value::Children(Children::Single(node)) => Some(*node),
        other => {
            log::warn!("{other:?} cannot be rendered as a child; leaving its slot empty");
            None
        }
    }
}

/// Appends the slots `child` occupies: one per item for lists and nested
/// sequences, one otherwise.
fn push_slots(child: Value, slots: &mut Vec<Option<VNode>>) {
    match child {
        Value::List(items) => {
            for item in items {
                push_slots(item, slots);
            }
        }
        Value::Children(Children::Many(nested)) => slots.extend(nested),
        other => slots.push(wrap_child(other)),
    }
}

fn normalize_single(child: Value) -> Option<Value> {
    match child {
        Value::Null | Value::Bool(_) => None,
        Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Element(_) => {
            wrap_child(child).map(|node| Value::Children(Children::Single(Box::new(node))))
        }
        Value::List(items) => {
            let mut slots = Vec::with_capacity(items.len());
            for item in items {
                push_slots(item, &mut slots);
            }
            Some(Value::Children(Children::Many(slots)))
        }
        other => Some(other),
    }
}

/// A text node wrapping `content`.
pub fn text(content: impl Into<Value>) -> VNode {
    let mut props = Map::new();
    props.insert(CONTENT.to_owned(), content.into());
    VNode {
        kind: NodeKind::Text,
        props,
        key: None,
        node_ref: None,
    }
}

/// A host element such as `div`.
pub fn element(tag: &str, config: Map, children: Vec<Value>) -> VNode {
    make_element(NodeKind::host(tag), config, children)
}

pub fn function(component: FunctionComponent, config: Map, children: Vec<Value>) -> VNode {
    make_element(NodeKind::Function(component), config, children)
}

pub fn memo(component: FunctionComponent, config: Map, children: Vec<Value>) -> VNode {
    make_element(NodeKind::Memo(component), config, children)
}

pub fn class<C: ComponentClass>(config: Map, children: Vec<Value>) -> VNode {
    make_element(NodeKind::class::<C>(), config, children)
}
