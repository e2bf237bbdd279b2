//! Dynamic values carried by props, state, context and native events.
//!
//! Components exchange data through [`Map`], an insertion-ordered mapping of
//! string keys to [`Value`]s. Data variants compare structurally; function
//! variants ([`Value::Handler`], [`Value::Callback`], [`Value::RenderFn`])
//! compare by pointer identity.

use std::fmt;
use std::rc::Rc;

use crate::element::{Children, VNode};
use crate::events::{EventHandler, SyntheticEvent};
use crate::node_ref::NodeRef;

/// Ordered string-keyed mapping used for props, state and context values.
pub type Map = indexmap::IndexMap<String, Value>;

/// Plain callback passed down through props (e.g. `change_color`).
pub type Callback = Rc<dyn Fn(Value)>;

/// Render prop used as the child of a context consumer.
pub type RenderFn = Rc<dyn Fn(&Map) -> VNode>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map),
    Element(Box<VNode>),
    Children(Children),
    Handler(EventHandler),
    Callback(Callback),
    RenderFn(RenderFn),
    Ref(NodeRef),
}

impl Value {
    /// Wraps an event handler closure.
    pub fn handler(f: impl Fn(&SyntheticEvent) + 'static) -> Self {
        Value::Handler(Rc::new(f))
    }

    /// Wraps a plain callback closure.
    pub fn callback(f: impl Fn(Value) + 'static) -> Self {
        Value::Callback(Rc::new(f))
    }

    /// Wraps a render prop.
    pub fn render_fn(f: impl Fn(&Map) -> VNode + 'static) -> Self {
        Value::RenderFn(Rc::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Value::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn as_render_fn(&self) -> Option<&RenderFn> {
        match self {
            Value::RenderFn(render) => Some(render),
            _ => None,
        }
    }

    /// Invokes a [`Value::Callback`]; other variants are ignored.
    pub fn call(&self, argument: Value) {
        if let Value::Callback(callback) = self {
            callback(argument);
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Element(_) => "Element",
            Value::Children(_) => "Children",
            Value::Handler(_) => "Handler",
            Value::Callback(_) => "Callback",
            Value::RenderFn(_) => "RenderFn",
            Value::Ref(_) => "Ref",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Element(a), Value::Element(b)) => a == b,
            (Value::Children(a), Value::Children(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => Rc::ptr_eq(a, b),
            (Value::Callback(a), Value::Callback(b)) => Rc::ptr_eq(a, b),
            (Value::RenderFn(a), Value::RenderFn(b)) => Rc::ptr_eq(a, b),
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

/// Text rendering used for text nodes: `Null` renders as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::List(items) => {
                for item in items {
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            other => write!(f, "[{}]", other.variant_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(value) => write!(f, "{value:?}"),
            Value::Int(value) => write!(f, "{value:?}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Element(node) => write!(f, "{node:?}"),
            Value::Children(children) => write!(f, "{children:?}"),
            Value::Ref(node_ref) => write!(f, "{node_ref:?}"),
            other => write!(f, "<{}>", other.variant_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<VNode> for Value {
    fn from(value: VNode) -> Self {
        Value::Element(Box::new(value))
    }
}

impl From<Children> for Value {
    fn from(value: Children) -> Self {
        Value::Children(value)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Shallow, right-biased merge: every entry of `delta` overwrites `into`.
pub fn merge(into: &mut Map, delta: Map) {
    for (key, value) in delta {
        into.insert(key, value);
    }
}

/// Compares two maps key by key without descending into function identity.
pub fn shallow_equal(a: &Map, b: &Map) -> bool {
    a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
}

/// Builds a [`Map`] from `key => value` pairs.
///
/// ```
/// use arbor_core::{map, Value};
///
/// let props = map! { "count" => 1, "label" => "clicks" };
/// assert_eq!(props["count"], Value::Int(1));
/// ```
#[macro_export]
macro_rules! map {
    () => {
        $crate::Map::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Map::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        map
    }};
}

/// Builds a child list for [`make_element`](crate::make_element).
#[macro_export]
macro_rules! nodes {
    ($($child:expr),* $(,)?) => {
        ::std::vec![$($crate::Value::from($child)),*]
    };
}
