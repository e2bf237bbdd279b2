//! In-memory [`HostTree`] used by tests, benchmarks and headless demos.
//!
//! Nodes live in an index arena and are never freed: a removed node is only
//! detached, as it would be in a DOM. Every mutation is appended to a log of
//! [`HostOp`]s so callers can assert how much work a patch performed.

use smallvec::SmallVec;
use std::any::Any;
use std::fmt::Write as _;

use crate::events::DelegatedListener;
use crate::host::{HostError, HostNodeId, HostTree};
use crate::value::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { id: HostNodeId, tag: String },
    CreateText { id: HostNodeId, content: String },
    SetText { id: HostNodeId, content: String },
    Append { parent: HostNodeId, child: HostNodeId },
    InsertBefore { parent: HostNodeId, child: HostNodeId, anchor: HostNodeId },
    Remove { parent: HostNodeId, child: HostNodeId },
    SetProperty { id: HostNodeId, key: String, value: Value },
    SetStyle { id: HostNodeId, field: String, value: Value },
}

impl HostOp {
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }
}

#[derive(Debug)]
enum HostNodeData {
    Element { tag: String },
    Text { content: String },
}

#[derive(Debug)]
struct HostNode {
    data: HostNodeData,
    parent: Option<HostNodeId>,
    children: SmallVec<[HostNodeId; 4]>,
    properties: Map,
    style: Map,
}

impl HostNode {
    fn new(data: HostNodeData) -> Self {
        Self {
            data,
            parent: None,
            children: SmallVec::new(),
            properties: Map::new(),
            style: Map::new(),
        }
    }
}

#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<HostNode>,
    listeners: indexmap::IndexMap<String, DelegatedListener>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tag(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(id)?.data {
            HostNodeData::Element { tag } => Some(tag),
            HostNodeData::Text { .. } => None,
        }
    }

    pub fn text(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(id)?.data {
            HostNodeData::Text { content } => Some(content),
            HostNodeData::Element { .. } => None,
        }
    }

    pub fn children(&self, id: HostNodeId) -> Vec<HostNodeId> {
        self.nodes
            .get(id)
            .map(|node| node.children.to_vec())
            .unwrap_or_default()
    }

    pub fn property(&self, id: HostNodeId, key: &str) -> Option<&Value> {
        self.nodes.get(id)?.properties.get(key)
    }

    pub fn style(&self, id: HostNodeId, field: &str) -> Option<&Value> {
        self.nodes.get(id)?.style.get(field)
    }

    /// Concatenated text of every text node below `id`, in tree order.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    fn collect_text(&self, id: HostNodeId, output: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.data {
            HostNodeData::Text { content } => output.push_str(content),
            HostNodeData::Element { .. } => {
                for &child in &node.children {
                    self.collect_text(child, output);
                }
            }
        }
    }

    /// Every node attached below `root`, in pre-order.
    pub fn descendants(&self, root: HostNodeId) -> Vec<HostNodeId> {
        let mut output = Vec::new();
        let mut stack: Vec<HostNodeId> = self.children(root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            output.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        output
    }

    pub fn find_by_tag(&self, root: HostNodeId, tag: &str) -> Vec<HostNodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.tag(id) == Some(tag))
            .collect()
    }

    pub fn listener(&self, event_type: &str) -> Option<DelegatedListener> {
        self.listeners.get(event_type).cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn dump_tree(&self, root: HostNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        match &node.data {
            HostNodeData::Text { content } => {
                let _ = writeln!(output, "{indent}[{id}] {content:?}");
            }
            HostNodeData::Element { tag } => {
                let _ = write!(output, "{indent}[{id}] <{tag}>");
                for (key, value) in &node.properties {
                    let _ = write!(output, " {key}={value:?}");
                }
                if !node.style.is_empty() {
                    let _ = write!(output, " style={:?}", node.style);
                }
                output.push('\n');
                for &child in &node.children {
                    self.dump_node(output, child, depth + 1);
                }
            }
        }
    }

    fn node(&self, id: HostNodeId) -> Result<&HostNode, HostError> {
        self.nodes.get(id).ok_or(HostError::Missing { id })
    }

    fn node_mut(&mut self, id: HostNodeId) -> Result<&mut HostNode, HostError> {
        self.nodes.get_mut(id).ok_or(HostError::Missing { id })
    }

    fn element_mut(&mut self, id: HostNodeId) -> Result<&mut HostNode, HostError> {
        let node = self.node_mut(id)?;
        match node.data {
            HostNodeData::Element { .. } => Ok(node),
            HostNodeData::Text { .. } => Err(HostError::NotAnElement { id }),
        }
    }

    fn create(&mut self, data: HostNodeData) -> HostNodeId {
        let id = self.nodes.len();
        self.nodes.push(HostNode::new(data));
        id
    }

    fn detach(&mut self, child: HostNodeId) -> Result<(), HostError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|id| *id != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }
}

impl HostTree for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostNodeId {
        let id = self.create(HostNodeData::Element {
            tag: tag.to_owned(),
        });
        self.ops.push(HostOp::CreateElement {
            id,
            tag: tag.to_owned(),
        });
        id
    }

    fn create_text(&mut self, content: &str) -> HostNodeId {
        let id = self.create(HostNodeData::Text {
            content: content.to_owned(),
        });
        self.ops.push(HostOp::CreateText {
            id,
            content: content.to_owned(),
        });
        id
    }

    fn set_text(&mut self, id: HostNodeId, content: &str) -> Result<(), HostError> {
        match &mut self.node_mut(id)?.data {
            HostNodeData::Text { content: current } => {
                content.clone_into(current);
            }
            HostNodeData::Element { .. } => return Err(HostError::NotAText { id }),
        }
        self.ops.push(HostOp::SetText {
            id,
            content: content.to_owned(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError> {
        self.element_mut(parent)?;
        self.detach(child)?;
        self.element_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::Append { parent, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostNodeId,
        child: HostNodeId,
        anchor: HostNodeId,
    ) -> Result<(), HostError> {
        if self.node(anchor)?.parent != Some(parent) {
            return Err(HostError::NotAChild {
                parent,
                child: anchor,
            });
        }
        self.detach(child)?;
        let siblings = &mut self.element_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|id| *id == anchor)
            .ok_or(HostError::NotAChild {
                parent,
                child: anchor,
            })?;
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            anchor,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostNodeId, child: HostNodeId) -> Result<(), HostError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child)?;
        self.ops.push(HostOp::Remove { parent, child });
        Ok(())
    }

    fn set_property(
        &mut self,
        id: HostNodeId,
        key: &str,
        value: &Value,
    ) -> Result<(), HostError> {
        self.element_mut(id)?
            .properties
            .insert(key.to_owned(), value.clone());
        self.ops.push(HostOp::SetProperty {
            id,
            key: key.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn set_style_field(
        &mut self,
        id: HostNodeId,
        field: &str,
        value: &Value,
    ) -> Result<(), HostError> {
        self.element_mut(id)?
            .style
            .insert(field.to_owned(), value.clone());
        self.ops.push(HostOp::SetStyle {
            id,
            field: field.to_owned(),
            value: value.clone(),
        });
        Ok(())
    }

    fn install_delegated_listener(&mut self, event_type: &str, listener: DelegatedListener) {
        self.listeners.insert(event_type.to_owned(), listener);
    }

    fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.nodes.get(id)?.parent
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
