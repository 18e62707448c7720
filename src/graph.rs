//! Arena-backed document graph.
//!
//! A fully dereferenced document can contain cycles, which a
//! `serde_json::Value` tree cannot express. [`Graph`] stores containers as
//! lists of [`NodeId`] edges instead, so two parents may share a child and
//! a child may point back at an ancestor.

use serde_json::{Map, Value};

use crate::pointer;
use crate::reference::REF_KEY;

/// Handle to a node of a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One node of a [`Graph`].
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    /// A scalar, or a subtree kept verbatim.
    Leaf(Value),
    Array(Vec<NodeId>),
    /// Entries in document order.
    Object(Vec<(String, NodeId)>),
}

/// A document graph whose edges may be shared or cyclic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc(&mut self, node: GraphNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Replace a node allocated earlier as a placeholder.
    pub(crate) fn replace(&mut self, id: NodeId, node: GraphNode) {
        self.nodes[id.0] = node;
    }

    /// Copy `value` into the graph without interpreting it.
    pub(crate) fn leaf(&mut self, value: Value) -> NodeId {
        self.alloc(GraphNode::Leaf(value))
    }

    pub fn get(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0)
    }

    /// The child of `id` at `token`: an object key or an array index.
    ///
    /// Verbatim leaves are not descended into.
    pub fn child(&self, id: NodeId, token: &str) -> Option<NodeId> {
        match self.get(id)? {
            GraphNode::Object(entries) => entries
                .iter()
                .find(|(key, _)| key == token)
                .map(|(_, child)| *child),
            GraphNode::Array(items) => token.parse::<usize>().ok().and_then(|idx| items.get(idx).copied()),
            GraphNode::Leaf(_) => None,
        }
    }

    /// Follow the pointer in the fragment of `path` from `root`.
    pub fn pointer(&self, root: NodeId, path: &str) -> Option<NodeId> {
        let tokens = pointer::parse(path).ok()?;
        tokens
            .iter()
            .try_fold(root, |current, token| self.child(current, token))
    }

    /// Render the subgraph under `root` as a tree.
    ///
    /// Shared nodes are copied at every place they appear. An edge back to
    /// an ancestor is written as `{"$ref": "#/<path of that ancestor>"}`,
    /// with the path taken from `root`.
    pub fn to_value(&self, root: NodeId) -> Value {
        let mut ancestors = Vec::new();
        self.render(root, "#", &mut ancestors)
    }

    fn render(&self, id: NodeId, path: &str, ancestors: &mut Vec<(NodeId, String)>) -> Value {
        if let Some((_, first)) = ancestors.iter().find(|(ancestor, _)| *ancestor == id) {
            let mut node = Map::new();
            node.insert(REF_KEY.to_string(), Value::String(first.clone()));
            return Value::Object(node);
        }

        let Some(node) = self.get(id) else {
            return Value::Null;
        };
        match node {
            GraphNode::Leaf(value) => value.clone(),
            GraphNode::Array(items) => {
                ancestors.push((id, path.to_string()));
                let rendered = items
                    .iter()
                    .enumerate()
                    .map(|(idx, child)| {
                        let child_path = pointer::join(path, &[idx.to_string()]);
                        self.render(*child, &child_path, ancestors)
                    })
                    .collect();
                ancestors.pop();
                Value::Array(rendered)
            }
            GraphNode::Object(entries) => {
                ancestors.push((id, path.to_string()));
                let rendered = entries
                    .iter()
                    .map(|(key, child)| {
                        let child_path = pointer::join(path, &[key]);
                        (key.clone(), self.render(*child, &child_path, ancestors))
                    })
                    .collect();
                ancestors.pop();
                Value::Object(rendered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_tree() {
        let mut graph = Graph::new();
        let name = graph.leaf(json!("string"));
        let props = graph.alloc(GraphNode::Object(vec![("type".into(), name)]));
        let list = graph.alloc(GraphNode::Array(vec![props, props]));
        assert_eq!(graph.to_value(list), json!([{"type": "string"}, {"type": "string"}]));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn renders_cycle_as_reference_to_ancestor() {
        let mut graph = Graph::new();
        let person = graph.alloc(GraphNode::Leaf(Value::Null));
        let name = graph.leaf(json!("string"));
        let props = graph.alloc(GraphNode::Object(vec![
            ("name".into(), name),
            ("spouse".into(), person),
        ]));
        graph.replace(person, GraphNode::Object(vec![("properties".into(), props)]));
        let root = graph.alloc(GraphNode::Object(vec![("person".into(), person)]));

        assert_eq!(
            graph.to_value(root),
            json!({"person": {"properties": {"name": "string", "spouse": {"$ref": "#/person"}}}})
        );
        assert_eq!(graph.pointer(root, "#/person/properties/spouse"), Some(person));
        assert_eq!(graph.child(person, "properties"), Some(props));
    }

    #[test]
    fn pointer_does_not_descend_into_leaves() {
        let mut graph = Graph::new();
        let leaf = graph.leaf(json!({"a": 1}));
        let root = graph.alloc(GraphNode::Object(vec![("x".into(), leaf)]));
        assert_eq!(graph.pointer(root, "#/x"), Some(leaf));
        assert_eq!(graph.pointer(root, "#/x/a"), None);
        assert_eq!(graph.pointer(root, "#/y"), None);
    }
}
