//! Dereferencing: replace every `$ref` with the value it points to.
//!
//! The output is a [`Graph`]. A reference to an object that is still
//! being crawled (an ancestor of the reference) becomes an edge back to
//! that object's node, so circular schemas dereference into cyclic
//! graphs instead of recursing forever. An object is crawled once per
//! location; later references to it share its node.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::RefError;
use crate::graph::{Graph, GraphNode, NodeId};
use crate::options::{CircularMode, ParserOptions};
use crate::pointer;
use crate::reference::{Node, Reference, REF_KEY};
use crate::refs::Refs;
use crate::resolve::{resolve, Source};
use crate::uri;

/// A dereferenced document.
#[derive(Debug, Clone)]
pub struct Dereferenced {
    pub graph: Graph,
    pub root: NodeId,
    /// Whether a circular reference was found.
    pub circular: bool,
    /// The registry the document was dereferenced from.
    pub refs: Refs,
}

impl Dereferenced {
    /// Render as a tree; cycles are written as `$ref`s to the first occurrence.
    pub fn to_value(&self) -> Value {
        self.graph.to_value(self.root)
    }
}

/// Resolve `source` and dereference its root document.
///
/// # Errors
///
/// Everything [`resolve`] can fail with, plus `BrokenPointer` and
/// `MalformedPointer` for bad targets, and `CircularReference` when
/// circular references are disallowed.
pub fn dereference(source: impl Into<Source>, options: &ParserOptions) -> Result<Dereferenced, RefError> {
    let refs = resolve(source, options)?;
    dereference_refs(refs, options)
}

/// Dereference the root document of an already resolved registry.
pub fn dereference_refs(mut refs: Refs, options: &ParserOptions) -> Result<Dereferenced, RefError> {
    let (graph, root, circular) = {
        let mut dereferencer = Dereferencer {
            refs: &refs,
            options,
            root_key: uri::document_key(refs.root().uri().as_str()),
            graph: Graph::new(),
            cache: HashMap::new(),
            active: HashMap::new(),
            circular: false,
        };
        let root = dereferencer.crawl(refs.root().value(), &refs.root().path(), "#")?;
        (dereferencer.graph, root, dereferencer.circular)
    };

    if circular {
        refs.mark_circular();
    }
    tracing::debug!(nodes = graph.len(), circular, "dereferenced document");
    Ok(Dereferenced {
        graph,
        root,
        circular,
        refs,
    })
}

struct Dereferencer<'r> {
    refs: &'r Refs,
    options: &'r ParserOptions,
    root_key: String,
    graph: Graph,
    /// Finished nodes by location.
    cache: HashMap<String, NodeId>,
    /// Containers on the current crawl path, by location.
    active: HashMap<String, NodeId>,
    circular: bool,
}

impl Dereferencer<'_> {
    /// Crawl `value`, which lives at `location` and appears at
    /// `path_from_root` in the output.
    fn crawl(&mut self, value: &Value, location: &str, path_from_root: &str) -> Result<NodeId, RefError> {
        if self.options.dereference.is_excluded(path_from_root) {
            return Ok(self.graph.leaf(value.clone()));
        }
        if let Some(&id) = self.cache.get(location) {
            return Ok(id);
        }

        match Node::of(value) {
            Node::Ref(reference) => self.dereference_ref(reference, location, path_from_root),
            Node::Object(map) => {
                let id = self.graph.alloc(GraphNode::Leaf(Value::Null));
                self.active.insert(location.to_string(), id);
                let mut entries = Vec::with_capacity(map.len());
                for (key, child) in map {
                    let child_id = self.crawl(
                        child,
                        &pointer::join(location, &[key]),
                        &pointer::join(path_from_root, &[key]),
                    )?;
                    entries.push((key.clone(), child_id));
                }
                self.finish(location, id, GraphNode::Object(entries));
                Ok(id)
            }
            Node::Array(items) => {
                let id = self.graph.alloc(GraphNode::Leaf(Value::Null));
                self.active.insert(location.to_string(), id);
                let mut children = Vec::with_capacity(items.len());
                for (idx, child) in items.iter().enumerate() {
                    let token = idx.to_string();
                    children.push(self.crawl(
                        child,
                        &pointer::join(location, &[&token]),
                        &pointer::join(path_from_root, &[&token]),
                    )?);
                }
                self.finish(location, id, GraphNode::Array(children));
                Ok(id)
            }
            Node::Scalar(value) => Ok(self.graph.leaf(value.clone())),
        }
    }

    fn finish(&mut self, location: &str, id: NodeId, node: GraphNode) {
        self.active.remove(location);
        self.graph.replace(id, node);
        self.cache.insert(location.to_string(), id);
    }

    fn dereference_ref(
        &mut self,
        reference: Reference<'_>,
        location: &str,
        path_from_root: &str,
    ) -> Result<NodeId, RefError> {
        let refs = self.refs;
        let target = pointer::normalize(&uri::resolve(location, reference.target())?)?;
        if !self.options.resolve.external && uri::document_key(&target) != uri::document_key(location) {
            return Ok(self.graph.leaf(Value::Object(reference.node().clone())));
        }

        let resolved = refs.lookup(&target, location)?;

        if resolved.circular {
            // The chain of references never reaches a value.
            self.found_circular(path_from_root)?;
            let local = if target == location {
                path_from_root.to_string()
            } else {
                self.local_target(&target)
            };
            return Ok(self.graph.leaf(reference.retarget(local)));
        }

        if let Some(&ancestor) = self.active.get(&resolved.path) {
            self.found_circular(path_from_root)?;
            if self.options.dereference.circular == CircularMode::Ignore {
                tracing::warn!(path = path_from_root, target = %target, "leaving circular $ref in place");
                let local = self.local_target(&target);
                return Ok(self.graph.leaf(reference.retarget(local)));
            }
            return Ok(ancestor);
        }

        let id = if reference.is_extended() {
            self.merge_extended(&reference, &resolved.value, &resolved.path, location, path_from_root)?
        } else {
            self.crawl(&resolved.value, &resolved.path, path_from_root)?
        };
        self.cache.insert(location.to_string(), id);

        if let Some(hook) = &self.options.dereference.on_dereference {
            hook(reference.target(), &*resolved.value);
        }
        Ok(id)
    }

    /// An object holding the extensions of `reference` (crawled where the
    /// reference lives) over the entries of its target (crawled where the
    /// target lives).
    fn merge_extended(
        &mut self,
        reference: &Reference<'_>,
        target: &Value,
        target_path: &str,
        location: &str,
        path_from_root: &str,
    ) -> Result<NodeId, RefError> {
        let id = self.graph.alloc(GraphNode::Leaf(Value::Null));
        self.active.insert(location.to_string(), id);

        let mut entries = Vec::new();
        for (key, child) in reference.extensions() {
            let child_id = self.crawl(
                child,
                &pointer::join(location, &[key]),
                &pointer::join(path_from_root, &[key]),
            )?;
            entries.push((key.clone(), child_id));
        }

        let target_id = self.crawl(target, target_path, path_from_root)?;
        if self.active.values().any(|&active| active == target_id) {
            // Target is still being built; the extensions are dropped.
            self.active.remove(location);
            return Ok(target_id);
        }

        let node = match self.graph.get(target_id) {
            Some(GraphNode::Object(target_entries)) => {
                for (key, child_id) in target_entries {
                    if !reference.node().contains_key(key) || key == REF_KEY {
                        entries.push((key.clone(), *child_id));
                    }
                }
                GraphNode::Object(entries)
            }
            Some(GraphNode::Leaf(value)) => GraphNode::Leaf(reference.merge(value)),
            Some(other) => other.clone(),
            None => GraphNode::Leaf(target.clone()),
        };
        self.finish(location, id, node);
        Ok(id)
    }

    fn found_circular(&mut self, path_from_root: &str) -> Result<(), RefError> {
        self.circular = true;
        if self.options.dereference.circular == CircularMode::Disallow {
            return Err(RefError::CircularReference {
                path: path_from_root.to_string(),
            });
        }
        Ok(())
    }

    /// A `$ref` string for `target` that is valid from the root document.
    fn local_target(&self, target: &str) -> String {
        if uri::document_key(target) == self.root_key {
            pointer::hash(target).to_string()
        } else {
            target.to_string()
        }
    }
}
