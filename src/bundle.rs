//! Bundling: rewrite a multi-document schema into one self-contained
//! document whose only `$ref`s are internal.
//!
//! Bundling runs in three passes:
//!
//! 1. **Inventory.** Crawl the root document, and the target of every
//!    reference into another document, recording one [`Entry`] per
//!    reference location.
//! 2. **Decide.** Sort the entries so that references to the same target
//!    are adjacent, with the best-placed occurrence first. That
//!    occurrence inlines the target; the rest are rewritten to point at
//!    it.
//! 3. **Materialize.** Rebuild the root document, applying the decisions.
//!
//! Each external value is inlined once; every other reference to it, or
//! to anything beneath it, becomes a pointer into that copy.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::error::RefError;
use crate::options::ParserOptions;
use crate::pointer;
use crate::reference::{Node, Reference, REF_KEY};
use crate::refs::Refs;
use crate::resolve::{resolve, Source};
use crate::uri;

/// A bundled document.
#[derive(Debug, Clone)]
pub struct Bundled {
    /// The root document with every external reference inlined.
    pub value: Value,
    /// Whether a circular reference was found.
    pub circular: bool,
    /// The registry the document was bundled from.
    pub refs: Refs,
}

/// Resolve `source` and bundle it into a single document.
///
/// # Errors
///
/// Everything [`resolve`] can fail with, plus `BrokenPointer` and
/// `MalformedPointer` for bad targets.
pub fn bundle(source: impl Into<Source>, options: &ParserOptions) -> Result<Bundled, RefError> {
    let refs = resolve(source, options)?;
    bundle_refs(refs, options)
}

/// Bundle the root document of an already resolved registry.
pub fn bundle_refs(mut refs: Refs, options: &ParserOptions) -> Result<Bundled, RefError> {
    let (value, circular) = {
        let root = refs.root();
        let mut inventory = Inventory {
            refs: &refs,
            external: options.resolve.external,
            root_key: uri::document_key(root.uri().as_str()),
            entries: HashMap::new(),
            crawling: Vec::new(),
            circular: false,
        };
        inventory.crawl(root.value(), &root.path(), "#", 0)?;

        let decisions = decide(inventory.entries.into_values().collect());
        let materializer = Materializer {
            refs: &refs,
            decisions,
        };
        let value = materializer.materialize(root.value(), &root.path(), &mut HashSet::new())?;
        (value, inventory.circular)
    };

    if circular {
        refs.mark_circular();
    }
    Ok(Bundled {
        value,
        circular,
        refs,
    })
}

/// One reference occurrence.
#[derive(Debug, Clone)]
struct Entry {
    /// Where the reference node lives.
    location: String,
    /// Where it appears in the bundled document.
    path_from_root: String,
    depth: usize,
    /// Document key of the resolved target.
    file: String,
    /// Fragment of the resolved target.
    hash: String,
    /// Absolute resolved target.
    target: String,
    /// The reference chain never reaches a value.
    circular: bool,
    extended: bool,
    /// The target lives outside the root document.
    external: bool,
    indirections: usize,
}

impl Entry {
    /// Position of the last `definitions`-like container in the path.
    fn definitions_index(&self) -> Option<usize> {
        let definitions = self.path_from_root.rfind("/definitions");
        let defs = self.path_from_root.rfind("/$defs");
        definitions.max(defs)
    }
}

/// Order that puts references to one target together, best occurrence first.
fn compare(a: &Entry, b: &Entry) -> Ordering {
    a.file
        .cmp(&b.file)
        .then_with(|| a.hash.cmp(&b.hash))
        .then_with(|| b.circular.cmp(&a.circular))
        .then_with(|| a.extended.cmp(&b.extended))
        .then_with(|| a.indirections.cmp(&b.indirections))
        .then_with(|| a.depth.cmp(&b.depth))
        .then_with(|| b.definitions_index().cmp(&a.definitions_index()))
        .then_with(|| a.path_from_root.len().cmp(&b.path_from_root.len()))
        .then_with(|| a.path_from_root.cmp(&b.path_from_root))
        .then_with(|| a.location.cmp(&b.location))
}

struct Inventory<'r> {
    refs: &'r Refs,
    external: bool,
    root_key: String,
    entries: HashMap<String, Entry>,
    /// Targets whose values are being crawled.
    crawling: Vec<String>,
    circular: bool,
}

impl Inventory<'_> {
    fn crawl(
        &mut self,
        value: &Value,
        location: &str,
        path_from_root: &str,
        indirections: usize,
    ) -> Result<(), RefError> {
        match Node::of(value) {
            Node::Ref(reference) => {
                self.inventory(reference, location, path_from_root, indirections)?;
                self.crawl_object(reference.node(), location, path_from_root, indirections)
            }
            Node::Object(map) => self.crawl_object(map, location, path_from_root, indirections),
            Node::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    let token = idx.to_string();
                    self.crawl(
                        child,
                        &pointer::join(location, &[&token]),
                        &pointer::join(path_from_root, &[&token]),
                        indirections,
                    )?;
                }
                Ok(())
            }
            Node::Scalar(_) => Ok(()),
        }
    }

    /// Crawl an object's children, shared definitions first, then shorter keys.
    fn crawl_object(
        &mut self,
        map: &Map<String, Value>,
        location: &str,
        path_from_root: &str,
        indirections: usize,
    ) -> Result<(), RefError> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort_by_key(|key| (!matches!(key.as_str(), "definitions" | "$defs"), key.len()));
        for key in keys {
            self.crawl(
                &map[key.as_str()],
                &pointer::join(location, &[key]),
                &pointer::join(path_from_root, &[key]),
                indirections,
            )?;
        }
        Ok(())
    }

    fn inventory(
        &mut self,
        reference: Reference<'_>,
        location: &str,
        path_from_root: &str,
        indirections: usize,
    ) -> Result<(), RefError> {
        let refs = self.refs;
        let target = pointer::normalize(&uri::resolve(location, reference.target())?)?;
        if !self.external && uri::document_key(&target) != uri::document_key(location) {
            return Ok(());
        }

        let resolved = refs.lookup(&target, location)?;
        let file = uri::document_key(&resolved.path);
        let entry = Entry {
            location: location.to_string(),
            path_from_root: path_from_root.to_string(),
            depth: pointer::parse(path_from_root)?.len(),
            external: file != self.root_key,
            file,
            hash: pointer::hash(&resolved.path).to_string(),
            target: resolved.path.clone(),
            circular: resolved.circular,
            extended: reference.is_extended(),
            indirections: indirections + resolved.indirections,
        };

        if resolved.circular
            || is_ancestor(&resolved.path, location)
            || self.crawling.contains(&resolved.path)
        {
            self.circular = true;
        }

        if let Some(existing) = self.entries.get(location) {
            if (entry.indirections, entry.depth) >= (existing.indirections, existing.depth) {
                return Ok(());
            }
        }

        let external = entry.external;
        let indirections = entry.indirections;
        self.entries.insert(location.to_string(), entry);

        if external && !resolved.circular && !self.crawling.contains(&resolved.path) {
            self.crawling.push(resolved.path.clone());
            let result = self.crawl(&resolved.value, &resolved.path, path_from_root, indirections + 1);
            self.crawling.pop();
            result?;
        }
        Ok(())
    }
}

/// Whether `path` is `location` itself or one of its containers.
fn is_ancestor(path: &str, location: &str) -> bool {
    location == path
        || location
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// What to do with a reference node.
#[derive(Debug, Clone, PartialEq)]
enum Decision {
    /// Keep the node, pointing it at this internal path.
    Rewrite(String),
    /// Replace the node with the value at `target`.
    Inline {
        target: String,
        circular: bool,
        path_from_root: String,
    },
}

fn decide(mut entries: Vec<Entry>) -> HashMap<String, Decision> {
    entries.sort_by(compare);

    let mut decisions = HashMap::with_capacity(entries.len());
    let mut inlined: Vec<&Entry> = Vec::new();
    for entry in &entries {
        let decision = if !entry.external {
            Decision::Rewrite(entry.hash.clone())
        } else {
            // Parents sort before their sub-paths, so the deepest inlined
            // container of this target is already known.
            let container = inlined
                .iter()
                .copied()
                .filter(|g| g.file == entry.file && is_ancestor(&g.hash, &entry.hash))
                .max_by_key(|g| g.hash.len());
            match container {
                Some(g) if g.hash == entry.hash => Decision::Rewrite(g.path_from_root.clone()),
                Some(g) => {
                    let relative = entry.hash.replacen(&g.hash, "#", 1);
                    let tokens = pointer::parse(&relative).unwrap_or_default();
                    Decision::Rewrite(pointer::join(&g.path_from_root, &tokens))
                }
                None => {
                    inlined.push(entry);
                    Decision::Inline {
                        target: entry.target.clone(),
                        circular: entry.circular,
                        path_from_root: entry.path_from_root.clone(),
                    }
                }
            }
        };
        tracing::debug!(location = %entry.location, ?decision, "bundling $ref");
        decisions.insert(entry.location.clone(), decision);
    }
    decisions
}

struct Materializer<'r> {
    refs: &'r Refs,
    decisions: HashMap<String, Decision>,
}

impl Materializer<'_> {
    fn materialize(
        &self,
        value: &Value,
        location: &str,
        active: &mut HashSet<String>,
    ) -> Result<Value, RefError> {
        match Node::of(value) {
            Node::Ref(reference) => self.materialize_ref(reference, location, active),
            Node::Object(map) => Ok(Value::Object(self.materialize_entries(map, location, active)?)),
            Node::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, child)| {
                    self.materialize(child, &pointer::join(location, &[idx.to_string()]), active)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Node::Scalar(value) => Ok(value.clone()),
        }
    }

    fn materialize_entries(
        &self,
        map: &Map<String, Value>,
        location: &str,
        active: &mut HashSet<String>,
    ) -> Result<Map<String, Value>, RefError> {
        let mut materialized = Map::with_capacity(map.len());
        for (key, child) in map {
            let child = if key == REF_KEY {
                child.clone()
            } else {
                self.materialize(child, &pointer::join(location, &[key]), active)?
            };
            materialized.insert(key.clone(), child);
        }
        Ok(materialized)
    }

    fn materialize_ref(
        &self,
        reference: Reference<'_>,
        location: &str,
        active: &mut HashSet<String>,
    ) -> Result<Value, RefError> {
        let node = self.materialize_entries(reference.node(), location, active)?;
        let retarget = |target: &str| {
            let mut node = node.clone();
            node.insert(REF_KEY.to_string(), Value::String(target.to_string()));
            Value::Object(node)
        };

        match self.decisions.get(location) {
            None => Ok(Value::Object(node)),
            Some(Decision::Rewrite(target)) => Ok(retarget(target)),
            Some(Decision::Inline {
                target,
                circular,
                path_from_root,
            }) => {
                if *circular || active.contains(location) {
                    return Ok(retarget(path_from_root));
                }

                active.insert(location.to_string());
                let resolved = self.refs.lookup(target, location)?;
                let inlined = self.materialize(&resolved.value, &resolved.path, active);
                active.remove(location);
                let inlined = inlined?;

                let node = Value::Object(node);
                match Node::of(&node) {
                    Node::Ref(extended) => Ok(extended.merge(&inlined)),
                    _ => Ok(inlined),
                }
            }
        }
    }
}
