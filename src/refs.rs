//! The reference registry.
//!
//! [`Refs`] maps each document URI to its parsed value. The first
//! document registered is the root. URIs are normalized before use as
//! keys (see [`uri::document_key`]), so a document is stored once no
//! matter how it was spelled in a `$ref`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::RefError;
use crate::pointer;
use crate::reference::{Node, REF_KEY};
use crate::uri;

/// How a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    File,
    Http,
    /// Supplied in memory by the caller.
    Embedded,
}

impl DocumentKind {
    /// Transport kind implied by a URL's scheme.
    pub fn of(url: &Url) -> Self {
        if uri::is_http(url) {
            DocumentKind::Http
        } else if uri::is_file(url) {
            DocumentKind::File
        } else {
            DocumentKind::Embedded
        }
    }
}

/// A registered document.
#[derive(Debug, Clone)]
pub struct Document {
    uri: Url,
    kind: DocumentKind,
    value: Value,
}

impl Document {
    /// Absolute URI, without fragment.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The path addressing the whole document (`<uri>#`).
    pub fn path(&self) -> String {
        format!("{}#", self.uri)
    }

    fn is_any_of(&self, kinds: &[DocumentKind]) -> bool {
        kinds.is_empty() || kinds.contains(&self.kind)
    }
}

/// The outcome of resolving a path.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    /// The value found, after following references along the way.
    pub value: Cow<'a, Value>,
    /// Where the value actually lives, which differs from the requested
    /// path when a reference was followed.
    pub path: String,
    /// How many references were followed.
    pub indirections: usize,
    /// A reference on the way pointed back into the chain being followed.
    pub circular: bool,
}

/// Registry of every document reachable from the root.
#[derive(Debug, Clone)]
pub struct Refs {
    documents: Vec<Document>,
    index: HashMap<String, usize>,
    pending: HashSet<String>,
    circular: bool,
}

impl Refs {
    /// Create a registry whose root document is `root`.
    pub fn new(mut root: Url, kind: DocumentKind, value: Value) -> Self {
        root.set_fragment(None);
        let mut index = HashMap::new();
        index.insert(uri::document_key(root.as_str()), 0);
        Self {
            documents: vec![Document {
                uri: root,
                kind,
                value,
            }],
            index,
            pending: HashSet::new(),
            circular: false,
        }
    }

    /// Claim `uri` before fetching it.
    ///
    /// Returns false when the document is already registered or another
    /// fetch has claimed it, in which case the caller must not fetch.
    pub(crate) fn reserve(&mut self, uri: &Url) -> bool {
        let key = uri::document_key(uri.as_str());
        if self.index.contains_key(&key) || self.pending.contains(&key) {
            return false;
        }
        self.pending.insert(key);
        true
    }

    /// Drop a reservation whose fetch failed.
    pub(crate) fn release(&mut self, uri: &Url) {
        self.pending.remove(&uri::document_key(uri.as_str()));
    }

    /// Store a fetched document.
    pub(crate) fn insert(&mut self, mut uri: Url, kind: DocumentKind, value: Value) {
        uri.set_fragment(None);
        let key = uri::document_key(uri.as_str());
        self.pending.remove(&key);
        let document = Document { uri, kind, value };
        match self.index.get(&key) {
            Some(&idx) => self.documents[idx] = document,
            None => {
                self.index.insert(key, self.documents.len());
                self.documents.push(document);
            }
        }
    }

    /// The root document.
    pub fn root(&self) -> &Document {
        &self.documents[0]
    }

    /// The document `uri` belongs to; any fragment is ignored.
    pub fn document(&self, uri: &str) -> Option<&Document> {
        self.index
            .get(&uri::document_key(uri))
            .map(|&idx| &self.documents[idx])
    }

    /// Whether the document `uri` belongs to is registered.
    pub fn contains(&self, uri: &str) -> bool {
        self.index.contains_key(&uri::document_key(uri))
    }

    /// URIs of registered documents of the given kinds (all when empty).
    pub fn paths(&self, kinds: &[DocumentKind]) -> Vec<&str> {
        self.documents
            .iter()
            .filter(|doc| doc.is_any_of(kinds))
            .map(|doc| doc.uri.as_str())
            .collect()
    }

    /// URIs and values of registered documents of the given kinds.
    pub fn values(&self, kinds: &[DocumentKind]) -> Vec<(&str, &Value)> {
        self.documents
            .iter()
            .filter(|doc| doc.is_any_of(kinds))
            .map(|doc| (doc.uri.as_str(), &doc.value))
            .collect()
    }

    /// The registry as a `{ "<uri>": <value> }` object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .documents
            .iter()
            .map(|doc| (doc.uri.to_string(), doc.value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Whether a circular reference was found over this registry.
    pub fn circular(&self) -> bool {
        self.circular
    }

    pub(crate) fn mark_circular(&mut self) {
        self.circular = true;
    }

    /// Resolve `path` (relative paths against the root) to an owned value.
    ///
    /// A reference with sibling keys resolves to its target with those keys
    /// laid over it.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` for an unknown document,
    /// `MalformedPointer` or `BrokenPointer` for a bad fragment.
    pub fn get(&self, path: &str) -> Result<Value, RefError> {
        let absolute = uri::resolve(&self.root().path(), path)?;
        let resolved = self.lookup(&absolute, &absolute)?;
        self.merged(resolved, &mut Vec::new())
    }

    /// Whether `path` resolves to a value.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Write `value` at `path` inside an already registered document.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), RefError> {
        let absolute = uri::resolve(&self.root().path(), path)?;
        let idx = *self
            .index
            .get(&uri::document_key(&absolute))
            .ok_or_else(|| RefError::unresolved(absolute.clone(), None))?;
        pointer::set(&mut self.documents[idx].value, &absolute, value)
    }

    fn merged(&self, resolved: Resolved<'_>, seen: &mut Vec<String>) -> Result<Value, RefError> {
        if let Node::Ref(reference) = Node::of(&resolved.value) {
            if reference.is_extended() && !resolved.circular && !seen.contains(&resolved.path) {
                let target = pointer::normalize(&uri::resolve(&resolved.path, reference.target())?)?;
                if self.contains(&target) {
                    seen.push(resolved.path.clone());
                    let inner = self.lookup(&target, &resolved.path)?;
                    return Ok(reference.merge(&self.merged(inner, seen)?));
                }
            }
        }
        Ok(resolved.value.into_owned())
    }

    /// Resolve an absolute `path`, following references along the way.
    ///
    /// `origin` is the location of the reference being resolved; a chain
    /// of references leading back to it (or to any link of the chain) is
    /// reported as circular instead of being followed. A reference into a
    /// document that is not registered is returned as is, and so is a
    /// reference with sibling keys that the path ends on: its keys live in
    /// a different document than its target's.
    pub(crate) fn lookup<'a>(&'a self, path: &str, origin: &str) -> Result<Resolved<'a>, RefError> {
        let mut chain = vec![origin.to_string()];
        self.walk(path, &mut chain)
    }

    fn walk<'a>(&'a self, path: &str, chain: &mut Vec<String>) -> Result<Resolved<'a>, RefError> {
        let document = self
            .document(path)
            .ok_or_else(|| RefError::unresolved(path, None))?;
        let tokens = pointer::parse(path)?;

        let mut resolved = Resolved {
            value: Cow::Borrowed(&document.value),
            path: document.path(),
            indirections: 0,
            circular: false,
        };

        for token in &tokens {
            // A reference mid-path moves the base; remaining tokens apply to its target.
            self.advance(&mut resolved, Some(token.as_str()), chain)?;
            if resolved.circular && matches!(Node::of(&resolved.value), Node::Ref(_)) {
                return Ok(resolved);
            }

            let current = std::mem::replace(&mut resolved.value, Cow::Owned(Value::Null));
            resolved.value = pointer::step(current, token).ok_or_else(|| RefError::BrokenPointer {
                token: token.clone(),
                path: path.to_string(),
            })?;
            resolved.path = pointer::join(&resolved.path, &[token]);
        }

        self.advance(&mut resolved, None, chain)?;
        Ok(resolved)
    }

    /// Follow references until the value can be stepped into by `next`.
    fn advance<'a>(
        &'a self,
        resolved: &mut Resolved<'a>,
        next: Option<&str>,
        chain: &mut Vec<String>,
    ) -> Result<(), RefError> {
        let mut hops: Vec<String> = Vec::new();
        while self.follow(resolved, next, chain)? {
            if hops.contains(&resolved.path) {
                resolved.circular = true;
                break;
            }
            hops.push(resolved.path.clone());
        }
        Ok(())
    }

    /// Replace a reference value by its target; false when nothing was followed.
    fn follow<'a>(
        &'a self,
        resolved: &mut Resolved<'a>,
        next: Option<&str>,
        chain: &mut Vec<String>,
    ) -> Result<bool, RefError> {
        let Node::Ref(reference) = Node::of(&resolved.value) else {
            return Ok(false);
        };
        if reference.is_extended() {
            match next {
                None => return Ok(false),
                Some(token) if token != REF_KEY && reference.node().contains_key(token) => {
                    return Ok(false)
                }
                Some(_) => {}
            }
        }
        let target = pointer::normalize(&uri::resolve(&resolved.path, reference.target())?)?;
        // Documents are only missing when external resolution is off.
        if !self.contains(&target) {
            return Ok(false);
        }
        if target == resolved.path || chain.contains(&target) {
            resolved.circular = true;
            return Ok(false);
        }

        chain.push(resolved.path.clone());
        let inner = self.walk(&target, chain);
        chain.pop();
        let inner = inner?;

        resolved.indirections += inner.indirections + 1;
        resolved.circular |= inner.circular;
        resolved.value = inner.value;
        resolved.path = inner.path;
        Ok(true)
    }
}
