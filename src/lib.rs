//! JSON Reference resolution
//!
//! Reads JSON and YAML documents, follows the `$ref`s inside them across
//! files and URLs, and produces either a single self-contained document
//! ([`bundle`]) or a document with every reference replaced by its
//! target ([`dereference`]).
//!
//! # Example
//!
//! ```
//! use json_refs::{dereference, ParserOptions, Source};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "owner": { "$ref": "#/definitions/person" }
//!     },
//!     "definitions": {
//!         "person": { "type": "object", "required": ["name"] }
//!     }
//! });
//!
//! let result = dereference(
//!     Source::document_at("file:///schemas/pet.json", schema),
//!     &ParserOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     result.to_value()["properties"]["owner"],
//!     json!({ "type": "object", "required": ["name"] })
//! );
//! assert!(!result.circular);
//! ```
//!
//! # Stages
//!
//! | Function | Result |
//! |----------|--------|
//! | [`parse`] | the root document, references untouched |
//! | [`resolve`] | a [`Refs`] registry of every reachable document |
//! | [`bundle`] | one document whose only `$ref`s are internal |
//! | [`dereference`] | a [`Graph`] with no `$ref`s; cycles become shared edges |
//!
//! # Circular references
//!
//! A schema such as
//! ```json
//! { "definitions": { "node": { "properties": { "next": { "$ref": "#/definitions/node" } } } } }
//! ```
//! dereferences into a cyclic [`Graph`]. [`CircularMode`] chooses whether
//! that is allowed (the default), an error, or left as a `$ref`.

mod bundle;
mod dereference;
mod error;
mod external;
mod graph;
mod loader;
mod options;
mod parsers;
mod plugins;
pub mod pointer;
mod reference;
mod refs;
mod resolve;
mod resolvers;
pub mod uri;

pub use bundle::{bundle, bundle_refs, Bundled};
pub use dereference::{dereference, dereference_refs, Dereferenced};
pub use error::RefError;
pub use graph::{Graph, GraphNode, NodeId};
pub use loader::load;
pub use options::{
    CircularMode, DereferenceHook, DereferenceOptions, HttpOptions, ParserOptions, PathMatcher,
    ResolveOptions,
};
pub use parsers::{is_empty, JsonParser, Parser, TextParser, YamlParser};
pub use plugins::{FileInfo, Matcher, Plugin};
pub use reference::{json_type_name, Node, Reference, REF_KEY};
pub use refs::{Document, DocumentKind, Refs};
pub use resolve::{parse, resolve, Source};
pub use resolvers::{FileResolver, Resolver};

#[cfg(feature = "remote")]
pub use resolvers::HttpResolver;
