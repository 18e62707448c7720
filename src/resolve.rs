//! Entry points for reading a root document and everything it references.

use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use crate::error::RefError;
use crate::external;
use crate::loader;
use crate::options::ParserOptions;
use crate::reference::json_type_name;
use crate::refs::{DocumentKind, Refs};
use crate::uri;

/// Where the root document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A file path, `file://` URL or `http(s)://` URL.
    Location(String),
    /// An already parsed document. Relative references resolve against
    /// `base`, or the working directory when there is none.
    Document { base: Option<String>, value: Value },
}

impl Source {
    /// An in-memory document anchored at `base`.
    pub fn document_at(base: impl Into<String>, value: Value) -> Self {
        Source::Document {
            base: Some(base.into()),
            value,
        }
    }
}

impl From<&str> for Source {
    fn from(location: &str) -> Self {
        Source::Location(location.to_string())
    }
}

impl From<String> for Source {
    fn from(location: String) -> Self {
        Source::Location(location)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Location(path.display().to_string())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::from(path.as_path())
    }
}

impl From<&PathBuf> for Source {
    fn from(path: &PathBuf) -> Self {
        Source::from(path.as_path())
    }
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Source::Document { base: None, value }
    }
}

/// Read and parse the root document only; no `$ref` is followed.
///
/// # Errors
///
/// Returns `UnresolvedReference` when the document cannot be read or
/// parsed, and `InvalidRoot` when it is not an object or array.
pub fn parse(source: impl Into<Source>, options: &ParserOptions) -> Result<Value, RefError> {
    let (_, _, value) = load_root(source.into(), options)?;
    Ok(value)
}

/// Parse the root document and load every document it references.
///
/// # Example
///
/// ```
/// use json_refs::{resolve, ParserOptions, Source};
/// use serde_json::json;
///
/// let schema = json!({
///     "properties": { "name": { "$ref": "#/definitions/name" } },
///     "definitions": { "name": { "type": "string" } }
/// });
/// let refs = resolve(Source::document_at("file:///schemas/person.json", schema), &ParserOptions::default()).unwrap();
/// assert_eq!(refs.get("#/properties/name").unwrap(), json!({ "type": "string" }));
/// ```
pub fn resolve(source: impl Into<Source>, options: &ParserOptions) -> Result<Refs, RefError> {
    let (url, kind, value) = load_root(source.into(), options)?;
    let mut refs = Refs::new(url, kind, value);
    external::resolve_external(&mut refs, options)?;
    tracing::debug!(
        root = %refs.root().uri(),
        documents = refs.paths(&[]).len(),
        "resolved references"
    );
    Ok(refs)
}

fn load_root(source: Source, options: &ParserOptions) -> Result<(Url, DocumentKind, Value), RefError> {
    let (url, kind, value) = match source {
        Source::Location(location) => {
            let url = uri::from_location(&location)?;
            let (kind, value) = loader::load(&url, options)?;
            (url, kind, value)
        }
        Source::Document { base, value } => {
            let url = match base {
                Some(base) => uri::from_location(&base)?,
                None => uri::cwd()?,
            };
            (url, DocumentKind::Embedded, value)
        }
    };

    match value {
        Value::Object(_) | Value::Array(_) => Ok((url, kind, value)),
        other => Err(RefError::InvalidRoot {
            uri: url.to_string(),
            actual: json_type_name(&other).to_string(),
        }),
    }
}
