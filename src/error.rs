//! Error types for reference resolution, bundling and dereferencing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving `$ref` pointers.
#[derive(Debug, Error)]
pub enum RefError {
    // Reference errors
    #[error("invalid JSON pointer \"{pointer}\" in \"{path}\": pointers must start with \"#/\"")]
    MalformedPointer { pointer: String, path: String },

    #[error("unable to resolve $ref \"{uri}\"{}", describe_source(.source))]
    UnresolvedReference {
        uri: String,
        #[source]
        source: Option<Box<RefError>>,
    },

    #[error("token \"{token}\" does not exist in \"{path}\"")]
    BrokenPointer { token: String, path: String },

    #[error("circular $ref pointer found at {path}")]
    CircularReference { path: String },

    #[error("parsed value of {uri} is empty")]
    EmptyDocument { uri: String },

    #[error("root document {uri} is a {actual}, expected an object or array")]
    InvalidRoot { uri: String, actual: String },

    #[error("cannot set \"{token}\" of a non-container at \"{path}\"")]
    CannotSet { token: String, path: String },

    #[error("invalid URI \"{uri}\": {message}")]
    InvalidUri { uri: String, message: String },

    // Transport errors
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid HTTP header \"{name}\"")]
    InvalidHeader { name: String },

    #[error("no resolver can read {uri}")]
    NoResolver { uri: String },

    // Parse errors
    #[error("error parsing {uri}: {message}")]
    ParseError { uri: String, message: String },
}

fn describe_source(source: &Option<Box<RefError>>) -> String {
    match source {
        Some(err) => format!(": {}", err),
        None => String::new(),
    }
}

impl RefError {
    /// Wrap a transport or parse failure as an unresolved reference to `uri`.
    pub(crate) fn unresolved(uri: impl Into<String>, source: Option<RefError>) -> Self {
        RefError::UnresolvedReference {
            uri: uri.into(),
            source: source.map(Box::new),
        }
    }

    /// Returns true for failures reading a document (disk or network).
    pub fn is_transport(&self) -> bool {
        match self {
            RefError::FileNotFound { .. }
            | RefError::ReadError { .. }
            | RefError::InvalidHeader { .. }
            | RefError::NoResolver { .. } => true,
            #[cfg(feature = "remote")]
            RefError::NetworkError { .. } => true,
            RefError::UnresolvedReference {
                source: Some(source),
                ..
            } => source.is_transport(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_reference_includes_cause() {
        let err = RefError::unresolved(
            "file:///schemas/missing.json",
            Some(RefError::FileNotFound {
                path: PathBuf::from("/schemas/missing.json"),
            }),
        );
        assert_eq!(
            err.to_string(),
            "unable to resolve $ref \"file:///schemas/missing.json\": file not found: /schemas/missing.json"
        );
        assert!(err.is_transport());
    }

    #[test]
    fn unresolved_reference_without_cause() {
        let err = RefError::unresolved("file:///a.json#/x", None);
        assert_eq!(err.to_string(), "unable to resolve $ref \"file:///a.json#/x\"");
        assert!(!err.is_transport());
    }

    #[test]
    fn parse_failures_are_not_transport() {
        let err = RefError::unresolved(
            "file:///a.json",
            Some(RefError::ParseError {
                uri: "file:///a.json".into(),
                message: "expected value".into(),
            }),
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn broken_pointer_display() {
        let err = RefError::BrokenPointer {
            token: "Person".into(),
            path: "other.json#/defs/Person".into(),
        };
        assert_eq!(
            err.to_string(),
            "token \"Person\" does not exist in \"other.json#/defs/Person\""
        );
    }
}
