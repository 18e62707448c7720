//! RFC 6901 JSON Pointers carried in URI fragments.
//!
//! Paths look like `file:///schemas/pet.json#/definitions/Pet`. Everything
//! after the `#` is a JSON Pointer whose tokens are URI-encoded and
//! `~`-escaped. The helpers here only deal with a single in-memory value;
//! following `$ref`s mid-walk is done by [`crate::Refs`].

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::RefError;

/// Characters left unencoded in pointer tokens.
const TOKEN: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'$');

/// Returns the fragment of `path` including the leading `#`, or `"#"`.
pub fn hash(path: &str) -> &str {
    match path.find('#') {
        Some(idx) => &path[idx..],
        None => "#",
    }
}

/// Returns `path` without its fragment.
pub fn strip_hash(path: &str) -> &str {
    match path.find('#') {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Parse the pointer in the fragment of `path` into unescaped tokens.
///
/// An empty fragment (or no fragment) addresses the whole document.
///
/// # Errors
///
/// Returns `RefError::MalformedPointer` if the fragment is non-empty and
/// does not start with `/`.
pub fn parse(path: &str) -> Result<Vec<String>, RefError> {
    let fragment = &hash(path)[1..];
    if fragment.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = fragment.strip_prefix('/') else {
        return Err(RefError::MalformedPointer {
            pointer: fragment.to_string(),
            path: path.to_string(),
        });
    };
    Ok(rest.split('/').map(decode_token).collect())
}

fn decode_token(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    unescape(&decoded)
}

/// Unescape a token per RFC 6901: `~1` becomes `/`, then `~0` becomes `~`.
pub fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Escape a token per RFC 6901: `~` becomes `~0`, `/` becomes `~1`.
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Append `tokens` to `base`, inserting `#` if the base has no fragment.
///
/// Tokens are escaped and URI-encoded.
pub fn join<S: AsRef<str>>(base: &str, tokens: &[S]) -> String {
    let mut path = base.to_string();
    if !path.contains('#') {
        path.push('#');
    }
    for token in tokens {
        path.push('/');
        let escaped = escape(token.as_ref());
        path.extend(utf8_percent_encode(&escaped, TOKEN));
    }
    path
}

/// Re-encode the fragment of `path` the way [`join`] writes it, so two
/// spellings of one location compare equal.
pub fn normalize(path: &str) -> Result<String, RefError> {
    Ok(join(strip_hash(path), &parse(path)?))
}

/// Look up a single token in a container value.
pub fn child<'a>(value: &'a Value, token: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(token),
        Value::Array(items) => token.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Move a single token's value out of an owned container.
pub(crate) fn take_child(value: Value, token: &str) -> Option<Value> {
    match value {
        Value::Object(mut map) => map.remove(token),
        Value::Array(mut items) => {
            let idx = token.parse::<usize>().ok()?;
            (idx < items.len()).then(|| items.swap_remove(idx))
        }
        _ => None,
    }
}

/// Step into `token` of a possibly borrowed value.
pub(crate) fn step<'a>(value: Cow<'a, Value>, token: &str) -> Option<Cow<'a, Value>> {
    match value {
        Cow::Borrowed(v) => child(v, token).map(Cow::Borrowed),
        Cow::Owned(v) => take_child(v, token).map(Cow::Owned),
    }
}

/// Resolve `path`'s pointer against `root` without following any `$ref`.
///
/// # Errors
///
/// Returns `RefError::MalformedPointer` for an invalid fragment, or
/// `RefError::BrokenPointer` if a token does not exist.
pub fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value, RefError> {
    let mut current = root;
    for token in parse(path)? {
        current = child(current, &token).ok_or_else(|| RefError::BrokenPointer {
            token: token.clone(),
            path: path.to_string(),
        })?;
    }
    Ok(current)
}

/// Write `value` at `path`, creating missing intermediate containers.
///
/// Missing intermediates become objects, or arrays when the following
/// token is `-`. On an array, `-` appends and an index past the end pads
/// with `null`. An empty pointer replaces the whole document.
///
/// # Errors
///
/// Returns `RefError::CannotSet` if a scalar sits on the path.
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), RefError> {
    let tokens = parse(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (i, token) in parents.iter().enumerate() {
        let next_is_append = tokens.get(i + 1).is_some_and(|t| t == "-");
        let placeholder = if next_is_append {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
        current = slot(current, token, path, placeholder)?;
    }
    *slot(current, last, path, Value::Null)? = value;
    Ok(())
}

/// Return a mutable slot for `token`, inserting `placeholder` when absent.
fn slot<'a>(
    container: &'a mut Value,
    token: &str,
    path: &str,
    placeholder: Value,
) -> Result<&'a mut Value, RefError> {
    match container {
        Value::Object(map) => {
            let entry = map.entry(token.to_string()).or_insert(Value::Null);
            if entry.is_null() && !placeholder.is_null() {
                *entry = placeholder;
            }
            Ok(entry)
        }
        Value::Array(items) => {
            let idx = if token == "-" {
                items.len()
            } else {
                token.parse::<usize>().map_err(|_| RefError::CannotSet {
                    token: token.to_string(),
                    path: path.to_string(),
                })?
            };
            if idx >= items.len() {
                items.resize(idx, Value::Null);
                items.push(placeholder);
            } else if items[idx].is_null() && !placeholder.is_null() {
                items[idx] = placeholder;
            }
            Ok(&mut items[idx])
        }
        _ => Err(RefError::CannotSet {
            token: token.to_string(),
            path: path.to_string(),
        }),
    }
}
