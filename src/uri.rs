//! Document URIs: resolution against a base and normalization to registry keys.

use std::path::Path;

use url::Url;

use crate::error::RefError;

/// Parse an absolute URI.
pub fn parse(uri: &str) -> Result<Url, RefError> {
    Url::parse(uri).map_err(|e| RefError::InvalidUri {
        uri: uri.to_string(),
        message: e.to_string(),
    })
}

/// Resolve `reference` against `base`, keeping the fragment of `reference`.
///
/// ```
/// use json_refs::uri::resolve;
///
/// let abs = resolve("file:///api/root.yaml#/paths", "models/pet.json#/Pet").unwrap();
/// assert_eq!(abs, "file:///api/models/pet.json#/Pet");
/// assert_eq!(resolve("file:///api/root.yaml", "#/a").unwrap(), "file:///api/root.yaml#/a");
/// ```
pub fn resolve(base: &str, reference: &str) -> Result<String, RefError> {
    let base = parse(base)?;
    base.join(reference)
        .map(String::from)
        .map_err(|e| RefError::InvalidUri {
            uri: reference.to_string(),
            message: e.to_string(),
        })
}

/// The registry key for a document URI.
///
/// The fragment is dropped, the URI is re-serialized, escapes of
/// unreserved characters are decoded (other escapes are kept, upper-cased)
/// and a trailing slash is trimmed, so spellings of the same document
/// share one key.
pub fn document_key(uri: &str) -> String {
    let without_hash = match uri.find('#') {
        Some(idx) => &uri[..idx],
        None => uri,
    };
    let serialized = match Url::parse(without_hash) {
        Ok(url) => url.to_string(),
        Err(_) => without_hash.to_string(),
    };
    let mut key = decode_unreserved(&serialized);
    if key.ends_with('/') && !key.ends_with("//") {
        key.pop();
    }
    key
}

fn decode_unreserved(input: &str) -> String {
    let mut decoded = String::with_capacity(input.len());
    let mut idx = 0;
    while let Some(ch) = input[idx..].chars().next() {
        if ch == '%' {
            let escape = input
                .get(idx + 1..idx + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()));
            if let Some(hex) = escape {
                let byte = u8::from_str_radix(hex, 16).unwrap_or_default();
                if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
                    decoded.push(char::from(byte));
                } else {
                    decoded.push('%');
                    decoded.push_str(&hex.to_ascii_uppercase());
                }
                idx += 3;
                continue;
            }
        }
        decoded.push(ch);
        idx += ch.len_utf8();
    }
    decoded
}

/// Turn a user-supplied location (path or URL) into an absolute URI.
///
/// Strings with a scheme of two or more characters are taken as URLs;
/// everything else is a filesystem path relative to the working directory.
pub fn from_location(location: &str) -> Result<Url, RefError> {
    if let Ok(url) = Url::parse(location) {
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }
    from_path(Path::new(location))
}

/// Convert a filesystem path into a `file://` URL.
pub fn from_path(path: &Path) -> Result<Url, RefError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| RefError::InvalidUri {
                uri: path.display().to_string(),
                message: e.to_string(),
            })?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|()| RefError::InvalidUri {
        uri: absolute.display().to_string(),
        message: "not an absolute file path".to_string(),
    })
}

/// The working directory as a `file://` URL with a trailing slash.
pub fn cwd() -> Result<Url, RefError> {
    let dir = std::env::current_dir().map_err(|e| RefError::InvalidUri {
        uri: ".".to_string(),
        message: e.to_string(),
    })?;
    Url::from_directory_path(&dir).map_err(|()| RefError::InvalidUri {
        uri: dir.display().to_string(),
        message: "not an absolute directory".to_string(),
    })
}

/// Lowercase file extension of the URL's last path segment, with the dot.
///
/// Returns an empty string when there is none.
pub fn extension(url: &Url) -> String {
    let segment = url.path().rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(idx) if idx > 0 => segment[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// True for `http://` and `https://` URLs.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// True for `file://` URLs.
pub fn is_file(url: &Url) -> bool {
    url.scheme() == "file"
}
