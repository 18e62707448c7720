//! Resolver plugins: turn a document URL into raw bytes.

use crate::error::RefError;
use crate::options::ResolveOptions;
use crate::plugins::{FileInfo, Matcher, Plugin};
use crate::uri;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Reads the raw contents of a document.
pub trait Resolver: Plugin {
    /// Read `file.url`.
    fn read(&self, file: &FileInfo, options: &ResolveOptions) -> Result<Vec<u8>, RefError>;
}

/// Reads `file://` URLs from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileResolver {
    matcher: Matcher,
}

impl Default for FileResolver {
    fn default() -> Self {
        Self {
            matcher: Matcher::Predicate(std::sync::Arc::new(|f: &FileInfo| uri::is_file(&f.url))),
        }
    }
}

impl Plugin for FileResolver {
    fn name(&self) -> &str {
        "file"
    }

    fn order(&self) -> i32 {
        100
    }

    fn handles(&self, file: &FileInfo) -> bool {
        self.matcher.matches(file)
    }
}

impl Resolver for FileResolver {
    fn read(&self, file: &FileInfo, _options: &ResolveOptions) -> Result<Vec<u8>, RefError> {
        let path = file.url.to_file_path().map_err(|()| RefError::InvalidUri {
            uri: file.url.to_string(),
            message: "not a local file path".to_string(),
        })?;

        if !path.exists() {
            return Err(RefError::FileNotFound { path });
        }

        std::fs::read(&path).map_err(|source| RefError::ReadError { path, source })
    }
}

/// Fetches `http://` and `https://` URLs.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpResolver {
    matcher: Matcher,
}

#[cfg(feature = "remote")]
impl Default for HttpResolver {
    fn default() -> Self {
        Self {
            matcher: Matcher::Predicate(std::sync::Arc::new(|f: &FileInfo| uri::is_http(&f.url))),
        }
    }
}

#[cfg(feature = "remote")]
impl Plugin for HttpResolver {
    fn name(&self) -> &str {
        "http"
    }

    fn order(&self) -> i32 {
        200
    }

    fn handles(&self, file: &FileInfo) -> bool {
        self.matcher.matches(file)
    }
}

#[cfg(feature = "remote")]
impl Resolver for HttpResolver {
    fn read(&self, file: &FileInfo, options: &ResolveOptions) -> Result<Vec<u8>, RefError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
        use reqwest::redirect::Policy;

        let url = file.url.as_str();
        let http = &options.http;
        let network_error = |source| RefError::NetworkError {
            url: url.to_string(),
            source,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &http.headers {
            let invalid = || RefError::InvalidHeader { name: name.clone() };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(http.timeout))
            .redirect(Policy::limited(http.redirects))
            .default_headers(headers)
            .build()
            .map_err(network_error)?;

        let response = client.get(url).send().map_err(network_error)?;

        // Check for HTTP errors before reading the body
        let response = response.error_for_status().map_err(network_error)?;

        let body = response.bytes().map_err(network_error)?;
        Ok(body.to_vec())
    }
}
