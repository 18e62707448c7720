//! Options for parsing, resolving and dereferencing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parsers::{JsonParser, Parser, TextParser, YamlParser};
use crate::resolvers::{FileResolver, Resolver};

#[cfg(feature = "remote")]
use crate::resolvers::HttpResolver;

/// Callback deciding whether a path (from the schema root) is left alone.
pub type PathMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Callback told about every inlined reference: `$ref` string and target value.
pub type DereferenceHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// How the dereferencer treats circular references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CircularRepr", into = "CircularRepr")]
pub enum CircularMode {
    /// Inline circular references as cycles in the output graph.
    #[default]
    Allow,
    /// Fail with `RefError::CircularReference`.
    Disallow,
    /// Leave circular references as `$ref` nodes.
    Ignore,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CircularRepr {
    Flag(bool),
    Word(String),
}

impl TryFrom<CircularRepr> for CircularMode {
    type Error = String;

    fn try_from(repr: CircularRepr) -> Result<Self, Self::Error> {
        match repr {
            CircularRepr::Flag(true) => Ok(CircularMode::Allow),
            CircularRepr::Flag(false) => Ok(CircularMode::Disallow),
            CircularRepr::Word(word) if word == "ignore" => Ok(CircularMode::Ignore),
            CircularRepr::Word(word) => Err(format!(
                "unknown circular mode \"{}\": expected true, false, or \"ignore\"",
                word
            )),
        }
    }
}

impl From<CircularMode> for CircularRepr {
    fn from(mode: CircularMode) -> Self {
        match mode {
            CircularMode::Allow => CircularRepr::Flag(true),
            CircularMode::Disallow => CircularRepr::Flag(false),
            CircularMode::Ignore => CircularRepr::Word("ignore".to_string()),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpOptions {
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds.
    pub timeout: u64,
    /// Maximum number of redirects to follow.
    pub redirects: usize,
    /// Accepted for compatibility with browser-oriented configs; a
    /// non-browser client has no ambient credentials to attach.
    pub with_credentials: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            timeout: 60_000,
            redirects: 5,
            with_credentials: false,
        }
    }
}

impl HttpOptions {
    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the timeout in milliseconds.
    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = millis;
        self
    }

    /// Set the redirect limit.
    pub fn redirects(mut self, redirects: usize) -> Self {
        self.redirects = redirects;
        self
    }
}

/// Settings for reading referenced documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Follow references into other documents. When false, external
    /// `$ref`s are left untouched by every stage.
    pub external: bool,
    pub http: HttpOptions,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            external: true,
            http: HttpOptions::default(),
        }
    }
}

impl ResolveOptions {
    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }

    pub fn http(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }
}

/// Settings for the dereferencer.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DereferenceOptions {
    pub circular: CircularMode,
    #[serde(skip)]
    pub excluded_path_matcher: Option<PathMatcher>,
    #[serde(skip)]
    pub on_dereference: Option<DereferenceHook>,
}

impl fmt::Debug for DereferenceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DereferenceOptions")
            .field("circular", &self.circular)
            .field("excluded_path_matcher", &self.excluded_path_matcher.is_some())
            .field("on_dereference", &self.on_dereference.is_some())
            .finish()
    }
}

impl DereferenceOptions {
    /// Whether `path_from_root` is excluded from dereferencing.
    pub(crate) fn is_excluded(&self, path_from_root: &str) -> bool {
        self.excluded_path_matcher
            .as_ref()
            .is_some_and(|matcher| matcher(path_from_root))
    }
}

/// Everything that configures a resolution run.
///
/// The default registers the built-in resolvers (file, and http with the
/// `remote` feature) and parsers (json, yaml, text).
///
/// # Example
///
/// ```
/// use json_refs::{CircularMode, ParserOptions};
///
/// let options = ParserOptions::default()
///     .external(false)
///     .circular(CircularMode::Ignore);
/// assert!(!options.resolve.external);
/// ```
#[derive(Clone)]
pub struct ParserOptions {
    pub resolve: ResolveOptions,
    pub dereference: DereferenceOptions,
    pub resolvers: Vec<Arc<dyn Resolver>>,
    pub parsers: Vec<Arc<dyn Parser>>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        #[allow(unused_mut)]
        let mut resolvers: Vec<Arc<dyn Resolver>> = vec![Arc::new(FileResolver::default())];
        #[cfg(feature = "remote")]
        resolvers.push(Arc::new(HttpResolver::default()));

        let parsers: Vec<Arc<dyn Parser>> = vec![
            Arc::new(JsonParser::default()),
            Arc::new(YamlParser::default()),
            Arc::new(TextParser::default()),
        ];

        Self {
            resolve: ResolveOptions::default(),
            dereference: DereferenceOptions::default(),
            resolvers,
            parsers,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("resolve", &self.resolve)
            .field("dereference", &self.dereference)
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field(
                "parsers",
                &self.parsers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ParserOptions {
    /// Follow (or not) references into other documents.
    pub fn external(mut self, external: bool) -> Self {
        self.resolve.external = external;
        self
    }

    /// Set HTTP transport settings.
    pub fn http(mut self, http: HttpOptions) -> Self {
        self.resolve.http = http;
        self
    }

    /// Set how circular references are dereferenced.
    pub fn circular(mut self, circular: CircularMode) -> Self {
        self.dereference.circular = circular;
        self
    }

    /// Register an additional resolver.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Register an additional parser.
    pub fn parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Skip dereferencing below paths the matcher accepts.
    pub fn excluded_path_matcher(
        mut self,
        matcher: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.dereference.excluded_path_matcher = Some(Arc::new(matcher));
        self
    }

    /// Observe every reference the dereferencer inlines.
    pub fn on_dereference(mut self, hook: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
        self.dereference.on_dereference = Some(Arc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn circular_mode_from_json() {
        let mode: CircularMode = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(mode, CircularMode::Allow);
        let mode: CircularMode = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(mode, CircularMode::Disallow);
        let mode: CircularMode = serde_json::from_value(json!("ignore")).unwrap();
        assert_eq!(mode, CircularMode::Ignore);
        assert!(serde_json::from_value::<CircularMode>(json!("sometimes")).is_err());
    }

    #[test]
    fn circular_mode_to_json() {
        assert_eq!(serde_json::to_value(CircularMode::Ignore).unwrap(), json!("ignore"));
        assert_eq!(serde_json::to_value(CircularMode::Disallow).unwrap(), json!(false));
    }

    #[test]
    fn resolve_options_from_partial_json() {
        let options: ResolveOptions = serde_json::from_value(json!({
            "http": { "timeout": 500, "headers": { "X-Api-Key": "k" }, "withCredentials": true }
        }))
        .unwrap();
        assert!(options.external);
        assert_eq!(options.http.timeout, 500);
        assert_eq!(options.http.redirects, 5);
        assert_eq!(options.http.headers["X-Api-Key"], "k");
        assert!(options.http.with_credentials);
    }

    #[test]
    fn dereference_options_from_json() {
        let options: DereferenceOptions =
            serde_json::from_value(json!({ "circular": "ignore" })).unwrap();
        assert_eq!(options.circular, CircularMode::Ignore);
        assert!(options.excluded_path_matcher.is_none());
    }

    #[test]
    fn default_plugins_are_registered() {
        let options = ParserOptions::default();
        let parsers: Vec<_> = options.parsers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(parsers, vec!["json", "yaml", "text"]);
        assert_eq!(options.resolvers[0].name(), "file");
        #[cfg(feature = "remote")]
        assert_eq!(options.resolvers[1].name(), "http");
    }

    #[test]
    fn excluded_path_matcher_is_consulted() {
        let options = ParserOptions::default().excluded_path_matcher(|p| p.starts_with("#/x-"));
        assert!(options.dereference.is_excluded("#/x-internal/a"));
        assert!(!options.dereference.is_excluded("#/paths"));
    }
}
