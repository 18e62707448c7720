//! Ordered plugin selection with fallback.
//!
//! Resolvers (which read bytes) and parsers (which decode them) are both
//! plugins: each declares a priority `order` and a predicate over the file
//! being loaded. Candidates run lowest order first until one succeeds;
//! when all fail, the last error is reported.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::error::RefError;
use crate::uri;

/// What a plugin knows about the file it is asked to handle.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Absolute URL of the document, without fragment.
    pub url: Url,
    /// Lowercase extension including the dot (e.g. `".yaml"`), or empty.
    pub extension: String,
    /// Raw bytes, present once the document has been read.
    pub data: Option<Vec<u8>>,
}

impl FileInfo {
    pub fn new(url: Url) -> Self {
        let extension = uri::extension(&url);
        Self {
            url,
            extension,
            data: None,
        }
    }

    /// The raw bytes, or an empty slice before reading.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// Behavior shared by every plugin kind.
pub trait Plugin: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Priority; lower runs first.
    fn order(&self) -> i32;

    /// Whether this plugin is a candidate for `file`.
    fn handles(&self, file: &FileInfo) -> bool;
}

/// Predicate deciding which files a plugin handles.
#[derive(Clone)]
pub enum Matcher {
    Always,
    Never,
    /// Lowercase extensions, dot included.
    Extensions(Vec<String>),
    /// Regex over the full URL.
    Pattern(Regex),
    Predicate(Arc<dyn Fn(&FileInfo) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn extensions(exts: &[&str]) -> Self {
        Matcher::Extensions(exts.iter().map(|e| e.to_lowercase()).collect())
    }

    pub fn matches(&self, file: &FileInfo) -> bool {
        match self {
            Matcher::Always => true,
            Matcher::Never => false,
            Matcher::Extensions(exts) => exts.iter().any(|e| *e == file.extension),
            Matcher::Pattern(re) => re.is_match(file.url.as_str()),
            Matcher::Predicate(f) => f(file),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Always => f.write_str("Always"),
            Matcher::Never => f.write_str("Never"),
            Matcher::Extensions(exts) => f.debug_tuple("Extensions").field(exts).finish(),
            Matcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Pick the plugins that handle `file`, sorted by ascending order.
///
/// With `fallback_to_all`, an empty selection becomes every plugin.
/// The sort is stable, so equal orders keep registration order.
pub(crate) fn select<'p, P>(plugins: &'p [Arc<P>], file: &FileInfo, fallback_to_all: bool) -> Vec<&'p P>
where
    P: Plugin + ?Sized,
{
    let mut selected: Vec<&P> = plugins
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| p.handles(file))
        .collect();
    if selected.is_empty() && fallback_to_all {
        selected = plugins.iter().map(|p| p.as_ref()).collect();
    }
    selected.sort_by_key(|p| p.order());
    selected
}

/// Run `attempt` on each candidate in turn until one succeeds.
///
/// Returns the winning plugin with its output, or the last error (`None`
/// when there were no candidates).
pub(crate) fn run<'p, P, T>(
    candidates: Vec<&'p P>,
    mut attempt: impl FnMut(&'p P) -> Result<T, RefError>,
) -> Result<(&'p P, T), Option<RefError>>
where
    P: Plugin + ?Sized,
{
    let mut last_error = None;
    for plugin in candidates {
        match attempt(plugin) {
            Ok(output) => return Ok((plugin, output)),
            Err(err) => {
                tracing::debug!(plugin = plugin.name(), error = %err, "plugin failed, trying next");
                last_error = Some(err);
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        name: &'static str,
        order: i32,
        matcher: Matcher,
        fails: bool,
    }

    impl Plugin for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn order(&self) -> i32 {
            self.order
        }
        fn handles(&self, file: &FileInfo) -> bool {
            self.matcher.matches(file)
        }
    }

    fn fake(name: &'static str, order: i32, matcher: Matcher, fails: bool) -> Arc<Fake> {
        Arc::new(Fake {
            name,
            order,
            matcher,
            fails,
        })
    }

    fn file(url: &str) -> FileInfo {
        FileInfo::new(Url::parse(url).unwrap())
    }

    fn attempt(p: &Fake) -> Result<&'static str, RefError> {
        if p.fails {
            Err(RefError::ParseError {
                uri: "x".into(),
                message: p.name.into(),
            })
        } else {
            Ok(p.name)
        }
    }

    #[test]
    fn select_sorts_by_order() {
        let plugins = vec![
            fake("late", 300, Matcher::Always, false),
            fake("early", 100, Matcher::Always, false),
            fake("never", 1, Matcher::Never, false),
        ];
        let names: Vec<_> = select(&plugins, &file("file:///a.json"), false)
            .iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn select_falls_back_to_all() {
        let plugins = vec![fake("json", 100, Matcher::extensions(&[".json"]), false)];
        assert!(select(&plugins, &file("file:///a.bin"), false).is_empty());
        assert_eq!(select(&plugins, &file("file:///a.bin"), true).len(), 1);
    }

    #[test]
    fn run_falls_through_failures() {
        let plugins = vec![
            fake("first", 1, Matcher::Always, true),
            fake("second", 2, Matcher::Always, false),
        ];
        let (winner, output) = run(select(&plugins, &file("file:///a"), false), attempt).unwrap();
        assert_eq!(winner.name, "second");
        assert_eq!(output, "second");
    }

    #[test]
    fn run_reports_last_error() {
        let plugins = vec![
            fake("first", 1, Matcher::Always, true),
            fake("second", 2, Matcher::Always, true),
        ];
        match run(select(&plugins, &file("file:///a"), false), attempt) {
            Err(Some(RefError::ParseError { message, .. })) => assert_eq!(message, "second"),
            other => panic!("unexpected {:?}", other.map(|(p, _)| p.name)),
        }
    }

    #[test]
    fn run_without_candidates() {
        let plugins: Vec<Arc<Fake>> = Vec::new();
        assert!(matches!(run(select(&plugins, &file("file:///a"), false), attempt), Err(None)));
    }

    #[test]
    fn pattern_and_predicate_matchers() {
        let http = Matcher::Pattern(Regex::new("^https?://").unwrap());
        assert!(http.matches(&file("https://example.com/a.json")));
        assert!(!http.matches(&file("file:///a.json")));

        let custom = Matcher::Predicate(Arc::new(|f: &FileInfo| f.url.path().contains("/vendor/")));
        assert!(custom.matches(&file("file:///vendor/x.json")));
    }
}
