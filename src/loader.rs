//! Document loading: read bytes with a resolver, then decode them with a parser.

use serde_json::Value;
use url::Url;

use crate::error::RefError;
use crate::options::ParserOptions;
use crate::parsers::is_empty;
use crate::plugins::{self, FileInfo, Plugin};
use crate::refs::DocumentKind;

/// Load the document at `url`.
///
/// Resolvers that handle the URL are tried in order; the first to
/// succeed provides the bytes. Parsers are then tried the same way,
/// falling back to every registered parser when none claims the file.
///
/// # Errors
///
/// Returns `UnresolvedReference` wrapping the last resolver or parser
/// failure, or `EmptyDocument` when a parser that disallows empty
/// documents produced one.
pub fn load(url: &Url, options: &ParserOptions) -> Result<(DocumentKind, Value), RefError> {
    let mut file = FileInfo::new(url.clone());
    file.url.set_fragment(None);
    let location = file.url.to_string();

    let candidates = plugins::select(&options.resolvers, &file, false);
    if candidates.is_empty() {
        return Err(RefError::unresolved(
            location.clone(),
            Some(RefError::NoResolver { uri: location }),
        ));
    }
    let (resolver, data) = plugins::run(candidates, |r| r.read(&file, &options.resolve))
        .map_err(|last| RefError::unresolved(location.clone(), last))?;
    tracing::debug!(uri = %location, resolver = resolver.name(), bytes = data.len(), "read document");
    file.data = Some(data);

    let candidates = plugins::select(&options.parsers, &file, true);
    let (parser, value) = plugins::run(candidates, |p| p.parse(&file))
        .map_err(|last| RefError::unresolved(location.clone(), last))?;
    if !parser.allow_empty() && is_empty(&value) {
        return Err(RefError::EmptyDocument { uri: location });
    }
    tracing::debug!(uri = %location, parser = parser.name(), "parsed document");

    Ok((DocumentKind::of(&file.url), value))
}
