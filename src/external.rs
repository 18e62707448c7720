//! Discovery and loading of externally referenced documents.
//!
//! Documents are loaded in waves: every `$ref` found in the documents of
//! one wave that points into an unregistered document is reserved, then
//! the reserved documents are fetched concurrently. Newly loaded
//! documents are crawled for the next wave. Reservation happens before
//! fetching, so each document is fetched once even when it is reachable
//! from many places or through a cycle.

use std::thread;

use serde_json::Value;
use url::Url;

use crate::error::RefError;
use crate::loader;
use crate::options::ParserOptions;
use crate::reference::Node;
use crate::refs::{DocumentKind, Refs};
use crate::uri;

type Fetched = (Url, Result<(DocumentKind, Value), RefError>);

/// Load every document reachable from the registry's root.
///
/// Does nothing when external resolution is disabled.
pub(crate) fn resolve_external(refs: &mut Refs, options: &ParserOptions) -> Result<(), RefError> {
    if !options.resolve.external {
        return Ok(());
    }

    let mut crawl_next = vec![refs.root().uri().clone()];
    while !crawl_next.is_empty() {
        let mut found = Vec::new();
        for url in &crawl_next {
            if let Some(document) = refs.document(url.as_str()) {
                crawl(document.value(), url.as_str(), &mut found)?;
            }
        }

        let wave: Vec<Url> = found.into_iter().filter(|url| refs.reserve(url)).collect();
        if wave.is_empty() {
            break;
        }
        tracing::debug!(documents = wave.len(), "fetching external documents");

        crawl_next.clear();
        let mut first_error = None;
        for (url, result) in fetch(wave, options) {
            match result {
                Ok((kind, value)) => {
                    crawl_next.push(url.clone());
                    refs.insert(url, kind, value);
                }
                Err(err) => {
                    refs.release(&url);
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
    }
    Ok(())
}

/// Collect the documents referenced from `value` other than `base` itself.
fn crawl(value: &Value, base: &str, found: &mut Vec<Url>) -> Result<(), RefError> {
    match Node::of(value) {
        Node::Ref(reference) => {
            let target = uri::resolve(base, reference.target())?;
            if uri::document_key(&target) != uri::document_key(base) {
                let mut url = uri::parse(&target)?;
                url.set_fragment(None);
                found.push(url);
            }
            for (_, child) in reference.extensions() {
                crawl(child, base, found)?;
            }
        }
        Node::Object(map) => {
            for child in map.values() {
                crawl(child, base, found)?;
            }
        }
        Node::Array(items) => {
            for child in items {
                crawl(child, base, found)?;
            }
        }
        Node::Scalar(_) => {}
    }
    Ok(())
}

fn fetch(wave: Vec<Url>, options: &ParserOptions) -> Vec<Fetched> {
    if wave.len() == 1 {
        return wave
            .into_iter()
            .map(|url| {
                let result = loader::load(&url, options);
                (url, result)
            })
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = wave
            .into_iter()
            .map(|url| {
                scope.spawn(move || {
                    let result = loader::load(&url, options);
                    (url, result)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}
