// src/iiif/traverse.rs
// =============================================================================
// The traversal engine: a worklist walk over remote collection documents.
//
// How it works:
// 1. Seed the frontier with the starting URL (after validating its syntax)
// 2. Pop the next URL, fetch it through the cache, classify it
// 3. Append unseen manifests to the results; enqueue unseen sub-collections
//    at the back of the frontier
// 4. If the document names a next page, enqueue it at the FRONT, so a
//    collection's pages drain completely before sibling collections run -
//    that keeps each collection's manifests contiguous in the output
// 5. Repeat until the frontier empties or the manifest ceiling is reached
//
// Guarantees:
// - Termination on cycles: every URL enters `visited` exactly once, before
//   it is enqueued, so a collection that references an ancestor (or itself)
//   is simply skipped the second time it is seen
// - Determinism: FIFO order plus document order means two runs over the
//   same documents produce identical output
// - Failure isolation: a URL that cannot be fetched is recorded and
//   skipped; the walk never aborts because one branch is unreachable
//
// One fetch is in flight at a time - the awaits here are sequential on
// purpose, this tool is a polite single-stream crawler.
// =============================================================================

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{Cache, FetchError, Fetcher};

use super::document::{CollectionDocument, ItemKind};

/// Knobs for one traversal.
#[derive(Debug, Clone, Default)]
pub struct TraverseOptions {
    /// Stop once this many manifests have been collected (all if None)
    pub max_manifests: Option<usize>,
}

/// One URL the traversal could not fetch, and why.
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub error: FetchError,
}

/// Everything one traversal discovered.
///
/// `manifests` and `collections` are unique and in discovery order; the
/// seed URL is always the first collection. Pagination continuation pages
/// are never listed as collections - they are pieces of one already-counted
/// collection.
#[derive(Debug, Default)]
pub struct TraversalOutcome {
    pub manifests: Vec<String>,
    pub collections: Vec<String>,
    pub failures: Vec<FetchFailure>,
}

impl TraversalOutcome {
    fn ceiling_reached(&self, opts: &TraverseOptions) -> bool {
        matches!(opts.max_manifests, Some(max) if self.manifests.len() >= max)
    }
}

/// Walks a IIIF collection tree and returns every manifest and collection
/// reachable from `seed_url`.
///
/// The only fatal error is a syntactically invalid seed URL, rejected here
/// before any network activity; every per-URL problem after that lands in
/// `TraversalOutcome::failures` instead.
pub async fn collect(
    seed_url: &str,
    cache: &Cache,
    fetcher: &Fetcher,
    opts: &TraverseOptions,
) -> anyhow::Result<TraversalOutcome> {
    Url::parse(seed_url)
        .map_err(|e| anyhow::anyhow!("invalid collection URL '{}': {}", seed_url, e))?;

    let mut outcome = TraversalOutcome::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<String> = VecDeque::new();

    visited.insert(seed_url.to_string());
    outcome.collections.push(seed_url.to_string());
    frontier.push_back(seed_url.to_string());

    while let Some(url) = frontier.pop_front() {
        if outcome.ceiling_reached(opts) {
            info!(
                max = opts.max_manifests.unwrap_or(0),
                "manifest ceiling reached, stopping traversal"
            );
            break;
        }

        info!(url, "processing collection");

        let doc = match cache.get_or_fetch(&url, fetcher).await {
            Ok(doc) => doc,
            Err(error) => {
                warn!(url, error = %error, "skipping collection after fetch failure");
                outcome.failures.push(FetchFailure { url, error });
                continue;
            }
        };

        let Some(document) = CollectionDocument::from_json(&url, &doc.json) else {
            info!(url, "document is not a recognizable IIIF resource, skipping");
            continue;
        };
        debug!(url, version = ?document.version, children = document.child_refs.len(), "classified");

        for child in &document.child_refs {
            if !visited.insert(child.id.clone()) {
                debug!(id = child.id, "already seen, skipping");
                continue;
            }
            match child.kind {
                ItemKind::Manifest => {
                    // The ceiling is a hard cutoff on the count, checked per
                    // append: collections in the same batch still expand
                    if !outcome.ceiling_reached(opts) {
                        debug!(id = child.id, "added manifest");
                        outcome.manifests.push(child.id.clone());
                    }
                }
                ItemKind::Collection => {
                    debug!(id = child.id, "found nested collection");
                    outcome.collections.push(child.id.clone());
                    frontier.push_back(child.id.clone());
                }
                ItemKind::Unknown => {
                    debug!(id = child.id, "item of unrecognized type, skipping");
                }
            }
        }

        // Continuation pages jump the queue but are NOT new collections.
        // First-discovery-wins: if this URL was already seen as a
        // sub-collection (or an earlier page), it is not fetched again.
        if let Some(next) = document.next_page {
            if visited.insert(next.clone()) {
                debug!(url = next, "following pagination");
                frontier.push_front(next);
            }
        }
    }

    info!(
        manifests = outcome.manifests.len(),
        collections = outcome.collections.len(),
        failures = outcome.failures.len(),
        "traversal complete"
    );

    Ok(outcome)
}
