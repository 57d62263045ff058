// src/fetch/mod.rs
// =============================================================================
// This module contains the resilient fetch layer.
//
// Submodules:
// - error:  the typed FetchError taxonomy
// - client: HTTP fetching with retry/backoff/timeout (the Fetcher)
// - cache:  on-disk JSON cache composed in front of the Fetcher
//
// This file (mod.rs) is the module root - it re-exports the public API so
// callers write `fetch::Fetcher` instead of `fetch::client::Fetcher`.
// =============================================================================

mod cache;
mod client;
mod error;

pub use cache::{Cache, CacheMode};
pub use client::{FetchedJson, Fetcher, RetryPolicy};
pub use error::FetchError;
