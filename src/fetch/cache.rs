// src/fetch/cache.rs
// =============================================================================
// On-disk cache for fetched IIIF JSON, composed in front of the Fetcher.
//
// Layout: one file per URL inside the cache directory, named by the SHA-256
// hex digest of the URL (URLs contain '/', ':' and '?' which are not safe
// as filenames; a cryptographic hash is deterministic and collision-free
// for practical purposes). The file holds the body exactly as received.
//
// Failure stance:
// - A read failure (missing, unreadable, corrupt JSON) is a cache miss and
//   falls through to a live fetch.
// - A write failure is logged and swallowed: the document was already
//   fetched successfully, so a full disk must not turn that into an error.
// =============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::client::{FetchedJson, Fetcher};
use super::error::FetchError;

/// How the cache behaves around a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Read the cache if present, otherwise fetch and write
    Normal,
    /// Always fetch, but still write the result for next time
    SkipRead,
    /// Always fetch, never read or write
    Disabled,
}

/// On-disk JSON cache keyed by URL.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    mode: CacheMode,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>, mode: CacheMode) -> Self {
        Cache {
            dir: dir.into(),
            mode,
        }
    }

    /// Returns the cached document for `url`, or fetches it through
    /// `fetcher` (writing it back unless caching is disabled).
    pub async fn get_or_fetch(
        &self,
        url: &str,
        fetcher: &Fetcher,
    ) -> Result<FetchedJson, FetchError> {
        if self.mode == CacheMode::Normal {
            if let Some(doc) = self.read(url) {
                debug!(url, "cache hit");
                return Ok(doc);
            }
        }

        let doc = fetcher.fetch(url).await?;

        if self.mode != CacheMode::Disabled {
            self.write(url, &doc.raw);
        }

        Ok(doc)
    }

    /// Path the body for `url` is stored at.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_url(url)))
    }

    // Best-effort read: any failure is just a miss
    fn read(&self, url: &str) -> Option<FetchedJson> {
        let path = self.entry_path(url);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(json) => Some(FetchedJson { raw, json }),
            Err(e) => {
                warn!(url, path = %path.display(), error = %e, "corrupt cache entry, refetching");
                None
            }
        }
    }

    // Best-effort write: log and carry on if the disk says no
    fn write(&self, url: &str, raw: &str) {
        let path = self.entry_path(url);
        if let Err(e) = write_entry(&self.dir, &path, raw) {
            warn!(url, path = %path.display(), error = %e, "failed to write cache entry");
        }
    }
}

fn write_entry(dir: &Path, path: &Path, raw: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(path, raw)
}

// SHA-256 hex of the URL: deterministic, filesystem-safe, no collisions
// short of a hash collision
fn hash_url(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
