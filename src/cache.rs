//! Derived-asset cache.
//!
//! Thumbnails are derived lazily from the normalized avatar and memoized
//! here. Decoding, resampling and re-encoding is the expensive part of a
//! read, so a warm cache turns a thumbnail request into a map lookup.
//!
//! # Design
//!
//! The cache is keyed by `(source handle, derivation spec)` and every entry
//! remembers the [`Fingerprint`] of the source it was derived from.
//!
//! - **Fingerprint**: SHA-256 of the normalized avatar bytes. Content-based
//!   rather than time-based, so replacing an avatar with different bytes
//!   always changes it, and re-uploading identical bytes keeps old entries
//!   valid.
//!
//! - **Staleness**: an entry is only served when its fingerprint equals the
//!   source's current fingerprint. [`AssetCache::invalidate`] may purge
//!   entries eagerly, but correctness never depends on it: readers always
//!   compare fingerprints.
//!
//! - **Concurrency**: two readers missing the same key both derive and both
//!   [`put`](AssetCache::put); the last writer wins. Derivation is
//!   deterministic, so either result is correct. Implementations never hold
//!   a lock while deriving.
//!
//! ## Backends
//!
//! [`MemoryCache`] keeps entries in a process-local map. [`StorageCache`]
//! persists them through the [`Storage`] collaborator so they survive
//! restarts: each entry is a JPEG plus a JSON sidecar recording the source
//! fingerprint and a digest of the JPEG bytes.

use crate::imaging::{DerivationSpec, Quality};
use crate::storage::Storage;
use crate::types::AssetHandle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Version of the sidecar format. Bump this to invalidate all persisted
/// entries when the format or key computation changes.
const SIDECAR_VERSION: u32 = 1;

/// Content fingerprint of a source asset: lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, for file naming.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which derived asset of which source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: AssetHandle,
    pub spec: DerivationSpec,
}

impl CacheKey {
    pub fn new(source: AssetHandle, spec: DerivationSpec) -> Self {
        Self { source, spec }
    }
}

/// Encoded derived bytes plus the fingerprint of the source they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub bytes: Vec<u8>,
}

impl CacheEntry {
    pub fn is_fresh(&self, current: &Fingerprint) -> bool {
        self.fingerprint == *current
    }
}

/// Shared store of derived assets.
pub trait AssetCache: Send + Sync {
    /// The entry for `key`, fresh or not. Callers check freshness.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    fn put(&self, key: CacheKey, entry: CacheEntry);

    /// Called when the avatar at `source` has been replaced.
    fn invalidate(&self, source: &AssetHandle);
}

impl<C: AssetCache + ?Sized> AssetCache for &C {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        (**self).put(key, entry)
    }

    fn invalidate(&self, source: &AssetHandle) {
        (**self).invalidate(source)
    }
}

// =============================================================================
// In-memory cache
// =============================================================================

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    fn invalidate(&self, source: &AssetHandle) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| key.source != *source);
        debug!(
            source = %source,
            purged = before - entries.len(),
            "invalidated derived assets"
        );
    }
}

// =============================================================================
// Storage-backed cache
// =============================================================================

/// Sidecar written next to each persisted entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Sidecar {
    version: u32,
    fingerprint: Fingerprint,
    /// SHA-256 of the JPEG bytes; pairs the sidecar with the exact bytes it
    /// was written for when two writers race.
    digest: String,
}

/// Cache persisted through a [`Storage`].
///
/// Layout: `<cache_dir>/<source hash>/<params hash>.jpg` and `.json`.
/// Hashes are truncated SHA-256, so handles with arbitrary characters map
/// onto safe file names.
pub struct StorageCache<S> {
    storage: S,
    cache_dir: String,
    quality: Quality,
}

impl<S: Storage> StorageCache<S> {
    /// `quality` is part of the entry name; changing it orphans old entries.
    pub fn new(storage: S, cache_dir: impl Into<String>, quality: Quality) -> Self {
        Self {
            storage,
            cache_dir: cache_dir.into(),
            quality,
        }
    }

    /// Storage paths of the JPEG and its sidecar for `key`.
    pub fn entry_paths(&self, key: &CacheKey) -> (String, String) {
        let source_hash = Fingerprint::of(key.source.path().as_bytes());
        let params_hash = key.spec.params_hash(self.quality);
        let base = format!(
            "{}/{}/{}",
            self.cache_dir.trim_end_matches('/'),
            source_hash.short(16),
            &params_hash[..16]
        );
        (format!("{base}.jpg"), format!("{base}.json"))
    }

    fn load(&self, key: &CacheKey) -> Option<CacheEntry> {
        let (bytes_path, sidecar_path) = self.entry_paths(key);
        if !self.storage.exists(&sidecar_path) {
            return None;
        }
        let sidecar: Sidecar = match self
            .storage
            .read(&sidecar_path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_slice(&raw).map_err(|e| e.to_string()))
        {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %sidecar_path, error = %e, "unreadable cache sidecar");
                return None;
            }
        };
        if sidecar.version != SIDECAR_VERSION {
            return None;
        }
        let bytes = self.storage.read(&bytes_path).ok()?;
        if Fingerprint::of(&bytes).as_str() != sidecar.digest {
            debug!(path = %bytes_path, "cache bytes do not match sidecar");
            return None;
        }
        Some(CacheEntry {
            fingerprint: sidecar.fingerprint,
            bytes,
        })
    }
}

impl<S: Storage> AssetCache for StorageCache<S> {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.load(key)
    }

    fn put(&self, key: CacheKey, entry: CacheEntry) {
        let (bytes_path, sidecar_path) = self.entry_paths(&key);
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            digest: Fingerprint::of(&entry.bytes).0,
            fingerprint: entry.fingerprint,
        };
        let result = serde_json::to_vec_pretty(&sidecar)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                self.storage.write(&bytes_path, &entry.bytes)?;
                self.storage.write(&sidecar_path, &json)
            });
        // A failed put only costs a re-derive on the next read.
        if let Err(e) = result {
            warn!(source = %key.source, error = %e, "failed to persist derived asset");
        }
    }

    fn invalidate(&self, source: &AssetHandle) {
        // Persisted entries carry their fingerprint; a replaced source can
        // never match them, so there is nothing to purge eagerly.
        debug!(source = %source, "storage cache relies on fingerprint checks");
    }
}

/// Summary of cache behaviour over a deriver's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub stale: u32,
    pub misses: u32,
}

impl CacheStats {
    /// Number of derivations that ran (misses plus stale entries).
    pub fn derived(&self) -> u32 {
        self.stale + self.misses
    }

    pub fn total(&self) -> u32 {
        self.hits + self.stale + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.stale > 0 {
            if self.stale > 0 {
                write!(
                    f,
                    "{} cached, {} stale, {} derived ({} total)",
                    self.hits,
                    self.stale,
                    self.derived(),
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} derived ({} total)",
                    self.hits,
                    self.derived(),
                    self.total()
                )
            }
        } else {
            write!(f, "{} derived", self.misses)
        }
    }
}
