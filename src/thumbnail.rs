//! Lazy thumbnail derivation.
//!
//! Thumbnails are never produced at upload time. The first request for a
//! given `(avatar, size)` pair derives the thumbnail from the **normalized**
//! avatar (never the raw upload) and memoizes it in an [`AssetCache`]; later
//! requests are served from the cache for as long as the avatar's
//! fingerprint is unchanged.
//!
//! ## Output Structure
//!
//! [`ThumbnailDeriver::derive_location`] also writes the derived JPEG through
//! storage so it can be served directly:
//!
//! ```text
//! derived/
//! └── profile_uploads/
//!     └── 3f9a0c.../                           # avatar path without extension
//!         └── 8c1e2f4a9b07-51d0aa3c-150x150.jpg  # fingerprint-params-size
//! ```
//!
//! The fingerprint prefix means a replaced avatar gets fresh thumbnail paths,
//! so stale files are never addressed.
//!
//! ## Parallel Derivation
//!
//! [`ThumbnailDeriver::derive_many`] derives several sizes of one avatar in
//! parallel using [rayon](https://docs.rs/rayon). The calls share only the
//! cache, which tolerates racing writers.

use crate::cache::{AssetCache, CacheEntry, CacheKey, CacheStats, Fingerprint};
use crate::error::AssetError;
use crate::imaging::{DerivationSpec, ImageBackend, PixelBuffer, Quality, Rgb, fit_and_flatten};
use crate::storage::Storage;
use crate::types::{AssetHandle, Location};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, error};

/// Configuration for thumbnail derivation.
#[derive(Debug, Clone)]
pub struct DeriverConfig {
    pub quality: Quality,
    /// Only used if a source unexpectedly carries alpha.
    pub background: Rgb,
    /// Storage directory for served thumbnail files.
    pub derived_dir: String,
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            background: Rgb::WHITE,
            derived_dir: "derived".to_string(),
        }
    }
}

/// Derives and caches thumbnails of normalized avatars.
pub struct ThumbnailDeriver<B, S, C> {
    backend: B,
    storage: S,
    cache: C,
    config: DeriverConfig,
    hits: AtomicU32,
    stale: AtomicU32,
    misses: AtomicU32,
}

impl<B, S, C> ThumbnailDeriver<B, S, C>
where
    B: ImageBackend,
    S: Storage,
    C: AssetCache,
{
    pub fn new(backend: B, storage: S, cache: C, config: DeriverConfig) -> Self {
        Self {
            backend,
            storage,
            cache,
            config,
            hits: AtomicU32::new(0),
            stale: AtomicU32::new(0),
            misses: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &DeriverConfig {
        &self.config
    }

    /// Cache behaviour since construction.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Thumbnail of the avatar stored at `source`.
    pub fn derive(&self, source: &AssetHandle, spec: &DerivationSpec) -> Result<Vec<u8>, AssetError> {
        let source_bytes = self.read_source(source)?;
        self.derive_from_bytes(source, &source_bytes, spec)
    }

    /// Thumbnail of `source`, whose current normalized bytes the caller
    /// already holds.
    pub fn derive_from_bytes(
        &self,
        source: &AssetHandle,
        source_bytes: &[u8],
        spec: &DerivationSpec,
    ) -> Result<Vec<u8>, AssetError> {
        let fingerprint = Fingerprint::of(source_bytes);
        self.derive_cached(source, source_bytes, &fingerprint, spec)
    }

    /// Several thumbnails of one avatar, derived in parallel.
    ///
    /// Results are in the order of `specs`.
    pub fn derive_many(
        &self,
        source: &AssetHandle,
        specs: &[DerivationSpec],
    ) -> Result<Vec<Vec<u8>>, AssetError> {
        let source_bytes = self.read_source(source)?;
        let fingerprint = Fingerprint::of(&source_bytes);
        specs
            .par_iter()
            .map(|spec| self.derive_cached(source, &source_bytes, &fingerprint, spec))
            .collect()
    }

    /// Derive (or reuse) the thumbnail file and return where it is served.
    pub fn derive_location(
        &self,
        source: &AssetHandle,
        spec: &DerivationSpec,
    ) -> Result<Location, AssetError> {
        let source_bytes = self.read_source(source)?;
        let fingerprint = Fingerprint::of(&source_bytes);
        let path = self.derived_path(source, &fingerprint, spec);

        if self.storage.exists(&path) {
            return Ok(self.storage.location(&path)?);
        }

        let bytes = self.derive_cached(source, &source_bytes, &fingerprint, spec)?;
        let location = self.storage.write(&path, &bytes)?;
        debug!(source = %source, path = %path, "wrote derived asset");
        Ok(location)
    }

    /// Storage path of the served thumbnail file for one avatar version.
    pub fn derived_path(
        &self,
        source: &AssetHandle,
        fingerprint: &Fingerprint,
        spec: &DerivationSpec,
    ) -> String {
        let (w, h) = spec.thumb_size();
        let params_hash = spec.params_hash(self.config.quality);
        format!(
            "{}/{}/{}-{}-{}x{}.jpg",
            self.config.derived_dir.trim_end_matches('/'),
            source.stem_path(),
            fingerprint.short(12),
            &params_hash[..8],
            w,
            h
        )
    }

    fn read_source(&self, source: &AssetHandle) -> Result<Vec<u8>, AssetError> {
        if source.is_empty() {
            return Err(AssetError::SourceNotFound(String::new()));
        }
        self.storage
            .read(source.path())
            .map_err(|e| AssetError::from_read(source.path(), e))
    }

    fn derive_cached(
        &self,
        source: &AssetHandle,
        source_bytes: &[u8],
        fingerprint: &Fingerprint,
        spec: &DerivationSpec,
    ) -> Result<Vec<u8>, AssetError> {
        let key = CacheKey::new(source.clone(), *spec);

        match self.cache.get(&key) {
            Some(entry) if entry.is_fresh(fingerprint) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, size = ?spec.thumb_size(), "derived asset cache hit");
                return Ok(entry.bytes);
            }
            Some(_) => {
                self.stale.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, size = ?spec.thumb_size(), "derived asset stale");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(source = %source, size = ?spec.thumb_size(), "derived asset cache miss");
            }
        }

        let bytes = self.render(source_bytes, spec)?;
        self.cache.put(
            key,
            CacheEntry {
                fingerprint: fingerprint.clone(),
                bytes: bytes.clone(),
            },
        );
        Ok(bytes)
    }

    /// Decode the normalized avatar, fit-crop to the thumbnail size, encode.
    fn render(&self, source_bytes: &[u8], spec: &DerivationSpec) -> Result<Vec<u8>, AssetError> {
        let decoded = self.backend.decode(source_bytes)?;
        let rgb = fit_and_flatten(decoded, spec.thumb_size(), self.config.background)?;
        let bytes = self
            .backend
            .encode_jpeg(&PixelBuffer::Rgb(rgb), self.config.quality)
            .inspect_err(|e| error!(error = %e, "thumbnail encode failed"))?;
        Ok(bytes)
    }
}
