//! Persisting normalized avatars.
//!
//! The second half of the upload path: after
//! [`Normalizer::normalize`](crate::normalize::Normalizer::normalize)
//! succeeds, the caller hands the asset to [`AvatarStore::persist`]. The
//! write goes through storage (atomic replacement), and only once it has
//! succeeded are the derived assets of that avatar invalidated.

use crate::cache::AssetCache;
use crate::error::AssetError;
use crate::normalize::NormalizedAsset;
use crate::storage::Storage;
use crate::types::{AssetHandle, Location};
use tracing::{debug, warn};

/// Length of the fingerprint prefix used to name uploads.
const UPLOAD_NAME_LEN: usize = 16;

/// Content-addressed handle for a fresh upload: `<upload_dir>/<hash>.jpg`.
pub fn upload_handle(upload_dir: &str, asset: &NormalizedAsset) -> AssetHandle {
    AssetHandle::new(format!(
        "{}/{}.jpg",
        upload_dir.trim_end_matches('/'),
        asset.fingerprint().short(UPLOAD_NAME_LEN)
    ))
}

/// Writes normalized avatars and keeps the derived-asset cache honest.
pub struct AvatarStore<S, C> {
    storage: S,
    cache: C,
}

impl<S: Storage, C: AssetCache> AvatarStore<S, C> {
    pub fn new(storage: S, cache: C) -> Self {
        Self { storage, cache }
    }

    /// Store `asset` at `handle`, replacing any previous avatar there.
    ///
    /// Uploads are content-addressed, so a new avatar usually lands on a new
    /// handle; pass the handle it supersedes as `replaces` so that avatar's
    /// derived assets are purged too. On failure the previous avatar and its
    /// cache entries are untouched.
    pub fn persist(
        &self,
        handle: &AssetHandle,
        asset: &NormalizedAsset,
        replaces: Option<&AssetHandle>,
    ) -> Result<Location, AssetError> {
        if handle.is_empty() {
            return Err(AssetError::SourceNotFound(String::new()));
        }
        let location = self
            .storage
            .write(handle.path(), asset.bytes())
            .inspect_err(|e| warn!(handle = %handle, error = %e, "failed to persist avatar"))?;
        self.cache.invalidate(handle);
        if let Some(old) = replaces.filter(|old| !old.is_empty() && *old != handle) {
            self.cache.invalidate(old);
        }
        debug!(
            handle = %handle,
            replaces = ?replaces.map(AssetHandle::path),
            fingerprint = %asset.fingerprint().short(12),
            "persisted avatar"
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheKey, Fingerprint, MemoryCache};
    use crate::imaging::{DerivationSpec, NormalizationSpec, Quality, Rgb, RustBackend};
    use crate::normalize::Normalizer;
    use crate::test_helpers::{MemoryStorage, gradient_rgb, png_bytes};
    use image::DynamicImage;

    fn asset(w: u32, h: u32) -> NormalizedAsset {
        let spec = NormalizationSpec::new((40, 40), Rgb::WHITE, Quality::default()).unwrap();
        Normalizer::new(RustBackend::new(), spec)
            .normalize(&png_bytes(&DynamicImage::ImageRgb8(gradient_rgb(w, h))))
            .unwrap()
    }

    fn cached(cache: &MemoryCache, handle: &AssetHandle) {
        cache.put(
            CacheKey::new(handle.clone(), DerivationSpec::new((10, 10)).unwrap()),
            CacheEntry {
                fingerprint: Fingerprint::of(b"old"),
                bytes: b"old thumb".to_vec(),
            },
        );
    }

    #[test]
    fn upload_handle_is_content_addressed() {
        let a = asset(80, 60);
        let handle = upload_handle("profile_uploads/", &a);
        assert_eq!(
            handle.path(),
            format!("profile_uploads/{}.jpg", a.fingerprint().short(16))
        );
    }

    #[test]
    fn persist_writes_and_invalidates() {
        let storage = MemoryStorage::new();
        let cache = MemoryCache::new();
        let handle = AssetHandle::new("u/a.jpg");
        cached(&cache, &handle);

        let store = AvatarStore::new(&storage, &cache);
        let a = asset(80, 60);
        let location = store.persist(&handle, &a, None).unwrap();

        assert_eq!(location.as_str(), "/media/u/a.jpg");
        assert_eq!(storage.read("u/a.jpg").unwrap(), a.bytes());
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_persist_keeps_previous_avatar_and_cache() {
        let storage = MemoryStorage::new();
        let cache = MemoryCache::new();
        let handle = AssetHandle::new("u/a.jpg");
        storage.write("u/a.jpg", b"previous").unwrap();
        cached(&cache, &handle);

        storage.fail_writes(true);
        let store = AvatarStore::new(&storage, &cache);
        let result = store.persist(&handle, &asset(80, 60), None);

        assert!(matches!(result, Err(AssetError::Io(_))));
        assert_eq!(storage.read("u/a.jpg").unwrap(), b"previous");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn persist_rejects_empty_handle() {
        let storage = MemoryStorage::new();
        let store = AvatarStore::new(&storage, MemoryCache::new());
        let result = store.persist(&AssetHandle::none(), &asset(10, 10), None);
        assert!(matches!(result, Err(AssetError::SourceNotFound(_))));
        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn replacing_upload_purges_superseded_handle() {
        let storage = MemoryStorage::new();
        let cache = MemoryCache::new();
        let store = AvatarStore::new(&storage, &cache);

        let first = asset(80, 60);
        let old = upload_handle("profile_uploads", &first);
        store.persist(&old, &first, None).unwrap();
        cached(&cache, &old);
        let unrelated = AssetHandle::new("profile_uploads/someone-else.jpg");
        cached(&cache, &unrelated);

        let second = asset(60, 80);
        let new = upload_handle("profile_uploads", &second);
        assert_ne!(new, old);
        store.persist(&new, &second, Some(&old)).unwrap();

        let key = |h: &AssetHandle| CacheKey::new(h.clone(), DerivationSpec::new((10, 10)).unwrap());
        assert!(cache.get(&key(&old)).is_none());
        assert!(cache.get(&key(&unrelated)).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_replacement_keeps_superseded_entries() {
        let storage = MemoryStorage::new();
        let cache = MemoryCache::new();
        let old = AssetHandle::new("profile_uploads/old.jpg");
        cached(&cache, &old);

        storage.fail_writes(true);
        let store = AvatarStore::new(&storage, &cache);
        let new = AssetHandle::new("profile_uploads/new.jpg");
        let result = store.persist(&new, &asset(20, 20), Some(&old));

        assert!(result.is_err());
        assert_eq!(cache.len(), 1);
    }
}
