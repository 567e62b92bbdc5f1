//! Display-time location lookup with placeholder fallback.
//!
//! A missing or broken avatar must never break page rendering, so nothing
//! here returns an error: any failure resolves to the configured
//! placeholder.

use crate::cache::AssetCache;
use crate::imaging::{DerivationSpec, ImageBackend};
use crate::storage::Storage;
use crate::thumbnail::ThumbnailDeriver;
use crate::types::{AssetHandle, Location};
use tracing::{debug, warn};

/// Resolves avatar handles to servable locations.
pub struct AssetUrlResolver<S> {
    storage: S,
    placeholder: Location,
}

impl<S: Storage> AssetUrlResolver<S> {
    pub fn new(storage: S, placeholder: Location) -> Self {
        Self {
            storage,
            placeholder,
        }
    }

    pub fn placeholder(&self) -> &Location {
        &self.placeholder
    }

    /// Location of the stored avatar, or the placeholder.
    pub fn resolve(&self, handle: &AssetHandle) -> Location {
        if handle.is_empty() {
            return self.placeholder.clone();
        }
        if !self.storage.exists(handle.path()) {
            debug!(handle = %handle, "avatar missing, using placeholder");
            return self.placeholder.clone();
        }
        match self.storage.location(handle.path()) {
            Ok(location) if !location.as_str().is_empty() => location,
            Ok(_) => self.placeholder.clone(),
            Err(e) => {
                warn!(handle = %handle, error = %e, "avatar unreadable, using placeholder");
                self.placeholder.clone()
            }
        }
    }

    /// Location of a derived thumbnail, or the placeholder.
    pub fn resolve_derived<B, DS, C>(
        &self,
        deriver: &ThumbnailDeriver<B, DS, C>,
        handle: &AssetHandle,
        spec: &DerivationSpec,
    ) -> Location
    where
        B: ImageBackend,
        DS: Storage,
        C: AssetCache,
    {
        if handle.is_empty() {
            return self.placeholder.clone();
        }
        match deriver.derive_location(handle, spec) {
            Ok(location) if !location.as_str().is_empty() => location,
            Ok(_) => self.placeholder.clone(),
            Err(e) => {
                warn!(
                    handle = %handle,
                    size = ?spec.thumb_size(),
                    error = %e,
                    "thumbnail unavailable, using placeholder"
                );
                self.placeholder.clone()
            }
        }
    }
}
