//! # Avatar Pipeline
//!
//! Turns arbitrary user-uploaded images into a canonical avatar, derives
//! thumbnails from it on demand, and resolves stored avatars to servable
//! locations with a placeholder fallback.
//!
//! # Architecture: Upload Path and Display Path
//!
//! ```text
//! upload:   raw bytes  →  Normalizer  →  NormalizedAsset  →  AvatarStore::persist
//! display:  AssetHandle  →  ThumbnailDeriver (cache)  →  AssetUrlResolver  →  Location
//! ```
//!
//! The upload path runs once per avatar change and is allowed to fail loudly.
//! The display path runs on every page render and never fails: anything that
//! goes wrong resolves to the configured placeholder.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pure-Rust image operations: decode, fit-crop, alpha flattening, JPEG encode |
//! | [`normalize`] | Upload normalization into the canonical avatar |
//! | [`store`] | Persisting normalized avatars and invalidating their derivatives |
//! | [`thumbnail`] | Lazy thumbnail derivation backed by a fingerprint-validated cache |
//! | [`cache`] | Cache keys, entries, in-memory and storage-backed caches |
//! | [`resolve`] | Handle to location lookup with placeholder fallback |
//! | [`storage`] | Byte storage seam and its filesystem implementation |
//! | [`config`] | `avatar.toml` loading, validation and merging |
//! | [`types`] | Shared handle and location types |
//!
//! # Design Decisions
//!
//! ## Content Fingerprints Over Timestamps
//!
//! A cached thumbnail records the SHA-256 of the avatar bytes it was derived
//! from. A lookup that finds a different fingerprint is a miss, so replacing an
//! avatar can never serve a stale thumbnail even if invalidation was skipped.
//!
//! ## Always JPEG
//!
//! Every canonical avatar and thumbnail is an opaque baseline JPEG. Alpha is
//! flattened onto a configured background before encoding.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, JPEG
//! encoding). No system libraries are required.

pub mod cache;
pub mod config;
mod error;
pub mod imaging;
pub mod normalize;
pub mod resolve;
pub mod storage;
pub mod store;
pub mod thumbnail;
pub mod types;

pub use error::AssetError;

#[cfg(test)]
pub(crate) mod test_helpers;
