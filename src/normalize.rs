//! Upload normalization.
//!
//! Turns raw upload bytes into the canonical avatar: decode, cover-fit to the
//! configured size, flatten transparency onto the background color, and
//! encode as JPEG. Normalization is a pure transformation; persisting the
//! result is a separate step ([`AvatarStore::persist`](crate::store::AvatarStore::persist)),
//! so a failed upload never touches the stored avatar.

use crate::cache::Fingerprint;
use crate::imaging::{
    Dimensions, ImageBackend, ImagingError, NormalizationSpec, PixelBuffer, fit_and_flatten,
};
use tracing::{debug, error};

/// Encoded canonical avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAsset {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    fingerprint: Fingerprint,
}

impl NormalizedAsset {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Normalizes uploads according to a fixed [`NormalizationSpec`].
pub struct Normalizer<B> {
    backend: B,
    spec: NormalizationSpec,
}

impl<B: ImageBackend> Normalizer<B> {
    pub fn new(backend: B, spec: NormalizationSpec) -> Self {
        Self { backend, spec }
    }

    pub fn spec(&self) -> &NormalizationSpec {
        &self.spec
    }

    /// Header-only check of an upload: recognized format and non-zero size.
    pub fn validate(&self, upload: &[u8]) -> Result<Dimensions, ImagingError> {
        let dims = self.backend.identify(upload)?;
        if dims.width == 0 || dims.height == 0 {
            return Err(ImagingError::InvalidImage {
                width: dims.width,
                height: dims.height,
            });
        }
        Ok(dims)
    }

    /// Decode, fit, flatten and encode an upload.
    pub fn normalize(&self, upload: &[u8]) -> Result<NormalizedAsset, ImagingError> {
        let decoded = self
            .validate(upload)
            .and_then(|_| self.backend.decode(upload))
            .inspect_err(|e| {
                debug!(bytes = upload.len(), error = %e, "rejected upload");
            })?;
        let source = decoded.dimensions();
        let mode = decoded.mode();

        let (width, height) = self.spec.target_size();
        let rgb = fit_and_flatten(decoded, (width, height), self.spec.background())?;

        let bytes = self
            .backend
            .encode_jpeg(&PixelBuffer::Rgb(rgb), self.spec.quality())
            .inspect_err(|e| error!(error = %e, "avatar encode failed"))?;

        debug!(
            source_width = source.width,
            source_height = source.height,
            ?mode,
            width,
            height,
            bytes = bytes.len(),
            "normalized avatar"
        );

        Ok(NormalizedAsset {
            fingerprint: Fingerprint::of(&bytes),
            bytes,
            width,
            height,
        })
    }
}
