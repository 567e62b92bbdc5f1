//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between the callers that decide what an avatar or thumbnail should look like
//! (the [`Normalizer`](crate::normalize::Normalizer) and the
//! [`ThumbnailDeriver`](crate::thumbnail::ThumbnailDeriver)) and the pixel work
//! in [`operations`](super::operations).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1-100, default 90). Clamped on construction.
//! - [`Rgb`]: An opaque background color used when flattening transparency.
//! - [`NormalizationSpec`]: Target avatar size, background and quality.
//! - [`DerivationSpec`]: Thumbnail size; identified by its parameter tuple.

use super::backend::ImagingError;
use sha2::{Digest, Sha256};
use std::fmt;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    /// Parse `#rrggbb` or `#rgb`. The leading `#` is optional.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            6 => Some(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?])),
            3 => {
                let expand = |v: u8| v * 17;
                Some(Rgb([
                    expand(channel(0..1)?),
                    expand(channel(1..2)?),
                    expand(channel(2..3)?),
                ]))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// How an uploaded image becomes the canonical avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationSpec {
    target_size: (u32, u32),
    background: Rgb,
    quality: Quality,
}

impl NormalizationSpec {
    /// Both target dimensions must be non-zero.
    pub fn new(
        target_size: (u32, u32),
        background: Rgb,
        quality: Quality,
    ) -> Result<Self, ImagingError> {
        if target_size.0 == 0 || target_size.1 == 0 {
            return Err(ImagingError::InvalidImage {
                width: target_size.0,
                height: target_size.1,
            });
        }
        Ok(Self {
            target_size,
            background,
            quality,
        })
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// A way of deriving a secondary asset from a normalized avatar.
///
/// Two specs with the same parameters are the same spec; there is no name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationSpec {
    thumb_size: (u32, u32),
}

impl DerivationSpec {
    pub fn new(thumb_size: (u32, u32)) -> Result<Self, ImagingError> {
        if thumb_size.0 == 0 || thumb_size.1 == 0 {
            return Err(ImagingError::InvalidImage {
                width: thumb_size.0,
                height: thumb_size.1,
            });
        }
        Ok(Self { thumb_size })
    }

    pub fn thumb_size(&self) -> (u32, u32) {
        self.thumb_size
    }

    /// SHA-256 of the derivation parameters plus the encoding quality.
    ///
    /// If any input changes, previously derived files are no longer addressed.
    pub fn params_hash(&self, quality: Quality) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"thumbnail\0");
        hasher.update(self.thumb_size.0.to_le_bytes());
        hasher.update(self.thumb_size.1.to_le_bytes());
        hasher.update(quality.value().to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn parse_long_and_short_hex() {
        assert_eq!(Rgb::parse_hex("#ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse_hex("0a141e"), Some(Rgb([10, 20, 30])));
        assert_eq!(Rgb::parse_hex("#fa0"), Some(Rgb([255, 170, 0])));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Rgb::parse_hex("#ffff"), None);
        assert_eq!(Rgb::parse_hex("#gggggg"), None);
        assert_eq!(Rgb::parse_hex(""), None);
        assert_eq!(Rgb::parse_hex("#ééé"), None);
    }

    #[test]
    fn rgb_displays_as_hex() {
        assert_eq!(Rgb([10, 20, 255]).to_string(), "#0a14ff");
    }

    #[test]
    fn normalization_spec_rejects_zero_size() {
        assert!(NormalizationSpec::new((0, 500), Rgb::WHITE, Quality::default()).is_err());
        assert!(NormalizationSpec::new((500, 0), Rgb::WHITE, Quality::default()).is_err());
        assert!(NormalizationSpec::new((500, 500), Rgb::WHITE, Quality::default()).is_ok());
    }

    #[test]
    fn derivation_specs_compare_by_parameters() {
        let a = DerivationSpec::new((150, 150)).unwrap();
        let b = DerivationSpec::new((150, 150)).unwrap();
        let c = DerivationSpec::new((64, 64)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn params_hash_varies_with_size_and_quality() {
        let a = DerivationSpec::new((150, 150)).unwrap();
        let b = DerivationSpec::new((150, 151)).unwrap();
        assert_eq!(a.params_hash(Quality::new(90)), a.params_hash(Quality::new(90)));
        assert_ne!(a.params_hash(Quality::new(90)), b.params_hash(Quality::new(90)));
        assert_ne!(a.params_hash(Quality::new(90)), a.params_hash(Quality::new(80)));
        assert_eq!(a.params_hash(Quality::new(90)).len(), 64);
    }
}
