//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three codec operations the pipeline
//! needs: identify, decode and encode to JPEG. Everything geometric (fit-crop,
//! alpha flattening) lives in [`operations`](super::operations) and works on
//! [`PixelBuffer`]s, so a backend only has to move between bytes and pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image` crate.

use super::params::Quality;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidImage { width: u32, height: u32 },
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Channel layout of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Gray,
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn has_alpha(self) -> bool {
        matches!(self, ColorMode::Rgba)
    }
}

/// Decoded 8-bit raster data.
///
/// Every decoded image lands in one of these three layouts. Other layouts
/// are folded in at construction: any alpha-bearing mode (gray+alpha,
/// palette with transparency, 16-bit RGBA) becomes `Rgba`, and high bit
/// depth opaque modes drop to 8 bits.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl PixelBuffer {
    pub fn width(&self) -> u32 {
        match self {
            PixelBuffer::Gray(img) => img.width(),
            PixelBuffer::Rgb(img) => img.width(),
            PixelBuffer::Rgba(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelBuffer::Gray(img) => img.height(),
            PixelBuffer::Rgb(img) => img.height(),
            PixelBuffer::Rgba(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn mode(&self) -> ColorMode {
        match self {
            PixelBuffer::Gray(_) => ColorMode::Gray,
            PixelBuffer::Rgb(_) => ColorMode::Rgb,
            PixelBuffer::Rgba(_) => ColorMode::Rgba,
        }
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => PixelBuffer::Gray(gray),
            DynamicImage::ImageRgb8(rgb) => PixelBuffer::Rgb(rgb),
            DynamicImage::ImageRgba8(rgba) => PixelBuffer::Rgba(rgba),
            other @ DynamicImage::ImageLuma16(_) => PixelBuffer::Gray(other.to_luma8()),
            other if other.color().has_alpha() => PixelBuffer::Rgba(other.to_rgba8()),
            other => PixelBuffer::Rgb(other.to_rgb8()),
        }
    }
}

impl From<PixelBuffer> for DynamicImage {
    fn from(buf: PixelBuffer) -> Self {
        match buf {
            PixelBuffer::Gray(img) => DynamicImage::ImageLuma8(img),
            PixelBuffer::Rgb(img) => DynamicImage::ImageRgb8(img),
            PixelBuffer::Rgba(img) => DynamicImage::ImageRgba8(img),
        }
    }
}

/// Trait for image codec backends.
///
/// Implementations must be pure: the same bytes always decode to the same
/// buffer, and the same buffer and quality always encode to the same bytes.
pub trait ImageBackend: Sync {
    /// Read image dimensions from the header without decoding pixels.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, ImagingError>;

    /// Decode any supported raster format.
    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ImagingError>;

    /// Encode an opaque buffer as baseline JPEG.
    fn encode_jpeg(&self, buffer: &PixelBuffer, quality: Quality) -> Result<Vec<u8>, ImagingError>;
}

impl<B: ImageBackend + ?Sized> ImageBackend for &B {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, ImagingError> {
        (**self).identify(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ImagingError> {
        (**self).decode(bytes)
    }

    fn encode_jpeg(&self, buffer: &PixelBuffer, quality: Quality) -> Result<Vec<u8>, ImagingError> {
        (**self).encode_jpeg(buffer, quality)
    }
}
