//! Pure Rust codec backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `ImageReader::decode`, format sniffed from magic bytes |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{Dimensions, ImageBackend, ImagingError, PixelBuffer};
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Formats whose decoders are compiled in.
const UPLOAD_CANDIDATES: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

static SUPPORTED_FORMATS: LazyLock<Vec<ImageFormat>> = LazyLock::new(|| {
    UPLOAD_CANDIDATES
        .iter()
        .copied()
        .filter(|fmt| fmt.reading_enabled())
        .collect()
});

/// Returns the upload formats that have working decoders compiled in.
pub fn supported_input_formats() -> &'static [ImageFormat] {
    &SUPPORTED_FORMATS
}

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Sniff the format from magic bytes and reject anything not compiled in.
fn open_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImagingError> {
    if bytes.is_empty() {
        return Err(ImagingError::Decode("empty input".into()));
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(format!("Failed to read header: {e}")))?;
    match reader.format() {
        Some(fmt) if supported_input_formats().contains(&fmt) => Ok(reader),
        Some(fmt) => Err(ImagingError::Decode(format!("Unsupported format: {fmt:?}"))),
        None => Err(ImagingError::Decode("Unrecognized image format".into())),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, ImagingError> {
        let (width, height) = open_reader(bytes)?
            .into_dimensions()
            .map_err(|e| ImagingError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ImagingError> {
        let img = open_reader(bytes)?
            .decode()
            .map_err(|e| ImagingError::Decode(e.to_string()))?;
        Ok(PixelBuffer::from(img))
    }

    fn encode_jpeg(&self, buffer: &PixelBuffer, quality: Quality) -> Result<Vec<u8>, ImagingError> {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.value() as u8);
        let result = match buffer {
            PixelBuffer::Gray(img) => encoder.write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                ExtendedColorType::L8,
            ),
            PixelBuffer::Rgb(img) => encoder.write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                ExtendedColorType::Rgb8,
            ),
            PixelBuffer::Rgba(_) => {
                return Err(ImagingError::Encode(
                    "JPEG cannot carry alpha; flatten before encoding".into(),
                ));
            }
        };
        result.map_err(|e| ImagingError::Encode(format!("JPEG encode failed: {e}")))?;
        Ok(out)
    }
}
