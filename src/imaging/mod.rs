//! Image processing: pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `ImageReader::decode`, folded into [`PixelBuffer`] |
//! | **Fit-crop** | Lanczos3 `imageops::resize` + centered crop |
//! | **Flatten** | alpha composite over a solid background |
//! | **Encode → JPEG** | `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for cover-fit geometry (unit testable)
//! - **Parameters**: Quality, colors and the normalization/derivation specs
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Pixel transforms combining calculations + resampling

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{ColorMode, Dimensions, ImageBackend, ImagingError, PixelBuffer};
pub use calculations::{FitPlan, plan_fit, source_crop};
pub use operations::{fit_and_flatten, fit_crop, flatten_alpha};
pub use params::{DerivationSpec, NormalizationSpec, Quality, Rgb};
pub use rust_backend::RustBackend;
