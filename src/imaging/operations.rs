//! High-level pixel operations.
//!
//! These functions combine the [`calculations`](super::calculations) with the
//! `image` crate's resampling. They never touch bytes or storage; decoding and
//! encoding belong to the [`backend`](super::backend).

use super::backend::{ImagingError, PixelBuffer};
use super::calculations::{MAX_INTERMEDIATE_PIXELS, plan_fit, source_crop};
use super::params::Rgb;
use image::imageops::{self, FilterType};
use image::{GenericImageView, ImageBuffer, Pixel, RgbImage, RgbaImage};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Resize then center-crop `buffer` so it exactly covers `target`.
///
/// The color mode is preserved. A buffer already at `target` is returned
/// unchanged.
pub fn fit_crop(buffer: PixelBuffer, target: (u32, u32)) -> Result<PixelBuffer> {
    let source = (buffer.width(), buffer.height());
    if source.0 == 0 || source.1 == 0 {
        return Err(ImagingError::InvalidImage {
            width: source.0,
            height: source.1,
        });
    }
    if target.0 == 0 || target.1 == 0 {
        return Err(ImagingError::InvalidImage {
            width: target.0,
            height: target.1,
        });
    }

    let plan = plan_fit(source, target);
    if plan.is_identity(source) {
        return Ok(buffer);
    }

    let out = match buffer {
        PixelBuffer::Gray(img) => PixelBuffer::Gray(fit_crop_image(&img, target)),
        PixelBuffer::Rgb(img) => PixelBuffer::Rgb(fit_crop_image(&img, target)),
        PixelBuffer::Rgba(img) => {
            // Resample premultiplied so color under transparent pixels cannot
            // bleed into visible edges.
            let fitted = fit_crop_image(&premultiply(&img), target);
            PixelBuffer::Rgba(unpremultiply(&fitted))
        }
    };
    Ok(out)
}

/// Scale each color channel by alpha: `c * a / 255`, rounded.
pub fn premultiply(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let a = px.0[3] as u32;
        for c in &mut px.0[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
    }
    out
}

/// Inverse of [`premultiply`]. Fully transparent pixels come back black.
pub fn unpremultiply(img: &RgbaImage) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let a = px.0[3] as u32;
        for c in &mut px.0[..3] {
            *c = if a == 0 {
                0
            } else {
                ((*c as u32 * 255 + a / 2) / a).min(255) as u8
            };
        }
    }
    out
}

fn fit_crop_image<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    target: (u32, u32),
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let source = img.dimensions();
    let plan = plan_fit(source, target);
    let (tgt_w, tgt_h) = target;

    if plan.intermediate_pixels() > MAX_INTERMEDIATE_PIXELS {
        // Extreme aspect ratios would need a huge intermediate when upscaled.
        let (x, y, w, h) = source_crop(source, target);
        let region = img.view(x, y, w, h).to_image();
        return imageops::resize(&region, tgt_w, tgt_h, FilterType::Lanczos3);
    }

    let resized = if plan.resized == source {
        img.clone()
    } else {
        imageops::resize(img, plan.resized.0, plan.resized.1, FilterType::Lanczos3)
    };
    let (x, y) = plan.crop_origin;
    resized.view(x, y, tgt_w, tgt_h).to_image()
}

/// Composite an RGBA image over an opaque `background` using its own alpha.
///
/// A fully transparent pixel becomes exactly `background`; a fully opaque
/// pixel keeps its color.
pub fn flatten_alpha(img: &RgbaImage, background: Rgb) -> RgbImage {
    let bg = background.0;
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |src: u8, bg: u8| ((src as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r, bg[0]), blend(g, bg[1]), blend(b, bg[2])])
    })
}

/// Reduce any buffer to opaque RGB.
///
/// Alpha is flattened onto `background`; grayscale is replicated across
/// channels; RGB passes through.
pub fn to_opaque_rgb(buffer: PixelBuffer, background: Rgb) -> RgbImage {
    match buffer {
        PixelBuffer::Rgb(img) => img,
        PixelBuffer::Rgba(img) => flatten_alpha(&img, background),
        PixelBuffer::Gray(img) => RgbImage::from_fn(img.width(), img.height(), |x, y| {
            let [l] = img.get_pixel(x, y).0;
            image::Rgb([l, l, l])
        }),
    }
}

/// Full normalization on pixels: cover-fit to `target`, then flatten to RGB.
pub fn fit_and_flatten(buffer: PixelBuffer, target: (u32, u32), background: Rgb) -> Result<RgbImage> {
    let fitted = fit_crop(buffer, target)?;
    Ok(to_opaque_rgb(fitted, background))
}
