//! Pure calculation functions for cover-fit geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Resized images larger than this take the source-space crop path instead.
pub const MAX_INTERMEDIATE_PIXELS: u64 = 100_000_000;

/// How a `(w, h)` source covers a `(tw, th)` box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPlan {
    /// `max(tw / w, th / h)`.
    pub scale: f64,
    /// Size after scaling, at least the target on each axis.
    pub resized: (u32, u32),
    /// Top-left corner of the centered crop inside the resized image.
    pub crop_origin: (u32, u32),
    /// Box being covered.
    pub target: (u32, u32),
}

impl FitPlan {
    /// True when the source already has the target size.
    pub fn is_identity(&self, source: (u32, u32)) -> bool {
        source == self.target && self.resized == self.target
    }

    pub fn intermediate_pixels(&self) -> u64 {
        self.resized.0 as u64 * self.resized.1 as u64
    }
}

/// Plan a cover-fit: scale up or down until the target is fully covered,
/// then center the crop window.
///
/// Both `source` and `target` must be non-zero on each axis.
///
/// # Examples
/// ```
/// # use avatar_pipeline::imaging::plan_fit;
/// // 4000x2000 into a 500x500 box: scale 0.25, 1000x500, crop at x=250
/// let plan = plan_fit((4000, 2000), (500, 500));
/// assert_eq!(plan.scale, 0.25);
/// assert_eq!(plan.resized, (1000, 500));
/// assert_eq!(plan.crop_origin, (250, 0));
/// ```
pub fn plan_fit(source: (u32, u32), target: (u32, u32)) -> FitPlan {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let scale = (tgt_w as f64 / src_w as f64).max(tgt_h as f64 / src_h as f64);

    // Rounding can land one pixel short of the box; never crop past the edge.
    let resized_w = ((src_w as f64 * scale).round() as u32).max(tgt_w);
    let resized_h = ((src_h as f64 * scale).round() as u32).max(tgt_h);

    FitPlan {
        scale,
        resized: (resized_w, resized_h),
        crop_origin: ((resized_w - tgt_w) / 2, (resized_h - tgt_h) / 2),
        target,
    }
}

/// Centered region of the source with the target's aspect ratio.
///
/// Returns `(x, y, width, height)` in source pixels. Cropping this region and
/// resizing it to `target` gives the same framing as [`plan_fit`] without
/// materializing the scaled intermediate.
pub fn source_crop(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    let (crop_w, crop_h) = if src_aspect > tgt_aspect {
        // Source is wider: keep full height
        let w = (src_h as f64 * tgt_aspect).round() as u32;
        (w.clamp(1, src_w), src_h)
    } else {
        // Source is taller: keep full width
        let h = (src_w as f64 / tgt_aspect).round() as u32;
        (src_w, h.clamp(1, src_h))
    };

    ((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // plan_fit tests
    // =========================================================================

    #[test]
    fn fit_wide_source_into_square() {
        let plan = plan_fit((4000, 2000), (500, 500));
        assert_eq!(plan.scale, 0.25);
        assert_eq!(plan.resized, (1000, 500));
        assert_eq!(plan.crop_origin, (250, 0));
    }

    #[test]
    fn fit_square_to_smaller_square() {
        let plan = plan_fit((500, 500), (150, 150));
        assert!((plan.scale - 0.3).abs() < 1e-12);
        assert_eq!(plan.resized, (150, 150));
        assert_eq!(plan.crop_origin, (0, 0));
    }

    #[test]
    fn fit_tall_source_into_square() {
        // 600x1200 → scale max(500/600, 500/1200) = 0.8333 → 500x1000
        let plan = plan_fit((600, 1200), (500, 500));
        assert_eq!(plan.resized, (500, 1000));
        assert_eq!(plan.crop_origin, (0, 250));
    }

    #[test]
    fn fit_upscales_small_source() {
        // 100x50 → scale max(5, 10) = 10 → 1000x500
        let plan = plan_fit((100, 50), (500, 500));
        assert_eq!(plan.scale, 10.0);
        assert_eq!(plan.resized, (1000, 500));
        assert_eq!(plan.crop_origin, (250, 0));
    }

    #[test]
    fn fit_exact_size_is_identity() {
        let plan = plan_fit((500, 500), (500, 500));
        assert_eq!(plan.scale, 1.0);
        assert!(plan.is_identity((500, 500)));
    }

    #[test]
    fn fit_odd_excess_rounds_origin_down() {
        // 501x500 → scale 1 → crop origin (0.5 → 0)
        let plan = plan_fit((501, 500), (500, 500));
        assert_eq!(plan.resized, (501, 500));
        assert_eq!(plan.crop_origin, (0, 0));
        assert!(!plan.is_identity((501, 500)));
    }

    #[test]
    fn fit_one_pixel_excess_is_not_identity() {
        for src in [(501, 500), (500, 501)] {
            let plan = plan_fit(src, (500, 500));
            assert_eq!(plan.scale, 1.0);
            assert_eq!(plan.resized, src);
            assert!(!plan.is_identity(src), "{src:?}");
        }
    }

    #[test]
    fn fit_never_smaller_than_target() {
        for src in [(3, 7), (7, 3), (999, 1), (1, 999), (333, 334)] {
            let plan = plan_fit(src, (150, 100));
            assert!(plan.resized.0 >= 150, "{src:?} → {:?}", plan.resized);
            assert!(plan.resized.1 >= 100, "{src:?} → {:?}", plan.resized);
        }
    }

    #[test]
    fn fit_reports_intermediate_pixels() {
        let plan = plan_fit((1, 1000), (500, 500));
        assert_eq!(plan.resized, (500, 500_000));
        assert!(plan.intermediate_pixels() > MAX_INTERMEDIATE_PIXELS);
    }

    // =========================================================================
    // source_crop tests
    // =========================================================================

    #[test]
    fn source_crop_wide_source() {
        assert_eq!(source_crop((4000, 2000), (500, 500)), (1000, 0, 2000, 2000));
    }

    #[test]
    fn source_crop_tall_source() {
        assert_eq!(source_crop((1, 1000), (500, 500)), (0, 499, 1, 1));
    }

    #[test]
    fn source_crop_same_aspect_keeps_everything() {
        assert_eq!(source_crop((800, 600), (400, 300)), (0, 0, 800, 600));
    }
}
