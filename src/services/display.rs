//! Scaled copies of the preview for on-screen display
//!
//! A projection is for viewing only. Nothing in the pipeline reads it back,
//! so display scaling never degrades the authoritative preview.

use crate::{
    error::{CompositeError, Result},
    types::RasterImage,
};
use image::imageops::FilterType;

pub struct DisplayProjector;

impl DisplayProjector {
    /// Largest size that fits in `max_width` x `max_height` with the same aspect ratio
    ///
    /// Images already inside the box keep their size; nothing is upscaled.
    /// A box with zero area fits nothing and yields `(0, 0)`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fit_within(dimensions: (u32, u32), max_width: u32, max_height: u32) -> (u32, u32) {
        let (width, height) = dimensions;
        if max_width == 0 || max_height == 0 {
            return (0, 0);
        }
        if width <= max_width && height <= max_height {
            return dimensions;
        }
        let scale = (f64::from(max_width) / f64::from(width)).min(f64::from(max_height) / f64::from(height));
        let fitted_width = ((f64::from(width) * scale).round() as u32).clamp(1, max_width);
        let fitted_height = ((f64::from(height) * scale).round() as u32).clamp(1, max_height);
        (fitted_width, fitted_height)
    }

    /// Downscale `image` to fit the display box
    ///
    /// # Errors
    /// Returns `CompositeError::Dimension` if the image or the box has zero area.
    pub fn project(image: &RasterImage, max_width: u32, max_height: u32) -> Result<RasterImage> {
        if max_width == 0 || max_height == 0 {
            return Err(CompositeError::dimension(format!(
                "display box {max_width}x{max_height} has zero area"
            )));
        }
        if image.is_empty() {
            return Err(CompositeError::dimension("nothing to display: image has zero area"));
        }

        let (width, height) = Self::fit_within(image.dimensions(), max_width, max_height);
        if (width, height) == image.dimensions() {
            return Ok(image.clone());
        }

        let projected = image
            .to_dynamic()?
            .resize_exact(width, height, FilterType::Triangle);
        log::debug!(
            "Projected {}x{} preview to {}x{} for display",
            image.width(),
            image.height(),
            width,
            height
        );
        Ok(if image.has_alpha() {
            RasterImage::from_rgba(projected.to_rgba8())
        } else {
            RasterImage::from_rgb(projected.to_rgb8())
        })
    }
}
