//! Alpha compositing of a segmented foreground over a replacement background

use crate::{
    config::ResampleFilter,
    error::{CompositeError, Result},
    types::RasterImage,
};
use image::{imageops, Rgba, RgbaImage};
use log::debug;
use tracing::{instrument, span, Level};

/// Backdrop alpha used under the foreground when none is configured
pub const DEFAULT_OVERLAY_ALPHA: u8 = 100;

/// Composites foregrounds over backgrounds with the "over" operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    filter: ResampleFilter,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(ResampleFilter::default())
    }
}

impl Compositor {
    /// Create a compositor that resamples backgrounds with `filter`
    #[must_use]
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }

    #[must_use]
    pub fn filter(&self) -> ResampleFilter {
        self.filter
    }

    /// Blend `foreground` over `background`
    ///
    /// The background is stretched to the foreground's size. The foreground is
    /// first pasted, through its own alpha, onto a black backdrop whose alpha is
    /// `overlay_alpha`; that layer is then composited over the background. The
    /// result always has the foreground's dimensions.
    ///
    /// # Errors
    /// - `CompositeError::Dimension` if either image has zero area
    /// - `CompositeError::Format` if either image cannot be converted to RGBA
    #[instrument(
        skip(self, foreground, background),
        fields(
            foreground = %format!("{}x{}", foreground.width(), foreground.height()),
            background = %format!("{}x{}", background.width(), background.height())
        )
    )]
    pub fn composite(
        &self,
        foreground: &RasterImage,
        background: &RasterImage,
        overlay_alpha: u8,
    ) -> Result<RasterImage> {
        if foreground.is_empty() {
            return Err(CompositeError::dimension(format!(
                "foreground has zero area ({}x{})",
                foreground.width(),
                foreground.height()
            )));
        }
        if background.is_empty() {
            return Err(CompositeError::dimension(format!(
                "background has zero area ({}x{}) and cannot be resized",
                background.width(),
                background.height()
            )));
        }

        let (width, height) = foreground.dimensions();
        let background = {
            let _span = span!(Level::DEBUG, "resize_background", width = width, height = height).entered();
            self.fit_background(background, width, height)?
        };
        let foreground = foreground.to_rgba_image()?;

        let layer = Self::overlay_layer(&foreground, overlay_alpha);
        let blended = Self::alpha_composite(&background, &layer);

        debug!(
            "Composited {}x{} foreground over background (overlay alpha {})",
            width, height, overlay_alpha
        );
        Ok(RasterImage::from_rgba(blended))
    }

    /// Stretch the background to exactly `width` x `height`
    fn fit_background(&self, background: &RasterImage, width: u32, height: u32) -> Result<RgbaImage> {
        let rgba = background.to_rgba_image()?;
        if rgba.dimensions() == (width, height) {
            return Ok(rgba);
        }
        debug!(
            "Resizing background {}x{} -> {}x{} ({:?})",
            rgba.width(),
            rgba.height(),
            width,
            height,
            self.filter
        );
        Ok(imageops::resize(&rgba, width, height, self.filter.into()))
    }

    /// Paste `foreground` through its alpha onto a `(0, 0, 0, overlay_alpha)` backdrop
    ///
    /// Every channel, alpha included, is mixed by the foreground alpha.
    fn overlay_layer(foreground: &RgbaImage, overlay_alpha: u8) -> RgbaImage {
        let backdrop = [0, 0, 0, overlay_alpha];
        let mut layer = RgbaImage::new(foreground.width(), foreground.height());
        for (out, fg) in layer.pixels_mut().zip(foreground.pixels()) {
            let mask = u32::from(fg[3]);
            let mut px = [0u8; 4];
            for (c, value) in px.iter_mut().enumerate() {
                *value = div255(u32::from(fg[c]) * mask + u32::from(backdrop[c]) * (255 - mask));
            }
            *out = Rgba(px);
        }
        layer
    }

    /// Porter-Duff "over": `src` over `dst`, both with straight alpha
    fn alpha_composite(dst: &RgbaImage, src: &RgbaImage) -> RgbaImage {
        let mut out = RgbaImage::new(dst.width(), dst.height());
        for ((o, d), s) in out.pixels_mut().zip(dst.pixels()).zip(src.pixels()) {
            *o = over(*s, *d);
        }
        out
    }
}

/// Blend one straight-alpha pixel over another in premultiplied space
#[inline]
fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let dst_weight = da * (1.0 - sa);
    let out_a = sa + dst_weight;

    let mut px = [0u8; 4];
    for (c, value) in px.iter_mut().take(3).enumerate() {
        let premultiplied = f32::from(src[c]) * sa + f32::from(dst[c]) * dst_weight;
        *value = (premultiplied / out_a).round().clamp(0.0, 255.0) as u8;
    }
    px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(px)
}

/// `x / 255` rounded to nearest, exact for `x <= 255 * 255`
#[inline]
pub(crate) fn div255(x: u32) -> u8 {
    let tmp = x + 128;
    ((tmp + (tmp >> 8)) >> 8) as u8
}
