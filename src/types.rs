//! Core types shared by every pipeline stage

use crate::{
    compositor::div255,
    error::{CompositeError, Result},
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Channel layout of a [`RasterImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Three 8-bit channels, no transparency
    Rgb,
    /// Four 8-bit channels with straight (non-premultiplied) alpha
    Rgba,
}

impl PixelFormat {
    /// Number of 8-bit channels per pixel
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgb => write!(f, "RGB"),
            Self::Rgba => write!(f, "RGBA"),
        }
    }
}

/// An owned raster image
///
/// Once constructed the pixel buffer is never mutated; every transform in the
/// pipeline produces a new `RasterImage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Wrap a raw, row-major pixel buffer
    ///
    /// # Errors
    /// Returns `CompositeError::Format` when the buffer length does not match
    /// `width * height * channels`.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = expected_len(width, height, format).ok_or_else(|| {
            CompositeError::format(format!("{width}x{height} {format} buffer size overflows"))
        })?;
        if pixels.len() != expected {
            return Err(CompositeError::format(format!(
                "{width}x{height} {format} image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Create an image where every pixel has the same value
    ///
    /// The alpha component of `color` is ignored for `PixelFormat::Rgb`.
    #[must_use]
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: [u8; 4]) -> Self {
        let pixel = &color[..format.channels()];
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            format,
            pixels: pixel.repeat(count),
        }
    }

    /// Take ownership of an RGB buffer from the `image` crate
    #[must_use]
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb,
            pixels: image.into_raw(),
        }
    }

    /// Take ownership of an RGBA buffer from the `image` crate
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba,
            pixels: image.into_raw(),
        }
    }

    /// Convert a decoded image, keeping an alpha channel only if it had one
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_alpha() {
            Self::from_rgba(image.to_rgba8())
        } else {
            Self::from_rgb(image.to_rgb8())
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.format == PixelFormat::Rgba
    }

    /// True when the image has no pixels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Raw, row-major pixel bytes
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// New image with this image's size and format but different pixel bytes
    pub(crate) fn with_pixels(&self, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), self.pixels.len());
        Self {
            width: self.width,
            height: self.height,
            format: self.format,
            pixels,
        }
    }

    /// Pixel at `(x, y)` as RGBA; RGB images report alpha 255
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels();
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        let px = self.pixels.get(offset..offset + channels)?;
        match px {
            &[r, g, b] => Some([r, g, b, 255]),
            &[r, g, b, a] => Some([r, g, b, a]),
            _ => None,
        }
    }

    /// Copy into an `image` crate RGBA buffer, adding opaque alpha to RGB input
    ///
    /// # Errors
    /// Returns `CompositeError::Format` if the pixel buffer cannot be viewed as RGBA.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let data = match self.format {
            PixelFormat::Rgba => self.pixels.clone(),
            PixelFormat::Rgb => self
                .pixels
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
        };
        RgbaImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            CompositeError::format(format!(
                "cannot convert {}x{} {} image to RGBA",
                self.width, self.height, self.format
            ))
        })
    }

    /// Copy into an `image` crate RGB buffer, discarding alpha
    ///
    /// # Errors
    /// Returns `CompositeError::Format` if the pixel buffer cannot be viewed as RGB.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let data = match self.format {
            PixelFormat::Rgb => self.pixels.clone(),
            PixelFormat::Rgba => self
                .pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };
        RgbImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            CompositeError::format(format!(
                "cannot convert {}x{} {} image to RGB",
                self.width, self.height, self.format
            ))
        })
    }

    /// RGBA copy of this image
    ///
    /// # Errors
    /// Returns `CompositeError::Format` if the conversion fails.
    pub fn to_rgba(&self) -> Result<Self> {
        Ok(Self::from_rgba(self.to_rgba_image()?))
    }

    /// RGB copy of this image with alpha discarded
    ///
    /// # Errors
    /// Returns `CompositeError::Format` if the conversion fails.
    pub fn to_rgb(&self) -> Result<Self> {
        Ok(Self::from_rgb(self.to_rgb_image()?))
    }

    /// View as a `DynamicImage` for encoding or resampling
    ///
    /// # Errors
    /// Returns `CompositeError::Format` if the conversion fails.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        match self.format {
            PixelFormat::Rgb => Ok(DynamicImage::ImageRgb8(self.to_rgb_image()?)),
            PixelFormat::Rgba => Ok(DynamicImage::ImageRgba8(self.to_rgba_image()?)),
        }
    }
}

fn expected_len(width: u32, height: u32, format: PixelFormat) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(format.channels())
}

/// Single-channel foreground mask produced by model inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Mask values (0 = background, 255 = foreground), row-major
    pub data: Vec<u8>,
    /// Width and height of the mask
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Wrap a grayscale buffer
    #[must_use]
    pub fn from_gray(image: GrayImage) -> Self {
        let dimensions = image.dimensions();
        Self {
            data: image.into_raw(),
            dimensions,
        }
    }

    /// Fraction of pixels that are at least half opaque
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v >= 128).count();
        foreground as f32 / self.data.len() as f32
    }

    /// Use this mask as the alpha channel of `image`
    ///
    /// Color is weighted by the mask, so partially kept edge pixels darken
    /// toward transparent black and fully removed pixels become `(0, 0, 0, 0)`.
    ///
    /// # Errors
    /// Returns `CompositeError::Dimension` if the mask and image sizes differ.
    pub fn apply_to(&self, image: &RasterImage) -> Result<RasterImage> {
        if self.dimensions != image.dimensions() {
            return Err(CompositeError::dimension(format!(
                "mask is {}x{} but image is {}x{}",
                self.dimensions.0,
                self.dimensions.1,
                image.width(),
                image.height()
            )));
        }

        let rgba = image.to_rgba_image()?;
        let mut pixels = Vec::with_capacity(self.data.len() * 4);
        for (px, &alpha) in rgba.pixels().zip(self.data.iter()) {
            let weight = u32::from(alpha);
            pixels.extend_from_slice(&[
                div255(u32::from(px[0]) * weight),
                div255(u32::from(px[1]) * weight),
                div255(u32::from(px[2]) * weight),
                alpha,
            ]);
        }
        RasterImage::from_raw(image.width(), image.height(), PixelFormat::Rgba, pixels)
    }
}

/// Summary of one completed session operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Operation name (e.g. "adjust_tone", "replace_background")
    pub operation: String,
    /// Width of the produced preview
    pub width: u32,
    /// Height of the produced preview
    pub height: u32,
    /// Wall-clock duration of the operation
    pub elapsed_ms: u64,
    /// When the operation finished
    pub completed_at: DateTime<Utc>,
}

impl OperationReport {
    #[must_use]
    pub fn new(operation: &str, image: &RasterImage, elapsed_ms: u64) -> Self {
        Self {
            operation: operation.to_string(),
            width: image.width(),
            height: image.height(),
            elapsed_ms,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_validates_length() {
        let ok = RasterImage::from_raw(2, 2, PixelFormat::Rgb, vec![0; 12]);
        assert!(ok.is_ok());

        let err = RasterImage::from_raw(2, 2, PixelFormat::Rgba, vec![0; 12]).unwrap_err();
        assert!(matches!(err, CompositeError::Format(_)));
    }

    #[test]
    fn test_zero_area_is_representable() {
        let empty = RasterImage::from_raw(0, 10, PixelFormat::Rgba, Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.pixel(0, 0), None);
    }

    #[test]
    fn test_rgb_pixels_report_opaque_alpha() {
        let image = RasterImage::filled(3, 2, PixelFormat::Rgb, [10, 20, 30, 0]);
        assert_eq!(image.as_raw().len(), 18);
        assert_eq!(image.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn test_format_conversions() {
        let rgba = RasterImage::filled(4, 4, PixelFormat::Rgba, [1, 2, 3, 40]);
        let rgb = rgba.to_rgb().unwrap();
        assert_eq!(rgb.format(), PixelFormat::Rgb);
        assert_eq!(rgb.pixel(0, 0), Some([1, 2, 3, 255]));

        let back = rgb.to_rgba().unwrap();
        assert!(back.has_alpha());
        assert_eq!(back.pixel(3, 3), Some([1, 2, 3, 255]));
    }

    #[test]
    fn test_from_dynamic_keeps_alpha_only_when_present() {
        let rgb = DynamicImage::new_rgb8(5, 5);
        assert_eq!(RasterImage::from_dynamic(&rgb).format(), PixelFormat::Rgb);

        let rgba = DynamicImage::new_rgba8(5, 5);
        assert_eq!(RasterImage::from_dynamic(&rgba).format(), PixelFormat::Rgba);
    }

    #[test]
    fn test_mask_application() {
        let image = RasterImage::filled(2, 1, PixelFormat::Rgb, [200, 100, 50, 255]);
        let mask = SegmentationMask::new(vec![0, 180], (2, 1));
        let cutout = mask.apply_to(&image).unwrap();

        assert_eq!(cutout.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(cutout.pixel(1, 0), Some([141, 71, 35, 180]));
        assert!((mask.foreground_ratio() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let image = RasterImage::filled(2, 2, PixelFormat::Rgb, [0; 4]);
        let mask = SegmentationMask::new(vec![255; 3], (3, 1));
        assert!(matches!(
            mask.apply_to(&image),
            Err(CompositeError::Dimension(_))
        ));
    }
}
