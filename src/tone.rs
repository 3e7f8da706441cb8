//! Saturation, brightness and contrast adjustment
//!
//! Each adjustment interpolates between the image and a "degenerate" version of
//! it (grayscale, black, or flat mean gray) by a factor, so 1.0 always leaves the
//! image untouched and factors above 1.0 extrapolate away from the degenerate
//! image. The alpha channel is never modified.

use crate::types::RasterImage;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::instrument;

/// Valid saturation factors (1.0 = unchanged, 0.0 = grayscale)
pub const SATURATION_RANGE: RangeInclusive<f32> = 0.0..=2.0;
/// Valid brightness offsets (0.0 = unchanged, -1.0 = black)
pub const BRIGHTNESS_RANGE: RangeInclusive<f32> = -1.0..=1.0;
/// Valid contrast factors (1.0 = unchanged, 0.0 = flat gray)
pub const CONTRAST_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Tone adjustment settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneParameters {
    pub saturation: f32,
    pub brightness: f32,
    pub contrast: f32,
}

impl Default for ToneParameters {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ToneParameters {
    /// Parameters that leave every image unchanged
    pub const IDENTITY: Self = Self {
        saturation: 1.0,
        brightness: 0.0,
        contrast: 1.0,
    };

    /// Create parameters, clamping each value into its valid range
    #[must_use]
    pub fn new(saturation: f32, brightness: f32, contrast: f32) -> Self {
        Self {
            saturation,
            brightness,
            contrast,
        }
        .clamped()
    }

    /// Copy with every value clamped into range; NaN falls back to the identity value
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            saturation: clamp_or(self.saturation, &SATURATION_RANGE, 1.0),
            brightness: clamp_or(self.brightness, &BRIGHTNESS_RANGE, 0.0),
            contrast: clamp_or(self.contrast, &CONTRAST_RANGE, 1.0),
        }
    }

    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_identity(&self) -> bool {
        self.clamped() == Self::IDENTITY
    }
}

fn clamp_or(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

/// Raw slider positions as exposed by a slider-based UI
///
/// Saturation runs 0..=200 and maps to `position / 100`; brightness and
/// contrast run 0..=100 and map to `position / 50 - 1` and `position / 50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderPositions {
    pub saturation: u32,
    pub brightness: u32,
    pub contrast: u32,
}

impl SliderPositions {
    pub const SATURATION_MAX: u32 = 200;
    pub const BRIGHTNESS_MAX: u32 = 100;
    pub const CONTRAST_MAX: u32 = 100;

    /// Slider positions for the identity parameters
    pub const NEUTRAL: Self = Self {
        saturation: 100,
        brightness: 50,
        contrast: 50,
    };

    #[must_use]
    pub fn new(saturation: u32, brightness: u32, contrast: u32) -> Self {
        Self {
            saturation,
            brightness,
            contrast,
        }
    }

    /// Map slider positions to tone parameters
    #[must_use]
    pub fn to_parameters(&self) -> ToneParameters {
        let saturation = self.saturation.min(Self::SATURATION_MAX) as f32 / 100.0;
        let brightness = self.brightness.min(Self::BRIGHTNESS_MAX) as f32 / 50.0 - 1.0;
        let contrast = self.contrast.min(Self::CONTRAST_MAX) as f32 / 50.0;
        ToneParameters::new(saturation, brightness, contrast)
    }

    /// Nearest slider positions for the given parameters
    #[must_use]
    pub fn from_parameters(params: &ToneParameters) -> Self {
        let params = params.clamped();
        Self {
            saturation: (params.saturation * 100.0).round() as u32,
            brightness: ((params.brightness + 1.0) * 50.0).round() as u32,
            contrast: (params.contrast * 50.0).round() as u32,
        }
    }
}

impl Default for SliderPositions {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Applies [`ToneParameters`] to images
pub struct ToneAdjuster;

impl ToneAdjuster {
    /// Apply saturation, then brightness, then contrast
    ///
    /// Each stage consumes the previous stage's output. Parameters are clamped
    /// before use; the input image is not modified.
    #[must_use]
    #[instrument(
        skip(image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    pub fn adjust(image: &RasterImage, params: &ToneParameters) -> RasterImage {
        let params = params.clamped();
        let channels = image.format().channels();
        let mut pixels = image.as_raw().to_vec();

        Self::apply_saturation(&mut pixels, channels, params.saturation);
        Self::apply_brightness(&mut pixels, channels, 1.0 + params.brightness);
        Self::apply_contrast(&mut pixels, channels, params.contrast);

        image.with_pixels(pixels)
    }

    fn apply_saturation(pixels: &mut [u8], channels: usize, factor: f32) {
        if is_unit(factor) {
            return;
        }
        for px in pixels.chunks_exact_mut(channels) {
            let gray = luma(px[0], px[1], px[2]);
            for value in px.iter_mut().take(3) {
                *value = interpolate(gray, *value, factor);
            }
        }
    }

    fn apply_brightness(pixels: &mut [u8], channels: usize, factor: f32) {
        if is_unit(factor) {
            return;
        }
        for px in pixels.chunks_exact_mut(channels) {
            for value in px.iter_mut().take(3) {
                *value = interpolate(0, *value, factor);
            }
        }
    }

    fn apply_contrast(pixels: &mut [u8], channels: usize, factor: f32) {
        if is_unit(factor) {
            return;
        }
        let mean = mean_luma(pixels, channels);
        for px in pixels.chunks_exact_mut(channels) {
            for value in px.iter_mut().take(3) {
                *value = interpolate(mean, *value, factor);
            }
        }
    }
}

#[allow(clippy::float_cmp)]
fn is_unit(factor: f32) -> bool {
    factor == 1.0
}

/// ITU-R 601-2 luma in 16-bit fixed point
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b) + 0x8000) >> 16) as u8
}

/// `degenerate + factor * (value - degenerate)`, clipped and truncated
#[inline]
fn interpolate(degenerate: u8, value: u8, factor: f32) -> u8 {
    let base = f32::from(degenerate);
    (base + factor * (f32::from(value) - base)).clamp(0.0, 255.0) as u8
}

fn mean_luma(pixels: &[u8], channels: usize) -> u8 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for px in pixels.chunks_exact(channels) {
        sum += u64::from(luma(px[0], px[1], px[2]));
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    fn gradient(width: u32, height: u32, format: PixelFormat) -> RasterImage {
        let channels = format.channels();
        let mut pixels = Vec::with_capacity((width * height) as usize * channels);
        for y in 0..height {
            for x in 0..width {
                let px = [
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    ((x + y) % 256) as u8,
                    (255 - (x % 256)) as u8,
                ];
                pixels.extend_from_slice(&px[..channels]);
            }
        }
        RasterImage::from_raw(width, height, format, pixels).unwrap()
    }

    #[test]
    fn test_identity_is_pixel_exact() {
        for format in [PixelFormat::Rgb, PixelFormat::Rgba] {
            let image = gradient(64, 48, format);
            let adjusted = ToneAdjuster::adjust(&image, &ToneParameters::default());
            assert_eq!(adjusted, image);
        }
    }

    #[test]
    fn test_zero_saturation_is_grayscale() {
        let image = gradient(400, 300, PixelFormat::Rgb);
        let adjusted = ToneAdjuster::adjust(&image, &ToneParameters::new(0.0, 0.0, 1.0));

        for px in adjusted.as_raw().chunks_exact(3) {
            assert!(px[0].abs_diff(px[1]) <= 1 && px[1].abs_diff(px[2]) <= 1);
        }
        assert_eq!(adjusted.dimensions(), (400, 300));
    }

    #[test]
    fn test_brightness_extremes() {
        let image = RasterImage::filled(4, 4, PixelFormat::Rgba, [100, 150, 200, 77]);

        let dark = ToneAdjuster::adjust(&image, &ToneParameters::new(1.0, -1.0, 1.0));
        assert_eq!(dark.pixel(0, 0), Some([0, 0, 0, 77]));

        let bright = ToneAdjuster::adjust(&image, &ToneParameters::new(1.0, 1.0, 1.0));
        assert_eq!(bright.pixel(3, 3), Some([200, 255, 255, 77]));
    }

    #[test]
    fn test_zero_contrast_is_flat_mean_gray() {
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&[0, 0, 0]);
        pixels.extend_from_slice(&[255, 255, 255]);
        let image = RasterImage::from_raw(2, 1, PixelFormat::Rgb, pixels).unwrap();

        let flat = ToneAdjuster::adjust(&image, &ToneParameters::new(1.0, 0.0, 0.0));
        assert_eq!(flat.pixel(0, 0), Some([128, 128, 128, 255]));
        assert_eq!(flat.pixel(1, 0), Some([128, 128, 128, 255]));
    }

    #[test]
    fn test_alpha_channel_untouched() {
        let image = gradient(32, 32, PixelFormat::Rgba);
        let adjusted = ToneAdjuster::adjust(&image, &ToneParameters::new(0.3, 0.4, 1.7));
        for (before, after) in image.as_raw().chunks_exact(4).zip(adjusted.as_raw().chunks_exact(4)) {
            assert_eq!(before[3], after[3]);
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let image = gradient(16, 16, PixelFormat::Rgb);
        let copy = image.clone();
        let _ = ToneAdjuster::adjust(&image, &ToneParameters::new(2.0, -0.5, 0.2));
        assert_eq!(image, copy);
    }

    #[test]
    fn test_repeated_calls_differ_from_combined_call() {
        let image = RasterImage::filled(2, 2, PixelFormat::Rgb, [60, 60, 60, 255]);
        let half = ToneParameters::new(1.0, 0.5, 1.0);
        let twice = ToneAdjuster::adjust(&ToneAdjuster::adjust(&image, &half), &half);
        let once = ToneAdjuster::adjust(&image, &ToneParameters::new(1.0, 1.0, 1.0));

        assert_eq!(twice.pixel(0, 0), Some([135, 135, 135, 255]));
        assert_eq!(once.pixel(0, 0), Some([120, 120, 120, 255]));
    }

    #[test]
    fn test_out_of_range_parameters_are_clamped() {
        let params = ToneParameters::new(5.0, -3.0, f32::NAN);
        assert!((params.saturation - 2.0).abs() < f32::EPSILON);
        assert!((params.brightness + 1.0).abs() < f32::EPSILON);
        assert!((params.contrast - 1.0).abs() < f32::EPSILON);

        let raw = ToneParameters {
            saturation: -1.0,
            brightness: 0.0,
            contrast: 9.0,
        };
        let image = gradient(8, 8, PixelFormat::Rgb);
        assert_eq!(
            ToneAdjuster::adjust(&image, &raw),
            ToneAdjuster::adjust(&image, &raw.clamped())
        );
    }

    #[test]
    fn test_empty_image() {
        let empty = RasterImage::from_raw(0, 0, PixelFormat::Rgb, Vec::new()).unwrap();
        let adjusted = ToneAdjuster::adjust(&empty, &ToneParameters::new(0.0, 0.5, 0.0));
        assert!(adjusted.is_empty());
    }

    #[test]
    fn test_slider_mapping() {
        let params = SliderPositions::NEUTRAL.to_parameters();
        assert!(params.is_identity());

        let params = SliderPositions::new(0, 0, 100).to_parameters();
        assert!((params.saturation - 0.0).abs() < f32::EPSILON);
        assert!((params.brightness + 1.0).abs() < f32::EPSILON);
        assert!((params.contrast - 2.0).abs() < f32::EPSILON);

        // Out-of-range positions saturate at the slider maximum
        let params = SliderPositions::new(999, 999, 999).to_parameters();
        assert!((params.saturation - 2.0).abs() < f32::EPSILON);
        assert!((params.brightness - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_slider_round_trip() {
        let positions = SliderPositions::new(130, 20, 75);
        let params = positions.to_parameters();
        assert_eq!(SliderPositions::from_parameters(&params), positions);
    }
}
