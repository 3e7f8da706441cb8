//! Image preprocessing for segmentation model inference

use crate::{
    error::{CompositeError, Result},
    models::{PreprocessingConfig, ResizeMode},
    types::RasterImage,
};
use image::{imageops, imageops::FilterType, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Region of the model input occupied by image content (x, y, width, height)
///
/// Equal to the full target size for stretched input; smaller along one axis
/// when letterboxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Model-ready tensor plus where the image landed inside it
#[derive(Debug, Clone)]
pub struct PreprocessedInput {
    /// NCHW tensor, batch size 1
    pub tensor: Array4<f32>,
    pub content: ContentRect,
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Fit `image` into the model's input and build a normalized NCHW tensor
    ///
    /// Pixel values are divided by the largest channel value present in the
    /// resized image before the mean/std normalization.
    ///
    /// # Errors
    /// - `CompositeError::Dimension` if the image has zero area
    /// - `CompositeError::InvalidConfig` if the target size is zero
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // Casting is acceptable for image processing math - precision loss is expected
    pub fn preprocess(image: &RasterImage, config: &PreprocessingConfig) -> Result<PreprocessedInput> {
        if image.is_empty() {
            return Err(CompositeError::dimension(
                "cannot segment an image with zero area",
            ));
        }
        let [target_width, target_height] = config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(CompositeError::invalid_config(
                "model target size must be non-zero",
            ));
        }

        let rgb = image.to_rgb_image()?;
        let (canvas, content) = match config.resize_mode {
            ResizeMode::Stretch => {
                let resized =
                    imageops::resize(&rgb, target_width, target_height, FilterType::Lanczos3);
                let content = ContentRect {
                    x: 0,
                    y: 0,
                    width: target_width,
                    height: target_height,
                };
                (resized, content)
            },
            ResizeMode::Letterbox => Self::letterbox(&rgb, target_width, target_height),
        };

        Ok(PreprocessedInput {
            tensor: Self::canvas_to_tensor(&canvas, config),
            content,
        })
    }

    /// Aspect-preserving resize centered on a white canvas
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn letterbox(rgb: &RgbImage, target_width: u32, target_height: u32) -> (RgbImage, ContentRect) {
        let (width, height) = rgb.dimensions();
        let scale = (target_width as f32 / width as f32).min(target_height as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, target_width);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, target_height);

        let resized = imageops::resize(rgb, new_width, new_height, FilterType::Triangle);
        let mut canvas = ImageBuffer::from_pixel(target_width, target_height, image::Rgb([255, 255, 255]));

        let offset_x = (target_width - new_width) / 2;
        let offset_y = (target_height - new_height) / 2;
        imageops::replace(&mut canvas, &resized, i64::from(offset_x), i64::from(offset_y));

        let content = ContentRect {
            x: offset_x,
            y: offset_y,
            width: new_width,
            height: new_height,
        };
        (canvas, content)
    }

    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let max_value = f32::from(canvas.as_raw().iter().copied().max().unwrap_or(0)).max(1e-6);

        for (x, y, pixel) in canvas.enumerate_pixels() {
            for c in 0..3 {
                let scaled = f32::from(pixel[c]) / max_value;
                tensor[[0, c, y as usize, x as usize]] =
                    (scaled - config.normalization_mean[c]) / config.normalization_std[c];
            }
        }

        tensor
    }
}
