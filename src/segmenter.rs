//! Background segmentation: image in, same-size RGBA foreground out
//!
//! [`Segmenter`] is the seam the session depends on. [`ModelSegmenter`] is the
//! shipped implementation, running an ONNX background-removal model through an
//! [`InferenceBackend`] chosen by a [`BackendFactory`].

use crate::{
    config::{BackendType, SessionConfig},
    error::{CompositeError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    types::{RasterImage, SegmentationMask},
    utils::{ContentRect, ImagePreprocessor},
};
use image::{imageops, imageops::FilterType, GrayImage};
use instant::Instant;
use log::{debug, info};
use ndarray::Array4;
use tracing::{instrument, span, Level};

/// Separates foreground from background
pub trait Segmenter {
    /// Return `image` as RGBA with background pixels fully transparent
    ///
    /// The result has the same width and height as `image`.
    ///
    /// # Errors
    /// Returns `CompositeError::Segmentation` when the model cannot process the input.
    fn segment(&mut self, image: &RasterImage) -> Result<RasterImage>;
}

/// Factory trait for creating inference backends
pub trait BackendFactory {
    /// Create an uninitialized backend of the given type
    ///
    /// # Errors
    /// Returns `CompositeError::InvalidConfig` if the backend was not compiled in.
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Creates the backends enabled by cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[allow(unused_variables)]
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(
                crate::backends::TractBackend::with_model_manager(model_manager),
            )),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(
                crate::backends::OnnxBackend::with_model_manager(model_manager),
            )),
            #[allow(unreachable_patterns)]
            other => Err(CompositeError::invalid_config(format!(
                "{other} backend not compiled in; rebuild with --features {other}"
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        if cfg!(feature = "tract") {
            backends.push(BackendType::Tract);
        }
        if cfg!(feature = "onnx") {
            backends.push(BackendType::Onnx);
        }
        backends
    }
}

/// Segmenter backed by an ONNX background-removal model
///
/// The backend is created and the model loaded on the first call to
/// [`Segmenter::segment`].
pub struct ModelSegmenter {
    config: SessionConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
}

impl std::fmt::Debug for ModelSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSegmenter")
            .field("model", &self.config.model)
            .field("backend", &self.config.backend)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ModelSegmenter {
    /// Create a segmenter using the default backend factory
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a segmenter with a custom backend factory
    #[must_use]
    pub fn with_factory(config: SessionConfig, backend_factory: Box<dyn BackendFactory>) -> Self {
        Self {
            config,
            backend_factory,
            backend: None,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_initialized())
    }

    /// Load the model now instead of on first use
    ///
    /// # Errors
    /// Returns `CompositeError::Segmentation` if the model cannot be loaded.
    pub fn initialize(&mut self) -> Result<()> {
        self.backend_mut().map(|_| ()).map_err(into_segmentation_error)
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn InferenceBackend>> {
        if self.backend.is_none() {
            info!(
                "Loading segmentation model {} with {} backend",
                self.config.model.display_name(),
                self.config.backend
            );
            let manager = ModelManager::from_spec(&self.config.model)?;
            let mut backend = self
                .backend_factory
                .create_backend(self.config.backend, manager)?;
            if let Some(load_time) = backend.initialize(&self.config)? {
                debug!("Model loaded in {}ms", load_time.as_millis());
            }
            self.backend = Some(backend);
        }
        self.backend
            .as_mut()
            .ok_or_else(|| CompositeError::model("backend missing after initialization"))
    }

    fn run(&mut self, image: &RasterImage) -> Result<RasterImage> {
        let start = Instant::now();
        let backend = self.backend_mut()?;
        let preprocessing = backend.preprocessing_config()?;

        let input = {
            let _span = span!(Level::DEBUG, "preprocess").entered();
            ImagePreprocessor::preprocess(image, &preprocessing)?
        };

        let output = {
            let _span = span!(Level::DEBUG, "inference").entered();
            backend.infer(&input.tensor)?
        };

        let mask = {
            let _span = span!(Level::DEBUG, "mask").entered();
            tensor_to_mask(&output, input.content, image.dimensions())?
        };
        debug!(
            "Segmented {}x{} image in {}ms ({:.1}% foreground)",
            image.width(),
            image.height(),
            start.elapsed().as_millis(),
            mask.foreground_ratio() * 100.0
        );

        mask.apply_to(image)
    }
}

impl Segmenter for ModelSegmenter {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn segment(&mut self, image: &RasterImage) -> Result<RasterImage> {
        self.run(image).map_err(into_segmentation_error)
    }
}

/// Convert a model output tensor into a mask at the original image size
///
/// The first channel is min-max normalized, cropped to the region that held
/// image content, and resized with Lanczos filtering.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn tensor_to_mask(
    tensor: &Array4<f32>,
    content: ContentRect,
    original_dimensions: (u32, u32),
) -> Result<SegmentationMask> {
    let (batch, channels, height, width) = tensor.dim();
    if batch == 0 || channels == 0 || height == 0 || width == 0 {
        return Err(CompositeError::inference(format!(
            "empty output tensor {:?}",
            tensor.shape()
        )));
    }

    let plane = tensor.slice(ndarray::s![0, 0, .., ..]);
    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    // A flat prediction carries no contrast to stretch; read it as a probability
    let normalize = |v: f32| -> f32 {
        if range > f32::EPSILON {
            (v - min) / range
        } else {
            v.clamp(0.0, 1.0)
        }
    };

    let gray = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let v = normalize(plane[[y as usize, x as usize]]);
        image::Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
    });

    // Content rect is in model input coordinates; the output may be a different size
    let scale_x = width as f32 / content_extent(content.x, content.width) as f32;
    let scale_y = height as f32 / content_extent(content.y, content.height) as f32;
    let crop_x = (content.x as f32 * scale_x).round() as u32;
    let crop_y = (content.y as f32 * scale_y).round() as u32;
    let crop_w = ((content.width as f32 * scale_x).round() as u32)
        .clamp(1, width as u32 - crop_x.min(width as u32 - 1));
    let crop_h = ((content.height as f32 * scale_y).round() as u32)
        .clamp(1, height as u32 - crop_y.min(height as u32 - 1));

    let cropped = imageops::crop_imm(&gray, crop_x, crop_y, crop_w, crop_h).to_image();
    let (out_w, out_h) = original_dimensions;
    let resized = if cropped.dimensions() == (out_w, out_h) {
        cropped
    } else {
        imageops::resize(&cropped, out_w, out_h, FilterType::Lanczos3)
    };

    Ok(SegmentationMask::from_gray(resized))
}

/// Full model input extent along one axis, assuming centered content
fn content_extent(offset: u32, size: u32) -> u32 {
    (offset * 2 + size).max(1)
}

fn into_segmentation_error(err: CompositeError) -> CompositeError {
    match err {
        CompositeError::Segmentation(_) => err,
        other => CompositeError::segmentation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockBackend, MockBackendFactory, MockMask};
    use crate::models::{ModelKind, ModelSpec};
    use crate::types::PixelFormat;
    use ndarray::Array4;
    use std::io::Write;

    fn full_rect(size: u32) -> ContentRect {
        ContentRect {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }

    fn config_with_model_file(dir: &tempfile::TempDir) -> SessionConfig {
        let path = dir.path().join("u2netp.onnx");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"mock")
            .unwrap();
        SessionConfig::builder()
            .model(ModelSpec::new(path, ModelKind::U2NetP))
            .build()
            .unwrap()
    }

    #[test]
    fn test_tensor_to_mask_normalizes() {
        let mut tensor = Array4::<f32>::from_elem((1, 1, 4, 4), 0.2);
        tensor[[0, 0, 0, 0]] = 0.6;
        let mask = tensor_to_mask(&tensor, full_rect(4), (4, 4)).unwrap();
        assert_eq!(mask.dimensions, (4, 4));
        assert_eq!(mask.data[0], 255);
        assert_eq!(mask.data[1], 0);
    }

    #[test]
    fn test_tensor_to_mask_flat_prediction() {
        let tensor = Array4::<f32>::from_elem((1, 1, 8, 8), 1.0);
        let mask = tensor_to_mask(&tensor, full_rect(8), (3, 5)).unwrap();
        assert_eq!(mask.dimensions, (3, 5));
        assert!(mask.data.iter().all(|&v| v >= 250));
    }

    #[test]
    fn test_tensor_to_mask_crops_letterbox() {
        // Top and bottom quarter are padding; content rows are foreground
        let mut tensor = Array4::<f32>::zeros((1, 1, 8, 8));
        for y in 2..6 {
            for x in 0..8 {
                tensor[[0, 0, y, x]] = 1.0;
            }
        }
        let content = ContentRect {
            x: 0,
            y: 2,
            width: 8,
            height: 4,
        };
        let mask = tensor_to_mask(&tensor, content, (8, 4)).unwrap();
        assert!(mask.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_tensor_to_mask_rejects_empty() {
        let tensor = Array4::<f32>::zeros((1, 0, 4, 4));
        assert!(tensor_to_mask(&tensor, full_rect(4), (4, 4)).is_err());
    }

    #[test]
    fn test_default_factory_backends() {
        let factory = DefaultBackendFactory;
        let available = factory.available_backends();
        assert_eq!(available.contains(&BackendType::Tract), cfg!(feature = "tract"));
        assert_eq!(available.contains(&BackendType::Onnx), cfg!(feature = "onnx"));
    }

    #[test]
    fn test_model_segmenter_with_mock_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_model_file(&dir);
        let mut segmenter = ModelSegmenter::with_factory(
            config,
            Box::new(MockBackendFactory::new(MockMask::LeftHalf)),
        );
        assert!(!segmenter.is_initialized());

        let image = RasterImage::filled(40, 20, PixelFormat::Rgb, [90, 120, 150, 255]);
        let out = segmenter.segment(&image).unwrap();

        assert!(segmenter.is_initialized());
        assert_eq!(out.dimensions(), (40, 20));
        assert!(out.has_alpha());
        let kept = out.pixel(2, 10).unwrap();
        assert!(kept[3] >= 250);
        for (got, color) in kept[..3].iter().zip([90u32, 120, 150]) {
            let weighted = (color * u32::from(kept[3]) + 127) / 255;
            assert!(u32::from(*got).abs_diff(weighted) <= 1, "{kept:?}");
        }
        assert_eq!(out.pixel(37, 10), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_missing_model_is_segmentation_error() {
        let config = SessionConfig::builder()
            .model(ModelSpec::new("/nonexistent/u2net.onnx", ModelKind::U2Net))
            .build()
            .unwrap();
        let mut segmenter = ModelSegmenter::with_factory(
            config,
            Box::new(MockBackendFactory::new(MockMask::Full)),
        );
        let image = RasterImage::filled(4, 4, PixelFormat::Rgb, [1, 2, 3, 255]);
        assert!(matches!(
            segmenter.segment(&image),
            Err(CompositeError::Segmentation(_))
        ));
        assert!(matches!(
            segmenter.initialize(),
            Err(CompositeError::Segmentation(_))
        ));
    }

    #[test]
    fn test_inference_failure_is_segmentation_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_model_file(&dir);
        let factory = MockBackendFactory::with_backend(MockBackend::failing_inference);
        let mut segmenter = ModelSegmenter::with_factory(config, Box::new(factory));

        let image = RasterImage::filled(4, 4, PixelFormat::Rgb, [1, 2, 3, 255]);
        let err = segmenter.segment(&image).unwrap_err();
        assert!(matches!(err, CompositeError::Segmentation(_)));
        assert!(err.to_string().contains("mock inference failure"));
    }
}
