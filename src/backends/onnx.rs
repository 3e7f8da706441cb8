//! ONNX Runtime backend for segmentation models
//!
//! Runs on the CPU execution provider only.

use crate::config::SessionConfig;
use crate::error::{CompositeError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
}

impl OnnxBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ONNX backend with a specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
        }
    }

    fn manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| CompositeError::model("ONNX backend has no model manager"))
    }

    fn load_model(&mut self, config: &SessionConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        if self.model_manager.is_none() {
            self.model_manager = Some(ModelManager::from_spec(&config.model)?);
        }
        let manager = self.manager()?;
        let model_data = manager.load_model()?;
        let model_info = manager.get_info()?;

        let intra_threads = if config.threads > 0 {
            config.threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = Session::builder()
            .map_err(|e| CompositeError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CompositeError::model(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| CompositeError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                CompositeError::model(format!("Failed to create session from model data: {e}"))
            })?;

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!(
            "ONNX Runtime session ready: {} ({size_mb:.2} MB), {intra_threads} intra-op threads",
            model_info.name
        );

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "ONNX backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &SessionConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CompositeError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Running ONNX inference on {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            CompositeError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| CompositeError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional access: the first output is the fused mask
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| CompositeError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| CompositeError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                CompositeError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let shape = output_tensor.shape().to_vec();
        let values: Vec<f32> = output_tensor.iter().copied().collect();
        let dims = match shape.as_slice() {
            &[n, c, h, w] => (n, c, h, w),
            &[c, h, w] => (1, c, h, w),
            other => {
                return Err(CompositeError::inference(format!(
                    "Expected 3D or 4D output tensor, got {}D",
                    other.len()
                )))
            },
        };
        let output_array = Array4::from_shape_vec(dims, values).map_err(|e| {
            CompositeError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "ONNX inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output_array)
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.manager()?.get_preprocessing_config())
    }

    fn model_info(&self) -> Result<ModelInfo> {
        self.manager()?.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelKind, ModelSpec};

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        assert!(backend.model_info().is_err());
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = OnnxBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 4, 4));
        assert!(matches!(
            backend.infer(&input),
            Err(CompositeError::Inference(_))
        ));
    }

    #[test]
    fn test_initialize_missing_model() {
        let mut backend = OnnxBackend::new();
        let config = SessionConfig::builder()
            .model(ModelSpec::new("/nonexistent/u2net.onnx", ModelKind::U2Net))
            .build()
            .unwrap();
        assert!(backend.initialize(&config).is_err());
        assert!(!backend.is_initialized());
    }
}
