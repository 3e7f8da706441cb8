//! Tract backend for segmentation models
//!
//! Pure Rust ONNX inference with no native dependencies. This is the default
//! backend.

use crate::config::SessionConfig;
use crate::error::{CompositeError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the optimized runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend running the segmentation model on the CPU
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
        }
    }

    fn manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| CompositeError::model("Tract backend has no model manager"))
    }

    /// Load, type and optimize the ONNX graph
    fn load_model(&mut self, config: &SessionConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        if self.model_manager.is_none() {
            self.model_manager = Some(ModelManager::from_spec(&config.model)?);
        }
        let manager = self.manager()?;
        let model_data = manager.load_model()?;
        let model_info = manager.get_info()?;
        let (_, _, height, width) = model_info.input_shape;

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!(
            "Initializing Tract backend with {} ({size_mb:.2} MB)",
            model_info.name
        );

        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, height, width]).into()))
            .map_err(|e| CompositeError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| CompositeError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                CompositeError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &SessionConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CompositeError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_shape::<f32>(input.shape(), &data)
            .map_err(|e| CompositeError::inference(format!("Failed to build input tensor: {e}")))?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CompositeError::inference(format!("Tract inference failed: {e}")))?;

        // U²-Net style models emit several side outputs; the first is the fused mask
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CompositeError::inference("No output tensor found"))?;

        let shape = output.shape().to_vec();
        let values = output
            .as_slice::<f32>()
            .map_err(|e| CompositeError::inference(format!("Failed to read output tensor: {e}")))?;

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
        let output_array = Array4::from_shape_vec(dims, values.to_vec()).map_err(|e| {
            CompositeError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
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
        self.model.is_some()
    }
}
