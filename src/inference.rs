//! Inference backend abstraction

use crate::{
    config::SessionConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for segmentation model inference backends
pub trait InferenceBackend {
    /// Load the model and prepare the runtime
    ///
    /// Returns the model load time on first initialization and `None` when the
    /// backend was already initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Model graph rejected by the runtime
    fn initialize(&mut self, config: &SessionConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor, returning an NCHW mask tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Runtime failure or unexpected output shape
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Preprocessing expected by the loaded model
    ///
    /// # Errors
    /// Returns an error if the backend has not been initialized.
    fn preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Describe the loaded model
    ///
    /// # Errors
    /// Returns an error if the backend has not been initialized.
    fn model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}
