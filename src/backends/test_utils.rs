//! Mock inference backends for testing without model files or runtimes

use crate::{
    config::{BackendType, SessionConfig},
    error::{CompositeError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, ModelKind, ModelManager, PreprocessingConfig},
    segmenter::BackendFactory,
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Shape of the mask the mock backend predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMask {
    /// Everything is foreground
    Full,
    /// Left half foreground, right half background
    LeftHalf,
}

/// Mock backend returning a fixed mask pattern at the model's output size
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    mask: MockMask,
    preprocessing_config: PreprocessingConfig,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new(mask: MockMask) -> Self {
        Self {
            initialized: false,
            mask,
            preprocessing_config: ModelKind::U2NetP.preprocessing(),
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_inference: false,
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn failing_inference() -> Self {
        let mut backend = Self::new(MockMask::Full);
        backend.should_fail_inference = true;
        backend
    }

    /// Get the call history for verification in tests
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &SessionConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(CompositeError::inference("mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(CompositeError::inference("mock inference failure"));
        }

        let (batch, _, height, width) = input.dim();
        Ok(Array4::from_shape_fn((batch, 1, height, width), |(_, _, _, x)| {
            match self.mask {
                MockMask::Full => 1.0,
                MockMask::LeftHalf if x < width / 2 => 1.0,
                MockMask::LeftHalf => 0.0,
            }
        }))
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn model_info(&self) -> Result<ModelInfo> {
        let [width, height] = self.preprocessing_config.target_size;
        Ok(ModelInfo {
            name: "mock".to_string(),
            kind: ModelKind::U2NetP,
            size_bytes: 0,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out mock backends regardless of the requested type
pub struct MockBackendFactory {
    make: Box<dyn Fn() -> MockBackend>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new(mask: MockMask) -> Self {
        Self::with_backend(move || MockBackend::new(mask))
    }

    pub fn with_backend<F: Fn() -> MockBackend + 'static>(make: F) -> Self {
        Self {
            make: Box::new(make),
        }
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new((self.make)()))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract, BackendType::Onnx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockBackend::new(MockMask::LeftHalf);
        let input = Array4::<f32>::zeros((1, 3, 4, 6));
        assert!(backend.infer(&input).is_err());

        assert!(backend.initialize(&SessionConfig::default()).unwrap().is_some());
        assert!(backend.initialize(&SessionConfig::default()).unwrap().is_none());

        let output = backend.infer(&input).unwrap();
        assert_eq!(output.shape(), &[1, 1, 4, 6]);
        assert_eq!(output[[0, 0, 2, 0]], 1.0);
        assert_eq!(output[[0, 0, 2, 5]], 0.0);

        assert_eq!(
            backend.call_history(),
            vec!["infer", "initialize", "initialize", "infer"]
        );
    }
}
