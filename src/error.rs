//! Error types for compositing pipeline operations

use thiserror::Error;

/// Result type alias for compositing pipeline operations
pub type Result<T> = std::result::Result<T, CompositeError>;

/// Error types for every stage of the compositing pipeline
#[derive(Error, Debug)]
pub enum CompositeError {
    /// An operation needed an input image but none has been loaded
    #[error("No input image loaded: {0}")]
    InputMissing(String),

    /// Background replacement was requested before a background was chosen
    #[error("No background image selected: {0}")]
    BackgroundMissing(String),

    /// The segmentation model could not process the input
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// Image dimensions violate a compositing precondition
    #[error("Invalid dimensions: {0}")]
    Dimension(String),

    /// Pixel data cannot be interpreted in the required format
    #[error("Unsupported pixel format: {0}")]
    Format(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),
}

impl CompositeError {
    /// Create a new missing-input error
    pub fn input_missing<S: Into<String>>(operation: S) -> Self {
        Self::InputMissing(operation.into())
    }

    /// Create a new missing-background error
    pub fn background_missing<S: Into<String>>(operation: S) -> Self {
        Self::BackgroundMissing(operation.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new dimension error
    pub fn dimension<S: Into<String>>(msg: S) -> Self {
        Self::Dimension(msg.into())
    }

    /// Create a new format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation, path_display, error, suggestion_text
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether this error means the session has nothing to operate on yet
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::InputMissing(_) | Self::BackgroundMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = CompositeError::input_missing("remove background");
        assert!(matches!(err, CompositeError::InputMissing(_)));
        assert!(err.is_missing_input());

        let err = CompositeError::dimension("foreground has zero area");
        assert!(matches!(err, CompositeError::Dimension(_)));
        assert!(!err.is_missing_input());
    }

    #[test]
    fn test_error_display() {
        let err = CompositeError::segmentation("model rejected input");
        assert_eq!(err.to_string(), "Segmentation failed: model rejected input");

        let err = CompositeError::background_missing("replace background");
        assert_eq!(
            err.to_string(),
            "No background image selected: replace background"
        );
    }

    #[test]
    fn test_contextual_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = CompositeError::file_io_error("write output", Path::new("/tmp/out.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write output"));
        assert!(error_string.contains("/tmp/out.png"));

        let err = CompositeError::model_error_with_context(
            "load",
            Path::new("/models/u2net.onnx"),
            "file not found",
            &["check the model path"],
        );
        let error_string = err.to_string();
        assert!(error_string.contains("/models/u2net.onnx"));
        assert!(error_string.contains("Suggestions: check the model path"));

        let err = CompositeError::config_value_error("overlay alpha", 300, "0-255", Some(100));
        let error_string = err.to_string();
        assert!(error_string.contains("overlay alpha"));
        assert!(error_string.contains("0-255"));
        assert!(error_string.contains("Recommended: 100"));
    }
}
