//! Configuration types for compositing sessions

use crate::{
    compositor::DEFAULT_OVERLAY_ALPHA,
    error::{CompositeError, Result},
    models::ModelSpec,
};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inference backend used to run the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Pure Rust inference via Tract
    Tract,
    /// ONNX Runtime (CPU execution provider)
    Onnx,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "tract") || !cfg!(feature = "onnx") {
            Self::Tract
        } else {
            Self::Onnx
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

/// Resampling filter used when stretching the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    Nearest,
    /// Bilinear
    Triangle,
    /// Bicubic
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Which image segmentation and compositing read from
///
/// Tone adjustment always starts from the original input regardless of this
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineSource {
    /// The decoded input exactly as loaded
    #[default]
    Original,
    /// The input with the session's current tone parameters applied
    Toned,
    /// Whatever currently occupies the preview slot
    Preview,
}

impl std::fmt::Display for PipelineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Toned => write!(f, "toned"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

/// Configuration for a compositing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Segmentation model file and family
    pub model: ModelSpec,

    /// Inference backend for the segmentation model
    pub backend: BackendType,

    /// Alpha of the black backdrop placed under the foreground before compositing
    pub overlay_alpha: u8,

    /// Filter used to stretch the background to the foreground size
    pub resize_filter: ResampleFilter,

    /// Source image for segmentation and compositing
    pub pipeline_source: PipelineSource,

    /// Number of inference threads (0 = auto)
    pub threads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: ModelSpec::default(),
            backend: BackendType::default(),
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
            resize_filter: ResampleFilter::default(),
            pipeline_source: PipelineSource::default(),
            threads: 0,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use bgcompose::{PipelineSource, SessionConfig};
    ///
    /// let config = SessionConfig::builder()
    ///     .overlay_alpha(0)
    ///     .pipeline_source(PipelineSource::Toned)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.overlay_alpha, 0);
    /// ```
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - `CompositeError::Io` if the file cannot be read
    /// - `CompositeError::InvalidConfig` if the JSON is malformed or fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompositeError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            CompositeError::invalid_config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Thread count above 256
    /// - Empty model path
    pub fn validate(&self) -> Result<()> {
        if self.threads > 256 {
            return Err(CompositeError::config_value_error(
                "thread count",
                self.threads,
                "0-256",
                Some(0),
            ));
        }

        if self.model.path.as_os_str().is_empty() {
            return Err(CompositeError::invalid_config("model path is empty"));
        }

        Ok(())
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Seed the builder from an existing configuration
    #[must_use]
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn overlay_alpha(mut self, alpha: u8) -> Self {
        self.config.overlay_alpha = alpha;
        self
    }

    #[must_use]
    pub fn resize_filter(mut self, filter: ResampleFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    #[must_use]
    pub fn pipeline_source(mut self, source: PipelineSource) -> Self {
        self.config.pipeline_source = source;
        self
    }

    /// Set inference thread count (0 = auto)
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Any error reported by [`SessionConfig::validate`].
    pub fn build(self) -> Result<SessionConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.overlay_alpha, 100);
        assert_eq!(config.resize_filter, ResampleFilter::CatmullRom);
        assert_eq!(config.pipeline_source, PipelineSource::Original);
        assert_eq!(config.model.path, std::path::PathBuf::from("u2net.onnx"));
        assert_eq!(config.threads, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder()
            .model(ModelSpec::new("/m/silueta.onnx", ModelKind::Silueta))
            .backend(BackendType::Onnx)
            .overlay_alpha(0)
            .resize_filter(ResampleFilter::Lanczos3)
            .pipeline_source(PipelineSource::Preview)
            .threads(4)
            .build()
            .unwrap();

        assert_eq!(config.model.kind, ModelKind::Silueta);
        assert_eq!(config.backend, BackendType::Onnx);
        assert_eq!(config.overlay_alpha, 0);
        assert_eq!(config.resize_filter, ResampleFilter::Lanczos3);
        assert_eq!(config.pipeline_source, PipelineSource::Preview);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SessionConfig::default();
        config.threads = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thread count"));

        let err = SessionConfig::builder()
            .model(ModelSpec::new("", ModelKind::U2Net))
            .build()
            .unwrap_err();
        assert!(matches!(err, CompositeError::InvalidConfig(_)));
    }

    #[test]
    fn test_filter_conversion() {
        assert_eq!(FilterType::from(ResampleFilter::default()), FilterType::CatmullRom);
        assert_eq!(FilterType::from(ResampleFilter::Nearest), FilterType::Nearest);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "overlay_alpha": 40, "pipeline_source": "toned", "resize_filter": "lanczos3" }}"#
        )
        .unwrap();

        let config = SessionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.overlay_alpha, 40);
        assert_eq!(config.pipeline_source, PipelineSource::Toned);
        assert_eq!(config.resize_filter, ResampleFilter::Lanczos3);
        assert_eq!(config.model, ModelSpec::default());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "overlay_alpha": 999 }}"#).unwrap();
        let err = SessionConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, CompositeError::InvalidConfig(_)));

        let err = SessionConfig::from_json_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, CompositeError::Io(_)));
    }

    #[test]
    fn test_config_serde() {
        let config = SessionConfig::builder()
            .backend(BackendType::Onnx)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""backend":"onnx""#));
        assert!(json.contains(r#""resize_filter":"catmull-rom""#));

        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
