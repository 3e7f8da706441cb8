//! Segmentation model specification and loading

use crate::error::{CompositeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model file used when none is specified
pub const DEFAULT_MODEL_PATH: &str = "u2net.onnx";

/// Family of a background-removal model, which fixes its input layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// U²-Net general-purpose salient object model
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight U²-Net variant
    #[serde(rename = "u2netp")]
    U2NetP,
    /// Reduced-size U²-Net
    #[serde(rename = "silueta")]
    Silueta,
    /// IS-Net general-use dichotomous segmentation model
    #[serde(rename = "isnet-general-use", alias = "isnet", alias = "isnet-general")]
    IsNetGeneral,
}

impl ModelKind {
    /// Parse a model family name (case-insensitive, `_` and `-` interchangeable)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "u2net" => Some(Self::U2Net),
            "u2netp" => Some(Self::U2NetP),
            "silueta" => Some(Self::Silueta),
            "isnet" | "isnet-general" | "isnet-general-use" => Some(Self::IsNetGeneral),
            _ => None,
        }
    }

    /// Preprocessing expected by this model family
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::U2Net | Self::U2NetP | Self::Silueta => PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
                resize_mode: ResizeMode::Stretch,
            },
            Self::IsNetGeneral => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
                resize_mode: ResizeMode::Stretch,
            },
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U2Net => write!(f, "u2net"),
            Self::U2NetP => write!(f, "u2netp"),
            Self::Silueta => write!(f, "silueta"),
            Self::IsNetGeneral => write!(f, "isnet-general-use"),
        }
    }
}

/// Which model to run and where its ONNX file lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub kind: ModelKind,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            kind: ModelKind::U2Net,
        }
    }
}

impl ModelSpec {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P, kind: ModelKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Parse `kind:path` or a bare path
    ///
    /// For a bare path the kind is inferred from the file stem
    /// (`u2netp.onnx` → `U2NetP`), falling back to `U2Net`.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if let Some((prefix, rest)) = spec.split_once(':') {
            if let Some(kind) = ModelKind::from_name(prefix) {
                return Self::new(rest, kind);
            }
        }

        let path = PathBuf::from(spec);
        let kind = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(ModelKind::from_name)
            .unwrap_or(ModelKind::U2Net);
        Self { path, kind }
    }

    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{}:{}",
            self.kind,
            self.path.file_name().unwrap_or_default().to_string_lossy()
        )
    }
}

/// How the input image is fitted into the model's square input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Resize to the target size ignoring aspect ratio
    Stretch,
    /// Preserve aspect ratio and center on a padded canvas
    Letterbox,
}

/// Input tensor preparation for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input width and height
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
    pub resize_mode: ResizeMode,
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub kind: ModelKind,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Loads model bytes and describes the model for a backend
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
}

impl ModelManager {
    /// Create a manager for `spec`, checking that the model file exists
    ///
    /// # Errors
    /// Returns `CompositeError::Model` if the path is missing or not a file.
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        if !spec.path.exists() {
            return Err(CompositeError::model_error_with_context(
                "locate",
                &spec.path,
                "file does not exist",
                &["pass --model <kind:path>", "download u2net.onnx next to the binary"],
            ));
        }
        if !spec.path.is_file() {
            return Err(CompositeError::model_error_with_context(
                "locate",
                &spec.path,
                "path is not a file",
                &[],
            ));
        }
        Ok(Self { spec: spec.clone() })
    }

    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.spec.path
    }

    /// Read the full ONNX file into memory
    ///
    /// # Errors
    /// Returns `CompositeError::Io` if the file cannot be read.
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.spec.path)
            .map_err(|e| CompositeError::file_io_error("read model file", &self.spec.path, &e))
    }

    /// Describe the model without loading it
    ///
    /// # Errors
    /// Returns `CompositeError::Io` if the file metadata cannot be read.
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.spec.path)
            .map_err(|e| CompositeError::file_io_error("inspect model file", &self.spec.path, &e))?
            .len() as usize;
        let [width, height] = self.spec.kind.preprocessing().target_size;
        let (width, height) = (width as usize, height as usize);

        Ok(ModelInfo {
            name: self.spec.display_name(),
            kind: self.spec.kind,
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.spec.kind.preprocessing()
    }
}
