#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # bgcompose
//!
//! Tone adjustment, background removal and background replacement for still
//! images.
//!
//! A [`SessionManager`] holds one input image, an optional replacement
//! background and a single preview. Each operation reads the current state and
//! replaces the preview with its result:
//!
//! - **Tone**: saturation, brightness and contrast, always applied to the
//!   original input
//! - **Remove background**: a segmentation model cuts out the foreground
//! - **Replace background**: the cutout is laid over a dimming black backdrop
//!   and composited onto the stretched background
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcompose::{SessionConfig, SessionManager, ToneParameters};
//!
//! # fn example() -> bgcompose::Result<()> {
//! let mut session = SessionManager::new(SessionConfig::default())?;
//! session.set_input("portrait.jpg")?;
//! session.set_background("beach.jpg")?;
//!
//! session.adjust_tone(ToneParameters::new(1.2, 0.1, 1.0))?;
//! session.replace_background()?;
//! session.save_preview("displayed_output.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Segmenters
//!
//! Segmentation sits behind the [`Segmenter`] trait. The shipped
//! [`ModelSegmenter`] runs a U²-Net family or IS-Net ONNX model; any other
//! implementation can be injected with [`SessionManager::with_segmenter`].
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust inference backend
//! - `onnx`: ONNX Runtime inference backend (CPU)
//! - `cli` (default): the `bgcompose` binary, progress spinner and tracing setup
//! - `tracing-json`: JSON log output for the binary
//! - `webp-support`: WebP decoding
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! bgcompose = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod segmenter;
pub mod services;
pub mod session;
pub mod tone;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::Path;

pub use backends::*;
pub use compositor::{Compositor, DEFAULT_OVERLAY_ALPHA};
pub use config::{BackendType, PipelineSource, ResampleFilter, SessionConfig, SessionConfigBuilder};
pub use error::{CompositeError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelKind, ModelManager, ModelSpec, PreprocessingConfig, ResizeMode};
pub use segmenter::{BackendFactory, DefaultBackendFactory, ModelSegmenter, Segmenter};
pub use services::{
    DisplayProjector, ImageIOService, LoggingProgressReporter, NoOpProgressReporter,
    ProcessingStage, ProgressReporter, ProgressUpdate,
};
pub use session::{SessionManager, SessionPhase, SessionState};
pub use tone::{SliderPositions, ToneAdjuster, ToneParameters};
pub use types::{OperationReport, PixelFormat, RasterImage, SegmentationMask};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};

/// Cut the background out of the image at `input`
///
/// Runs one session with the given configuration and returns the RGBA cutout.
///
/// ```rust,no_run
/// use bgcompose::{remove_background_from_path, SessionConfig};
///
/// let cutout = remove_background_from_path("photo.jpg", &SessionConfig::default())?;
/// assert!(cutout.has_alpha());
/// # Ok::<(), bgcompose::CompositeError>(())
/// ```
pub fn remove_background_from_path<P: AsRef<Path>>(
    input: P,
    config: &SessionConfig,
) -> Result<RasterImage> {
    let mut session = SessionManager::new(config.clone())?;
    session.set_input(input)?;
    session.remove_background().cloned()
}

/// Composite the foreground of `input` over the image at `background`
///
/// The result has the input's dimensions.
pub fn replace_background_from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    background: Q,
    config: &SessionConfig,
) -> Result<RasterImage> {
    let mut session = SessionManager::new(config.clone())?;
    session.set_input(input)?;
    session.set_background(background)?;
    session.replace_background().cloned()
}
