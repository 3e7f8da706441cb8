//! Editing session: the current preview and the operations that replace it
//!
//! A [`SessionManager`] owns the decoded input, the chosen background, the
//! current tone parameters and the single preview slot. Every producing
//! operation computes its result first and only then replaces the preview, so
//! a failed operation leaves the session exactly as it was.

use crate::{
    compositor::Compositor,
    config::{PipelineSource, SessionConfig},
    error::{CompositeError, Result},
    segmenter::{ModelSegmenter, Segmenter},
    services::{
        DisplayProjector, ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter,
        ProgressTracker,
    },
    tone::{SliderPositions, ToneAdjuster, ToneParameters},
    types::{OperationReport, RasterImage},
};
use instant::Instant;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Paths chosen by the user plus the current preview
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub input_path: Option<PathBuf>,
    pub background_path: Option<PathBuf>,
    pub preview: Option<RasterImage>,
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing loaded
    Empty,
    /// Input decoded; the preview shows it under the current tone
    HasInput,
    /// Preview produced by tone adjustment, segmentation or `set_preview`
    HasPreview,
    /// Preview is a composite over the chosen background
    Composited,
}

/// What produced the current preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreviewOrigin {
    Load,
    Produced,
    Composite,
}

/// Drives the compositing pipeline for one input image
pub struct SessionManager {
    config: SessionConfig,
    state: SessionState,
    input: Option<RasterImage>,
    background: Option<RasterImage>,
    tone: ToneParameters,
    origin: PreviewOrigin,
    segmenter: Box<dyn Segmenter>,
    compositor: Compositor,
    reporter: Box<dyn ProgressReporter>,
    last_report: Option<OperationReport>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.phase())
            .field("input_path", &self.state.input_path)
            .field("background_path", &self.state.background_path)
            .field("tone", &self.tone)
            .field("pipeline_source", &self.config.pipeline_source)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a session that segments with the configured ONNX model
    ///
    /// The model is loaded lazily on the first segmentation.
    ///
    /// # Errors
    /// Returns `CompositeError::InvalidConfig` if the configuration fails validation.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let segmenter = ModelSegmenter::new(config.clone());
        Self::with_segmenter(config, Box::new(segmenter))
    }

    /// Create a session with a caller-provided segmenter
    ///
    /// # Errors
    /// Returns `CompositeError::InvalidConfig` if the configuration fails validation.
    pub fn with_segmenter(config: SessionConfig, segmenter: Box<dyn Segmenter>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compositor: Compositor::new(config.resize_filter),
            config,
            state: SessionState::default(),
            input: None,
            background: None,
            tone: ToneParameters::IDENTITY,
            origin: PreviewOrigin::Load,
            segmenter,
            reporter: Box::new(NoOpProgressReporter),
            last_report: None,
        })
    }

    /// Send progress for every operation to `reporter`
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (&self.input, &self.state.preview, self.origin) {
            (None, None, _) => SessionPhase::Empty,
            (Some(_), None, _) | (Some(_), Some(_), PreviewOrigin::Load) => SessionPhase::HasInput,
            (_, Some(_), PreviewOrigin::Composite) => SessionPhase::Composited,
            (_, Some(_), _) => SessionPhase::HasPreview,
        }
    }

    /// Current tone parameters
    #[must_use]
    pub fn tone(&self) -> ToneParameters {
        self.tone
    }

    /// The decoded input exactly as loaded
    #[must_use]
    pub fn input_image(&self) -> Option<&RasterImage> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn get_preview(&self) -> Option<&RasterImage> {
        self.state.preview.as_ref()
    }

    /// Report of the most recent successful producing operation
    #[must_use]
    pub fn last_report(&self) -> Option<&OperationReport> {
        self.last_report.as_ref()
    }

    /// Load the input image and record its path
    ///
    /// The preview becomes the new input under the current tone parameters,
    /// replacing anything produced from a previous input.
    ///
    /// # Errors
    /// - `CompositeError::Io` if the file is missing or unreadable
    /// - `CompositeError::Format` if it cannot be decoded
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn set_input<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        tracker.report_stage(ProcessingStage::Loading);

        let image = ImageIOService::load_image(path)
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;
        info!(
            "Loaded input {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        let preview = ToneAdjuster::adjust(&image, &self.tone);
        self.input = Some(image);
        self.state.input_path = Some(path.to_path_buf());
        self.state.preview = Some(preview);
        self.origin = PreviewOrigin::Load;
        Ok(())
    }

    /// Load the replacement background and record its path
    ///
    /// # Errors
    /// - `CompositeError::Io` if the file is missing or unreadable
    /// - `CompositeError::Format` if it cannot be decoded
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn set_background<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        tracker.report_stage(ProcessingStage::Loading);

        let image = ImageIOService::load_image(path)
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;
        info!(
            "Loaded background {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        self.background = Some(image);
        self.state.background_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace the preview with an externally produced image
    pub fn set_preview(&mut self, image: RasterImage) {
        self.state.preview = Some(image);
        self.origin = PreviewOrigin::Produced;
    }

    /// Restore identity tone parameters
    ///
    /// The preview and both paths are left untouched.
    pub fn reset(&mut self) {
        debug!("Resetting tone parameters to identity");
        self.tone = ToneParameters::IDENTITY;
    }

    /// Tone-adjust the original input and make it the preview
    ///
    /// Parameters are clamped to their valid ranges and become the session's
    /// current tone.
    ///
    /// # Errors
    /// Returns `CompositeError::InputMissing` if no input has been loaded.
    #[instrument(skip(self))]
    pub fn adjust_tone(&mut self, params: ToneParameters) -> Result<&RasterImage> {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        tracker.report_stage(ProcessingStage::ToneAdjustment);

        let input = self
            .input
            .as_ref()
            .ok_or_else(|| CompositeError::input_missing("adjust tone"))
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        let params = params.clamped();
        let adjusted = ToneAdjuster::adjust(input, &params);

        let report = OperationReport::new("adjust_tone", &adjusted, elapsed_ms(start));
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&report);

        self.tone = params;
        self.origin = PreviewOrigin::Produced;
        self.last_report = Some(report);
        Ok(self.state.preview.insert(adjusted))
    }

    /// Map slider positions to tone parameters and apply them
    ///
    /// # Errors
    /// Returns `CompositeError::InputMissing` if no input has been loaded.
    pub fn apply_sliders(&mut self, positions: SliderPositions) -> Result<&RasterImage> {
        self.adjust_tone(positions.to_parameters())
    }

    /// Segment the pipeline source and make the cutout the preview
    ///
    /// # Errors
    /// - `CompositeError::InputMissing` if the pipeline source is not available
    /// - `CompositeError::Segmentation` if the model fails
    #[instrument(skip(self))]
    pub fn remove_background(&mut self) -> Result<&RasterImage> {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());

        let source = self
            .pipeline_input("remove background")
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        tracker.report_stage(ProcessingStage::Segmentation);
        let cutout = segment_checked(self.segmenter.as_mut(), &source)
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        let report = OperationReport::new("remove_background", &cutout, elapsed_ms(start));
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&report);

        self.origin = PreviewOrigin::Produced;
        self.last_report = Some(report);
        Ok(self.state.preview.insert(cutout))
    }

    /// Segment the pipeline source and composite it over the background
    ///
    /// Uses the configured overlay alpha and resampling filter.
    ///
    /// # Errors
    /// - `CompositeError::InputMissing` if no input has been loaded
    /// - `CompositeError::BackgroundMissing` if no background has been loaded
    /// - `CompositeError::Segmentation` if the model fails
    /// - `CompositeError::Dimension` if either image has zero area
    #[instrument(skip(self))]
    pub fn replace_background(&mut self) -> Result<&RasterImage> {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());

        if self.input.is_none() {
            let err = CompositeError::input_missing("replace background");
            tracker.report_error(&err.to_string());
            return Err(err);
        }
        let background = self
            .background
            .as_ref()
            .ok_or_else(|| CompositeError::background_missing("replace background"))
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        let source = self
            .pipeline_input("replace background")
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        tracker.report_stage(ProcessingStage::Segmentation);
        let foreground = segment_checked(self.segmenter.as_mut(), &source)
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        tracker.report_stage(ProcessingStage::Compositing);
        let blended = self
            .compositor
            .composite(&foreground, background, self.config.overlay_alpha)
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        let report = OperationReport::new("replace_background", &blended, elapsed_ms(start));
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&report);

        self.origin = PreviewOrigin::Composite;
        self.last_report = Some(report);
        Ok(self.state.preview.insert(blended))
    }

    /// Write the preview as a 3-channel PNG
    ///
    /// # Errors
    /// - `CompositeError::InputMissing` if there is no preview
    /// - `CompositeError::Io` or `CompositeError::Image` if writing fails
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_preview<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut tracker = ProgressTracker::new(self.reporter.as_ref());
        tracker.report_stage(ProcessingStage::Saving);

        let preview = self
            .state
            .preview
            .as_ref()
            .ok_or_else(|| CompositeError::input_missing("save preview"))
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;

        ImageIOService::save_png(preview, path.as_ref())
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;
        info!("Saved preview to {}", path.as_ref().display());
        Ok(())
    }

    /// Scaled copy of the preview that fits in `max_width` x `max_height`
    ///
    /// The projection is for display only and never becomes session state.
    ///
    /// # Errors
    /// - `CompositeError::InputMissing` if there is no preview
    /// - `CompositeError::Dimension` if the box has zero area
    pub fn display_projection(&self, max_width: u32, max_height: u32) -> Result<RasterImage> {
        let preview = self
            .state
            .preview
            .as_ref()
            .ok_or_else(|| CompositeError::input_missing("display preview"))?;
        DisplayProjector::project(preview, max_width, max_height)
    }

    /// Image that segmentation reads, per the configured pipeline source
    fn pipeline_input(&self, operation: &str) -> Result<RasterImage> {
        match self.config.pipeline_source {
            PipelineSource::Original => self.input.clone(),
            PipelineSource::Toned => self
                .input
                .as_ref()
                .map(|input| ToneAdjuster::adjust(input, &self.tone)),
            PipelineSource::Preview => self.state.preview.clone(),
        }
        .ok_or_else(|| CompositeError::input_missing(operation.to_string()))
    }
}

/// Run the segmenter and hold it to its same-size RGBA contract
fn segment_checked(segmenter: &mut dyn Segmenter, source: &RasterImage) -> Result<RasterImage> {
    let cutout = segmenter.segment(source)?;
    if cutout.dimensions() != source.dimensions() {
        return Err(CompositeError::segmentation(format!(
            "segmenter returned {}x{} for a {}x{} input",
            cutout.width(),
            cutout.height(),
            source.width(),
            source.height()
        )));
    }
    if cutout.has_alpha() {
        Ok(cutout)
    } else {
        cutout.to_rgba()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
