//! bgcompose command-line interface
//!
//! Runs one editing session non-interactively: load, adjust tone, remove or
//! replace the background, save.

use super::config::CliConfigBuilder;
use crate::{
    config::{BackendType, PipelineSource, ResampleFilter},
    services::{
        ImageIOService, LoggingProgressReporter, ProcessingStage, ProgressReporter,
        ProgressUpdate,
    },
    session::SessionManager,
    tone::ToneParameters,
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::OperationReport,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "displayed_output.png";

/// Tone-adjust an image and remove or replace its background
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcompose")]
pub struct Cli {
    /// Input image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Replacement background; composites the segmented input over it
    #[arg(short, long, value_name = "BACKGROUND")]
    pub background: Option<PathBuf>,

    /// Output PNG path
    #[arg(short, long, value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Saturation factor (0 = grayscale, 1 = unchanged, 2 = max)
    #[arg(long, allow_hyphen_values = true)]
    pub saturation: Option<f32>,

    /// Brightness offset (-1 = black, 0 = unchanged, 1 = double)
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f32>,

    /// Contrast factor (0 = flat gray, 1 = unchanged, 2 = max)
    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f32>,

    /// Slider positions as SATURATION,BRIGHTNESS,CONTRAST (e.g. 100,50,50 is neutral)
    #[arg(long, value_name = "S,B,C", conflicts_with_all = ["saturation", "brightness", "contrast"])]
    pub sliders: Option<String>,

    /// Cut out the foreground without compositing
    #[arg(long, conflicts_with = "background")]
    pub remove_background: bool,

    /// Segmentation model as KIND:PATH or PATH (e.g. u2netp:models/u2netp.onnx)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Inference backend
    #[arg(long, value_enum)]
    pub backend: Option<CliBackend>,

    /// Opacity of the black backdrop between foreground and background (0-255)
    #[arg(long)]
    pub overlay_alpha: Option<u8>,

    /// Filter used to resize the background
    #[arg(long, value_enum)]
    pub filter: Option<CliFilter>,

    /// Image segmentation reads
    #[arg(long, value_enum)]
    pub source: Option<CliSource>,

    /// Inference threads (0 = auto)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Also write a display-sized copy no larger than WxH next to the output
    #[arg(long, value_name = "WxH")]
    pub max_preview: Option<String>,

    /// Session configuration JSON; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print operation reports as JSON on stdout
    #[arg(long)]
    pub report: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Tract,
    Onnx,
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Tract => BackendType::Tract,
            CliBackend::Onnx => BackendType::Onnx,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliSource {
    Original,
    Toned,
    Preview,
}

impl From<CliSource> for PipelineSource {
    fn from(source: CliSource) -> Self {
        match source {
            CliSource::Original => PipelineSource::Original,
            CliSource::Toned => PipelineSource::Toned,
            CliSource::Preview => PipelineSource::Preview,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<CliFilter> for ResampleFilter {
    fn from(filter: CliFilter) -> Self {
        match filter {
            CliFilter::Nearest => ResampleFilter::Nearest,
            CliFilter::Triangle => ResampleFilter::Triangle,
            CliFilter::CatmullRom => ResampleFilter::CatmullRom,
            CliFilter::Gaussian => ResampleFilter::Gaussian,
            CliFilter::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

/// Spinner that shows the current stage on stderr
struct SpinnerProgressReporter {
    bar: ProgressBar,
}

impl SpinnerProgressReporter {
    fn new(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressReporter for SpinnerProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, report: &OperationReport) {
        self.bar.println(format!(
            "{} -> {}x{} in {}ms",
            report.operation, report.width, report.height, report.elapsed_ms
        ));
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .println(format!("{} failed: {}", stage.description(), error));
    }
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = uuid::Uuid::new_v4().to_string();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(TracingFormat::Console)
        .with_session_id(&session_id)
        .init()
        .context("Failed to initialize tracing subscriber")?;

    run(&cli, &session_id)
}

fn run(cli: &Cli, session_id: &str) -> Result<()> {
    let config = CliConfigBuilder::from_cli(cli).context("Failed to build configuration")?;
    let tone = CliConfigBuilder::tone_from_cli(cli).context("Invalid tone settings")?;
    let max_preview = cli
        .max_preview
        .as_deref()
        .map(CliConfigBuilder::parse_dimensions)
        .transpose()
        .context("Invalid --max-preview")?;

    let _session_span =
        spans::session(session_id, &config.model.display_name(), &config.backend.to_string())
            .entered();
    info!(
        "Model {} on {} backend, segmentation source {}",
        config.model.display_name(),
        config.backend,
        config.pipeline_source
    );

    // Spinner output would interleave with log lines
    let spinner = (cli.verbose == 0).then(ProgressBar::new_spinner);
    let reporter: Box<dyn ProgressReporter> = match &spinner {
        Some(bar) => Box::new(SpinnerProgressReporter::new(bar.clone())),
        None => Box::new(LoggingProgressReporter),
    };

    let mut session = SessionManager::new(config)
        .context("Failed to create session")?
        .with_reporter(reporter);
    let mut reports = Vec::new();

    let outcome = run_session(cli, &mut session, tone, &mut reports);
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    outcome?;

    if let Some((width, height)) = max_preview {
        let _span = spans::step("display").entered();
        let projected = session
            .display_projection(width, height)
            .context("Failed to scale preview for display")?;
        let preview_path = display_path(&cli.output);
        ImageIOService::save_png(&projected, &preview_path)
            .with_context(|| format!("Failed to write {}", preview_path.display()))?;
        info!(
            "Wrote {}x{} display copy to {}",
            projected.width(),
            projected.height(),
            preview_path.display()
        );
    }

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}

fn run_session(
    cli: &Cli,
    session: &mut SessionManager,
    tone: ToneParameters,
    reports: &mut Vec<OperationReport>,
) -> Result<()> {
    {
        let _span = spans::step("load").entered();
        session
            .set_input(&cli.input)
            .with_context(|| format!("Failed to load input {}", cli.input.display()))?;
        if let Some(background) = &cli.background {
            session
                .set_background(background)
                .with_context(|| format!("Failed to load background {}", background.display()))?;
        }
    }

    {
        let _span = spans::step("tone").entered();
        session.adjust_tone(tone).context("Tone adjustment failed")?;
        reports.extend(session.last_report().cloned());
    }

    if cli.background.is_some() {
        let _span = spans::step("replace").entered();
        session
            .replace_background()
            .context("Background replacement failed")?;
        reports.extend(session.last_report().cloned());
    } else if cli.remove_background {
        let _span = spans::step("remove").entered();
        session
            .remove_background()
            .context("Background removal failed")?;
        reports.extend(session.last_report().cloned());
    } else if !tone.is_identity() {
        info!("No background operation requested; saving the tone-adjusted image");
    } else {
        warn!("No tone change or background operation requested; output equals input");
    }

    let _span = spans::step("save").entered();
    session
        .save_preview(&cli.output)
        .with_context(|| format!("Failed to save {}", cli.output.display()))?;
    info!("Saved {}", cli.output.display());
    Ok(())
}

/// `out.png` -> `out.preview.png`
fn display_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    output.with_file_name(format!("{stem}.preview.png"))
}
