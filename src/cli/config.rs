//! Conversion from CLI arguments to session configuration and tone settings

use crate::cli::main_impl::Cli;
use crate::{
    config::{SessionConfig, SessionConfigBuilder},
    models::ModelSpec,
    tone::{SliderPositions, ToneParameters, BRIGHTNESS_RANGE, CONTRAST_RANGE, SATURATION_RANGE},
};
use anyhow::{bail, Context, Result};
use log::warn;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the session configuration, starting from `--config` when given
    pub(crate) fn from_cli(cli: &Cli) -> Result<SessionConfig> {
        let base = match &cli.config {
            Some(path) => SessionConfig::from_json_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => SessionConfig::default(),
        };

        let mut builder = SessionConfigBuilder::from_config(base);
        if let Some(model) = &cli.model {
            builder = builder.model(ModelSpec::parse(model));
        }
        if let Some(backend) = cli.backend {
            builder = builder.backend(backend.into());
        }
        if let Some(alpha) = cli.overlay_alpha {
            builder = builder.overlay_alpha(alpha);
        }
        if let Some(filter) = cli.filter {
            builder = builder.resize_filter(filter.into());
        }
        if let Some(source) = cli.source {
            builder = builder.pipeline_source(source.into());
        }
        if let Some(threads) = cli.threads {
            builder = builder.threads(threads);
        }

        builder.build().context("Invalid configuration")
    }

    /// Tone parameters from `--sliders` or the individual value flags
    ///
    /// Out-of-range values are clamped with a warning.
    pub(crate) fn tone_from_cli(cli: &Cli) -> Result<ToneParameters> {
        if let Some(sliders) = &cli.sliders {
            return Ok(Self::parse_sliders(sliders)?.to_parameters());
        }

        let requested = [
            ("saturation", cli.saturation, &SATURATION_RANGE),
            ("brightness", cli.brightness, &BRIGHTNESS_RANGE),
            ("contrast", cli.contrast, &CONTRAST_RANGE),
        ];
        for (name, value, range) in requested {
            match value {
                Some(v) if v.is_nan() => bail!("{name} must be a number"),
                Some(v) if !range.contains(&v) => warn!(
                    "{name} {v} outside {}..={}, clamping",
                    range.start(),
                    range.end()
                ),
                _ => {},
            }
        }

        let identity = ToneParameters::IDENTITY;
        Ok(ToneParameters::new(
            cli.saturation.unwrap_or(identity.saturation),
            cli.brightness.unwrap_or(identity.brightness),
            cli.contrast.unwrap_or(identity.contrast),
        ))
    }

    /// Parse `S,B,C` slider positions
    pub(crate) fn parse_sliders(value: &str) -> Result<SliderPositions> {
        let parts = value
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .with_context(|| format!("slider position '{}' is not a number", part.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        let [saturation, brightness, contrast] = parts.as_slice() else {
            bail!("expected three slider positions S,B,C, got '{value}'");
        };

        let limits = [
            ("saturation", *saturation, SliderPositions::SATURATION_MAX),
            ("brightness", *brightness, SliderPositions::BRIGHTNESS_MAX),
            ("contrast", *contrast, SliderPositions::CONTRAST_MAX),
        ];
        for (name, position, max) in limits {
            if position > max {
                bail!("{name} slider position {position} exceeds {max}");
            }
        }

        Ok(SliderPositions::new(*saturation, *brightness, *contrast))
    }

    /// Parse `WxH`
    pub(crate) fn parse_dimensions(value: &str) -> Result<(u32, u32)> {
        let (width, height) = value
            .split_once(['x', 'X'])
            .with_context(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
        let width: u32 = width.trim().parse().context("width is not a number")?;
        let height: u32 = height.trim().parse().context("height is not a number")?;
        if width == 0 || height == 0 {
            bail!("display size {width}x{height} has zero area");
        }
        Ok((width, height))
    }
}
