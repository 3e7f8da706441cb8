//! Subscriber setup for the `bgcompose` binary
//!
//! The library only emits `log` records and `tracing` spans; installing a
//! subscriber is left to the application.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored single-line output (default for the CLI)
    #[default]
    Console,
    /// Plain output without ANSI colors, for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive; overrides `verbosity` when set
    pub env_filter: Option<String>,
    /// Correlates all events of one CLI run
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` takes precedence over both `env_filter` and `verbosity`.
    ///
    /// # Errors
    /// Fails if the filter directive is invalid or a subscriber is already installed.
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match (std::env::var("RUST_LOG").ok(), &self.env_filter) {
            (Some(directive), _) => EnvFilter::try_new(directive)?,
            (None, Some(directive)) => EnvFilter::try_new(directive)?,
            (None, None) => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "bgcompose session started");
        }

        Ok(())
    }
}

/// Span helpers for the CLI run
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one whole CLI invocation
    pub fn session(session_id: &str, model: &str, backend: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            model = %model,
            backend = %backend
        )
    }

    pub fn step(name: &'static str) -> Span {
        tracing::span!(Level::INFO, "step", name = %name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().verbosity_to_filter(), "warn");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("bgcompose=trace")
            .with_session_id("abc");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("bgcompose=trace"));
        assert_eq!(config.session_id.as_deref(), Some("abc"));
    }
}
