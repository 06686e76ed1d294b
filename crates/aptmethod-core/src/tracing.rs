//! Tracing setup for transport methods.
//!
//! stdout belongs to the protocol: one stray line there and the parent sees a
//! malformed frame. The only layer built here is [`StderrLayer`], so nothing
//! configured through this module can write anywhere else.
//!
//! ```ignore
//! use aptmethod_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::default())?;
//! ```

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*, registry::LookupSpan};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Line format of the log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event.
    #[default]
    Compact,
    /// Multi-line, for reading a method's log by hand.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// What to log and how.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for `aptmethod` targets when neither `filter` nor `RUST_LOG` is set.
    pub level: Level,
    pub format: LogFormat,
    /// Filter directives taking precedence over `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            filter: None,
        }
    }
}

impl TracingConfig {
    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        match self.filter {
            Some(ref filter) => Ok(EnvFilter::try_new(filter)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("aptmethod={}", self.level)))),
        }
    }
}

/// A formatting layer bound to stderr.
pub type StderrLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Builds the formatting layer for `format`, writing to stderr.
pub fn stderr_layer<S>(format: LogFormat) -> StderrLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Installs the global subscriber.
///
/// Call once, before `Method::run_stdio` in the runtime crate starts the
/// handshake.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer(config.format))
        .with(config.env_filter()?);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn default_is_quiet_compact() {
        let config = TracingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.filter.is_none());
    }

    #[test]
    fn explicit_filter_is_parsed() {
        let config = TracingConfig {
            filter: Some("aptmethod_runtime=debug,aptmethod_protocol=trace".into()),
            ..Default::default()
        };
        assert!(config.env_filter().is_ok());

        let config = TracingConfig {
            filter: Some("aptmethod=bogus".into()),
            ..Default::default()
        };
        assert!(matches!(config.env_filter(), Err(TracingError::EnvFilter(_))));
    }

    #[test]
    fn every_format_builds_a_layer() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let subscriber = Registry::default().with(stderr_layer(format));
            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!(?format, "layer is live");
            });
        }
    }
}
