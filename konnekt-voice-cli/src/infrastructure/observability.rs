use crate::infrastructure::error::{CliError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub json_format: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether to emit logs at all (stderr)
    pub show_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            json_format: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Only warnings and errors
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            ..Default::default()
        }
    }

    /// One JSON object per log line
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Keep stdout and stderr clean (schema output, piping)
    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        format!(
            "{}={level},konnekt_voice_signaling={level}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            level = self.default_level
        )
    }

    pub fn init(self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()));

        let registry = tracing_subscriber::registry().with(env_filter);

        let result = if !self.show_logs {
            registry.try_init()
        } else if self.json_format {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids),
                )
                .try_init()
        };

        result.map_err(|e| CliError::Logging(e.to_string()))
    }
}
