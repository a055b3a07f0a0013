use konnekt_voice_signaling::SignalingError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Room did not converge within {waited:?}")]
    Timeout { waited: Duration },

    #[error("Cannot write schema to {path}: {source}")]
    SchemaWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn schema_write(path: PathBuf, source: std::io::Error) -> Self {
        CliError::SchemaWrite { path, source }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
