use thiserror::Error;

/// Errors surfaced by wave construction, scheduling and configuration.
#[derive(Debug, Error)]
pub enum WavegenError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown waveform type `{0}`")]
    UnknownWaveform(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WavegenError>;
