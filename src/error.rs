//! Error types for the spoken summary audio core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// The output could not be acquired or resumed. Recoverable: retry after
    /// a user gesture.
    #[error("Playback unavailable: {0}")]
    PlaybackUnavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Payload codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Payload has odd byte length {0}, expected 16-bit samples")]
    OddByteLength(usize),

    #[error("Invalid WAV container: {0}")]
    InvalidContainer(String),

    #[error("Encoding failed: {0}")]
    EncodeFailure(String),
}

/// Operation-level classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid base64 or odd byte length. Not retried.
    MalformedPayload,
    /// Audio output not ready. The caller may retry after a user gesture.
    PlaybackUnavailable,
    /// A valid payload could not be encoded.
    EncodeFailure,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Codec(CodecError::InvalidBase64(_))
            | Error::Codec(CodecError::OddByteLength(_))
            | Error::Codec(CodecError::InvalidContainer(_)) => ErrorKind::MalformedPayload,
            Error::Codec(CodecError::EncodeFailure(_)) => ErrorKind::EncodeFailure,
            Error::Audio(_) => ErrorKind::PlaybackUnavailable,
            Error::Config(_) | Error::Io(_) | Error::Task(_) => ErrorKind::Other,
        }
    }

    /// Short message suitable for showing next to the player controls
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::MalformedPayload => {
                "The audio for this summary is corrupted and cannot be played.".to_string()
            }
            ErrorKind::PlaybackUnavailable => {
                "Audio output is not available. Press play to try again.".to_string()
            }
            ErrorKind::EncodeFailure => "Failed to prepare audio for download.".to_string(),
            ErrorKind::Other => format!("An unexpected error occurred. {}", self),
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
