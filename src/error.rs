//! Error types for the Aura gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Aura gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio decoding or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Response generation error
    #[error("responder error: {0}")]
    Responder(String),

    /// Emotion feed error
    #[error("emotion feed error: {0}")]
    Feed(String),

    /// Session lifecycle error (unknown session, send after close)
    #[error("session error: {0}")]
    Session(String),

    /// Internal invariant violation, fatal for the owning session
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
