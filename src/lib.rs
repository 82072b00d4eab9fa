//! Aura Gateway - Emotion-aware conversational gateway
//!
//! This library fuses two live input streams into one conversation:
//! - Speech audio, recognized through a cascading STT pipeline
//! - EEG-derived emotion metrics, smoothed into discrete labeled events
//!
//! Every user utterance is annotated with the dominant emotion observed
//! around it before the response model sees it, so replies can acknowledge
//! how something was said and not just what was said.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Clients                          │
//! │   audio + eeg_sample  │  emotion display feed       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Aura Gateway                         │
//! │   Sessions  │  Fusion  │  STT cascade  │  Store     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              External models                         │
//! │   Whisper  │  Deepgram  │  Chat LLM  │  TTS         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod emotion;
pub mod error;
pub mod fusion;
pub mod respond;
pub mod session;
pub mod store;
pub mod transcribe;

pub use api::ApiServer;
pub use config::Config;
pub use error::{Error, Result};
pub use fusion::{ContextFrame, fuse};
pub use session::{ConnectionState, Session, SessionManager};
pub use store::{ConversationSegment, SegmentStore};

/// Current wall-clock time as seconds since the Unix epoch
///
/// Timestamps throughout the pipeline are plain `f64` seconds so that
/// sample times supplied by clients and times measured locally compare
/// directly.
#[must_use]
pub fn epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
