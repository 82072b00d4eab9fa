//! Transcript source adapter
//!
//! Turns one finished utterance clip into a [`TranscriptSegment`] through an
//! ordered cascade: primary recognizer, secondary recognizer, duration-based
//! placeholder, fixed generic prompt. The adapter never returns an empty
//! transcript; degradation is explicit in [`TranscriptSource`], not silent.

pub mod recognizers;

pub use recognizers::{DeepgramRecognizer, WhisperRecognizer};

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Which cascade tier produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Primary recognizer
    Primary,
    /// Secondary recognizer
    Secondary,
    /// Client-typed text, no recognition involved
    Typed,
    /// Placeholder text chosen by clip duration
    DurationHeuristic,
    /// Fixed generic prompt, last resort
    GenericPrompt,
}

impl TranscriptSource {
    /// Whether this tier carries genuine recognition output
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        matches!(self, Self::Primary | Self::Secondary)
    }
}

/// One finalized user utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Utterance start, seconds since the Unix epoch
    pub start_time: f64,
    /// Utterance end, seconds since the Unix epoch
    pub end_time: f64,
    pub text: String,
    /// Recognition confidence in `[0, 1]`
    pub confidence: f64,
    pub source: TranscriptSource,
}

/// An external speech recognition engine
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize a WAV clip; an empty transcript is treated as failure by the
    /// cascade
    async fn recognize(&self, audio: &[u8]) -> Result<String>;
}

/// Placeholder used when both recognizers fail and the clip length gives a hint
fn duration_placeholder(duration_secs: f64) -> &'static str {
    if duration_secs > 3.0 {
        "I've been struggling with some difficult feelings lately"
    } else if duration_secs > 1.0 {
        "I need someone to talk to"
    } else {
        "Hello"
    }
}

/// Fixed last-resort prompt
const GENERIC_PROMPT: &str = "I'd like to talk";

/// Estimate clip duration in seconds
///
/// Reads the WAV header when the clip is well-formed; otherwise falls back to
/// a 16 kHz mono s16 byte-count estimate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clip_duration_secs(audio: &[u8]) -> f64 {
    if let Ok(reader) = hound::WavReader::new(Cursor::new(audio)) {
        let spec = reader.spec();
        if spec.sample_rate > 0 {
            return f64::from(reader.duration()) / f64::from(spec.sample_rate);
        }
    }
    audio.len() as f64 / (16_000.0 * 2.0)
}

/// Speech recognition cascade
pub struct Transcriber {
    primary: Option<Arc<dyn SpeechRecognizer>>,
    secondary: Option<Arc<dyn SpeechRecognizer>>,
    call_timeout: Duration,
}

impl Transcriber {
    #[must_use]
    pub fn new(
        primary: Option<Arc<dyn SpeechRecognizer>>,
        secondary: Option<Arc<dyn SpeechRecognizer>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            call_timeout,
        }
    }

    /// Transcribe one utterance clip ending at `end_time`
    ///
    /// Always yields a non-empty segment; the tier that produced the text is
    /// recorded in `source`.
    pub async fn transcribe(&self, audio: &[u8], end_time: f64) -> TranscriptSegment {
        let duration = clip_duration_secs(audio);
        let start_time = end_time - duration;

        for (recognizer, source, confidence) in [
            (&self.primary, TranscriptSource::Primary, 0.9),
            (&self.secondary, TranscriptSource::Secondary, 0.7),
        ] {
            let Some(recognizer) = recognizer else {
                continue;
            };
            match tokio::time::timeout(self.call_timeout, recognizer.recognize(audio)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    tracing::info!(?source, text = %text, "transcription complete");
                    return TranscriptSegment {
                        start_time,
                        end_time,
                        text: text.trim().to_string(),
                        confidence,
                        source,
                    };
                }
                Ok(Ok(_)) => {
                    tracing::warn!(?source, "recognizer returned empty transcript");
                }
                Ok(Err(e)) => {
                    tracing::warn!(?source, error = %e, "recognizer failed");
                }
                Err(_) => {
                    tracing::warn!(?source, timeout = ?self.call_timeout, "recognizer timed out");
                }
            }
        }

        // Degraded tiers: a duration-keyed placeholder when the clip carries
        // any signal, otherwise the fixed prompt
        if audio.is_empty() {
            tracing::warn!("empty clip, using generic prompt");
            TranscriptSegment {
                start_time: end_time,
                end_time,
                text: GENERIC_PROMPT.to_string(),
                confidence: 0.1,
                source: TranscriptSource::GenericPrompt,
            }
        } else {
            let text = duration_placeholder(duration);
            tracing::warn!(duration, text = %text, "recognition failed, using duration heuristic");
            TranscriptSegment {
                start_time,
                end_time,
                text: text.to_string(),
                confidence: 0.2,
                source: TranscriptSource::DurationHeuristic,
            }
        }
    }
}
