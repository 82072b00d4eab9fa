//! Response orchestrator
//!
//! Turns the latest context frame plus prior conversation segments into a
//! reply, applying a fallback cascade at each stage. A turn never ends
//! without reply text; audio may degrade down to a silent clip.

pub mod responder;
pub mod synth;

pub use responder::{ChatMessage, ChatResponder, Responder, fallback_reply};
pub use synth::{OpenAiSynthesizer, Synthesizer, silent_wav};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::ResponderConfig;
use crate::fusion::ContextFrame;
use crate::store::ConversationSegment;

/// Duration of the silent clip emitted when every synthesis tier fails
const NOMINAL_SILENCE_SECS: f64 = 1.0;

/// Conversational stance given to the responder
const SYSTEM_PROMPT: &str = "You are a warm, attentive conversational companion. \
The user's words may carry an observed emotional state marker like \
'[emotion: stressed]' derived from physiological signals; let it inform your \
tone naturally, without naming the measurement. Keep replies short enough to \
speak aloud.";

/// How the reply text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyTier {
    /// External responder produced the text
    Generated,
    /// Fixed empathetic reply keyed by dominant emotion
    CannedFallback,
}

/// How the reply audio was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioTier {
    /// Primary synthesizer
    Synthesized,
    /// A lower-fidelity synthesizer further down the cascade
    Degraded,
    /// Silent clip of nominal duration
    Silent,
}

/// Per-stage outcome record for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    pub reply_tier: ReplyTier,
    pub audio_tier: AudioTier,
}

/// Result of one orchestrated turn
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub reply_text: String,
    pub reply_audio: Vec<u8>,
    pub report: TurnReport,
}

/// Drives generation and synthesis for one session's turns
pub struct Orchestrator {
    responder: Option<Arc<dyn Responder>>,
    /// Synthesis cascade, highest fidelity first
    synthesizers: Vec<Arc<dyn Synthesizer>>,
    config: ResponderConfig,
    synth_timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        responder: Option<Arc<dyn Responder>>,
        synthesizers: Vec<Arc<dyn Synthesizer>>,
        config: ResponderConfig,
        synth_timeout: Duration,
    ) -> Self {
        Self {
            responder,
            synthesizers,
            config,
            synth_timeout,
        }
    }

    /// Produce a reply for the fused frame
    ///
    /// Text is always produced, from the responder when it succeeds within
    /// its deadline, otherwise from the canned set keyed by the frame's
    /// dominant label. Audio falls through the synthesizer cascade and
    /// bottoms out at a silent clip.
    pub async fn respond(
        &self,
        frame: &ContextFrame,
        history: &[ConversationSegment],
    ) -> TurnResponse {
        let (reply_text, reply_tier) = self.generate(frame, history).await;
        let (reply_audio, audio_tier) = self.synthesize(&reply_text).await;

        let report = TurnReport {
            reply_tier,
            audio_tier,
        };
        tracing::info!(
            reply_tier = ?report.reply_tier,
            audio_tier = ?report.audio_tier,
            label = %frame.label,
            "turn complete"
        );

        TurnResponse {
            reply_text,
            reply_audio,
            report,
        }
    }

    async fn generate(
        &self,
        frame: &ContextFrame,
        history: &[ConversationSegment],
    ) -> (String, ReplyTier) {
        if let Some(responder) = &self.responder {
            let messages = build_messages(frame, history, self.config.history_turns);
            match tokio::time::timeout(self.config.call_timeout, responder.reply(&messages)).await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    return (text.trim().to_string(), ReplyTier::Generated);
                }
                Ok(Ok(_)) => tracing::warn!("responder returned empty reply"),
                Ok(Err(e)) => tracing::warn!(error = %e, "responder failed"),
                Err(_) => {
                    tracing::warn!(timeout = ?self.config.call_timeout, "responder timed out");
                }
            }
        }
        (
            fallback_reply(frame.label).to_string(),
            ReplyTier::CannedFallback,
        )
    }

    async fn synthesize(&self, text: &str) -> (Vec<u8>, AudioTier) {
        for (i, synthesizer) in self.synthesizers.iter().enumerate() {
            match tokio::time::timeout(self.synth_timeout, synthesizer.synthesize(text)).await {
                Ok(Ok(audio)) if !audio.is_empty() => {
                    let tier = if i == 0 {
                        AudioTier::Synthesized
                    } else {
                        AudioTier::Degraded
                    };
                    return (audio, tier);
                }
                Ok(Ok(_)) => tracing::warn!(tier = i, "synthesizer returned empty audio"),
                Ok(Err(e)) => tracing::warn!(tier = i, error = %e, "synthesizer failed"),
                Err(_) => tracing::warn!(tier = i, "synthesizer timed out"),
            }
        }
        let audio = silent_wav(NOMINAL_SILENCE_SECS).unwrap_or_default();
        (audio, AudioTier::Silent)
    }
}

/// Assemble the chat exchange: stance, recent turns, then the annotated frame
fn build_messages(
    frame: &ContextFrame,
    history: &[ConversationSegment],
    history_turns: usize,
) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(history_turns);
    let mut messages = vec![ChatMessage {
        role: "system",
        content: SYSTEM_PROMPT.to_string(),
    }];
    for segment in &history[skip..] {
        messages.push(ChatMessage {
            role: "user",
            content: segment.frame.annotated_text.clone(),
        });
        messages.push(ChatMessage {
            role: "assistant",
            content: segment.reply_text.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: frame.annotated_text.clone(),
    });
    messages
}
