//! Configuration management for the Aura gateway

use std::time::Duration;

/// Aura gateway configuration
///
/// Read-only after start-up; every session snapshots the pieces it needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Context fusion tunables
    pub fusion: FusionConfig,

    /// Emotion adapter tunables
    pub emotion: EmotionConfig,

    /// Voice pipeline configuration (STT/TTS backends)
    pub voice: VoiceConfig,

    /// Response generation configuration
    pub responder: ResponderConfig,

    /// Per-session limits
    pub session: SessionConfig,

    /// API keys for external services
    pub api_keys: ApiKeys,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,
}

/// Context fusion tunables
///
/// The alignment pad and purge margin are deliberately tunable; the upstream
/// material fixes neither, so these defaults are working values, not contracts.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Alignment window padding around an utterance, in seconds
    pub pad_secs: f64,

    /// Capacity of the per-session emotion event ring
    pub ring_capacity: usize,

    /// Events older than `pad_secs + purge_margin_secs` behind the newest
    /// event are dropped from the ring
    pub purge_margin_secs: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            pad_secs: 2.0,
            ring_capacity: 64,
            purge_margin_secs: 5.0,
        }
    }
}

/// Emotion adapter tunables
#[derive(Debug, Clone)]
pub struct EmotionConfig {
    /// Emit a heartbeat event after this long without a label change
    pub heartbeat: Duration,

    /// Metrics below this value never become a dominant label
    pub min_threshold: f64,

    /// Number of recent samples averaged before label derivation
    pub smoothing_window: usize,

    /// Base delay for feed reconnect backoff
    pub reconnect_base: Duration,

    /// Cap on feed reconnect backoff
    pub reconnect_max: Duration,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(10),
            min_threshold: 0.3,
            smoothing_window: 3,
            reconnect_base: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Primary STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Secondary STT model for the fallback tier (e.g. "nova-2")
    pub stt_fallback_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Per-call timeout for recognizer and synthesizer requests
    pub call_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            stt_fallback_model: "nova-2".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            call_timeout: Duration::from_secs(20),
        }
    }
}

/// Response generation configuration
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Chat completion model identifier
    pub model: String,

    /// Maximum tokens per reply
    pub max_tokens: u32,

    /// Number of prior conversation segments included in the prompt
    pub history_turns: usize,

    /// Per-call timeout for the responder request
    pub call_timeout: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            history_turns: 6,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-session limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum retained conversation segments; oldest evicted beyond this
    pub max_segments: usize,

    /// Close the session after this long without an inbound message
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_segments: 256,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT, TTS, and chat responder)
    pub openai: Option<String>,

    /// `Deepgram` API key (secondary STT)
    pub deepgram: Option<String>,
}

impl Config {
    /// Load configuration from environment variables with defaults
    ///
    /// Reads `AURA_PORT`, `AURA_FUSION_PAD_SECS`, `AURA_HEARTBEAT_SECS`,
    /// `AURA_LLM_MODEL`, `AURA_STT_MODEL`, `AURA_TTS_MODEL`, `AURA_TTS_VOICE`,
    /// `OPENAI_API_KEY`, and `DEEPGRAM_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("AURA_PORT") {
            config.api_server.port = port;
        }
        if let Some(pad) = env_parse::<f64>("AURA_FUSION_PAD_SECS") {
            config.fusion.pad_secs = pad;
        }
        if let Some(secs) = env_parse::<u64>("AURA_HEARTBEAT_SECS") {
            config.emotion.heartbeat = Duration::from_secs(secs);
        }
        if let Ok(model) = std::env::var("AURA_LLM_MODEL") {
            config.responder.model = model;
        }
        if let Ok(model) = std::env::var("AURA_STT_MODEL") {
            config.voice.stt_model = model;
        }
        if let Ok(model) = std::env::var("AURA_TTS_MODEL") {
            config.voice.tts_model = model;
        }
        if let Ok(voice) = std::env::var("AURA_TTS_VOICE") {
            config.voice.tts_voice = voice;
        }
        config.api_keys.openai = std::env::var("OPENAI_API_KEY").ok();
        config.api_keys.deepgram = std::env::var("DEEPGRAM_API_KEY").ok();

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_server: ApiServerConfig { port: 8000 },
            fusion: FusionConfig::default(),
            emotion: EmotionConfig::default(),
            voice: VoiceConfig::default(),
            responder: ResponderConfig::default(),
            session: SessionConfig::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

/// Parse an environment variable, ignoring unset or malformed values
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
