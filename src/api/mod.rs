//! HTTP API server for the Aura gateway

pub mod emotions;
pub mod health;
pub mod sessions;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::emotion::EmotionEvent;
use crate::respond::{ChatResponder, OpenAiSynthesizer, Orchestrator, Responder, Synthesizer};
use crate::session::SessionManager;
use crate::transcribe::{DeepgramRecognizer, SpeechRecognizer, Transcriber, WhisperRecognizer};
use crate::Result;

/// Capacity of the emotion event broadcast channel; lagging display clients
/// skip ahead rather than exerting backpressure
const EMOTION_CHANNEL_CAPACITY: usize = 256;

/// Identities of the configured external models, reported by `/health`
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelInfo {
    pub responder_model: String,
    pub stt_model: String,
    pub tts_model: String,
    pub responder_available: bool,
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Config,
    pub manager: Arc<SessionManager>,
    pub transcriber: Arc<Transcriber>,
    pub orchestrator: Arc<Orchestrator>,
    /// Display side-channel for derived emotion events
    pub emotion_tx: broadcast::Sender<EmotionEvent>,
    pub model_info: ModelInfo,
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Wire up the pipeline components from configuration
    ///
    /// Missing API keys degrade the corresponding tier rather than failing
    /// start-up: the cascades below each component absorb the gap.
    #[must_use]
    pub fn build(config: Config) -> Self {
        let primary: Option<Arc<dyn SpeechRecognizer>> = config
            .api_keys
            .openai
            .clone()
            .and_then(|key| WhisperRecognizer::new(key, config.voice.stt_model.clone()).ok())
            .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>);
        let secondary: Option<Arc<dyn SpeechRecognizer>> = config
            .api_keys
            .deepgram
            .clone()
            .and_then(|key| {
                DeepgramRecognizer::new(key, config.voice.stt_fallback_model.clone()).ok()
            })
            .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>);
        if primary.is_none() {
            tracing::warn!("no primary recognizer configured, transcription will degrade");
        }
        let transcriber = Arc::new(Transcriber::new(
            primary,
            secondary,
            config.voice.call_timeout,
        ));

        let responder: Option<Arc<dyn Responder>> = config
            .api_keys
            .openai
            .clone()
            .and_then(|key| {
                ChatResponder::new(
                    key,
                    config.responder.model.clone(),
                    config.responder.max_tokens,
                )
                .ok()
            })
            .map(|r| Arc::new(r) as Arc<dyn Responder>);

        let synthesizers: Vec<Arc<dyn Synthesizer>> = config
            .api_keys
            .openai
            .clone()
            .and_then(|key| {
                OpenAiSynthesizer::new(
                    key,
                    config.voice.tts_model.clone(),
                    config.voice.tts_voice.clone(),
                    config.voice.tts_speed,
                )
                .ok()
            })
            .map(|s| Arc::new(s) as Arc<dyn Synthesizer>)
            .into_iter()
            .collect();

        let model_info = ModelInfo {
            responder_model: config.responder.model.clone(),
            stt_model: config.voice.stt_model.clone(),
            tts_model: config.voice.tts_model.clone(),
            responder_available: responder.is_some(),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            responder,
            synthesizers,
            config.responder.clone(),
            config.voice.call_timeout,
        ));

        let (emotion_tx, _) = broadcast::channel(EMOTION_CHANNEL_CAPACITY);

        let port = config.api_server.port;
        let state = Arc::new(ApiState {
            manager: Arc::new(SessionManager::new(config.clone())),
            transcriber,
            orchestrator,
            emotion_tx,
            model_info,
            config,
        });

        Self { state, port }
    }

    /// Assemble the full router
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(health::router(Arc::clone(&self.state)))
            .merge(sessions::router(Arc::clone(&self.state)))
            .merge(websocket::router(Arc::clone(&self.state)))
            .merge(emotions::router(Arc::clone(&self.state)))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the process is stopped
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails
    pub async fn serve(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "API server listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Shared handler state, exposed for integration tests
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }
}
