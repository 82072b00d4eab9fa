//! WebSocket session transport
//!
//! One socket is one session: the handler owns the session's lifecycle from
//! `Connecting` through `Closed` and dispatches inbound messages to the
//! emotion and transcript adapters. Outbound messages are serialized through
//! a per-session channel in send order, and nothing is written once the
//! session leaves `Open`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine as _;
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiState;
use crate::emotion::{EmotionLabel, EmotionSample};
use crate::respond::AudioTier;
use crate::session::{ConnectionState, Session, TurnOutput};
use crate::transcribe::TranscriptSource;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// One finished utterance clip, base64 WAV
    Audio { audio: String },
    /// One typed user message
    Text { text: String },
    /// One periodic EEG reading
    EegSample {
        /// Seconds since the Unix epoch; defaults to arrival time
        #[serde(default)]
        time: Option<f64>,
        data: serde_json::Value,
    },
    /// Keepalive
    Ping,
}

/// Outgoing WebSocket message to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Session ready
    Welcome {
        session_id: String,
        capabilities: Capabilities,
    },
    /// Recognized (or degraded) user text
    Transcription {
        text: String,
        source: TranscriptSource,
    },
    /// Reply with synthesized audio
    AudioResponse { text: String, audio: String },
    /// Reply text only, audio unavailable this turn
    TextResponse { text: String },
    /// EEG sample acknowledgement; label present when an event was derived
    EegReceived { label: Option<EmotionLabel> },
    /// Error occurred
    Error { message: String },
    /// Keepalive response
    Pong,
}

/// What this gateway can do for the connected client
#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub eeg_integration: bool,
    pub emotional_awareness: bool,
    pub responder: bool,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws/chat", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Handle one WebSocket connection for its whole lifetime
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, session_id: String) {
    let (mut sender, receiver) = socket.split();

    let session = state.manager.create(&session_id).await;
    if let Err(e) = session.transition(ConnectionState::Open) {
        tracing::error!(session_id = %session_id, error = %e, "handshake failed");
        state.manager.close(&session_id).await;
        return;
    }

    // Outbound delivery: serialized per session, refused once state leaves Open
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);
    let session_for_send = Arc::clone(&session);
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if !session_for_send.is_open() {
                break;
            }
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let welcome = WsOutgoing::Welcome {
        session_id: session_id.clone(),
        capabilities: Capabilities {
            eeg_integration: true,
            emotional_awareness: true,
            responder: state.model_info.responder_available,
        },
    };
    if tx.send(welcome).await.is_err() {
        state.manager.close(&session_id).await;
        return;
    }
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let idle_timeout = state.config.session.idle_timeout;
    let mut recv_task = tokio::spawn(recv_loop(
        receiver,
        Arc::clone(&state),
        Arc::clone(&session),
        tx,
        session_id.clone(),
        idle_timeout,
    ));

    // Either direction ending tears the session down; in-flight turn futures
    // are dropped with the receive task, so no partial segment is appended
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.manager.close(&session_id).await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Dispatch inbound messages until the socket ends, the client closes, the
/// idle deadline passes, or a fatal defect surfaces
async fn recv_loop<S>(
    mut receiver: S,
    state: Arc<ApiState>,
    session: Arc<Session>,
    tx: mpsc::Sender<WsOutgoing>,
    session_id: String,
    idle_timeout: Duration,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let msg = match tokio::time::timeout(idle_timeout, receiver.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(_) => break,
            Err(_) => {
                tracing::info!(session_id = %session_id, "session idle timeout");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                if let Err(e) = handle_message(&text, &state, &session, &tx).await {
                    // Invariant violations are fatal for the session;
                    // everything else is reported and the session lives on
                    if matches!(e, crate::Error::Invariant(_)) {
                        tracing::error!(session_id = %session_id, error = %e, "fatal session defect");
                        break;
                    }
                    let _ = tx
                        .send(WsOutgoing::Error {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket closed by client");
                break;
            }
            _ => {}
        }
    }
}

/// Handle a single inbound message
async fn handle_message(
    text: &str,
    state: &Arc<ApiState>,
    session: &Arc<Session>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    let incoming: WsIncoming = serde_json::from_str(text)
        .map_err(|e| crate::Error::Session(format!("invalid message: {e}")))?;

    match incoming {
        WsIncoming::Ping => {
            send(tx, WsOutgoing::Pong).await?;
        }
        WsIncoming::EegSample { time, data } => {
            let sample =
                EmotionSample::from_json(time.unwrap_or_else(crate::epoch_secs), &data);
            let event = session.ingest_sample(&sample);
            if let Some(event) = event {
                // Best-effort display broadcast
                let _ = state.emotion_tx.send(event);
            }
            send(
                tx,
                WsOutgoing::EegReceived {
                    label: event.map(|e| e.label),
                },
            )
            .await?;
        }
        WsIncoming::Text { text } => {
            let output = session
                .run_text_turn(&state.orchestrator, &text, crate::epoch_secs())
                .await?;
            send_reply(tx, &output).await?;
        }
        WsIncoming::Audio { audio } => {
            let clip = base64::engine::general_purpose::STANDARD
                .decode(audio)
                .map_err(|e| crate::Error::Audio(format!("invalid base64 clip: {e}")))?;

            let output = session
                .run_turn(
                    &state.transcriber,
                    &state.orchestrator,
                    &clip,
                    crate::epoch_secs(),
                )
                .await?;

            send(
                tx,
                WsOutgoing::Transcription {
                    text: output.transcript.text.clone(),
                    source: output.transcript.source,
                },
            )
            .await?;
            send_reply(tx, &output).await?;
        }
    }

    Ok(())
}

/// Send the reply half of a completed turn
///
/// A silent clip means audio was unavailable this turn; the client gets text
/// rather than a wav of nothing.
async fn send_reply(tx: &mpsc::Sender<WsOutgoing>, output: &TurnOutput) -> crate::Result<()> {
    let reply = if output.report.audio_tier == AudioTier::Silent {
        WsOutgoing::TextResponse {
            text: output.reply_text.clone(),
        }
    } else {
        WsOutgoing::AudioResponse {
            text: output.reply_text.clone(),
            audio: base64::engine::general_purpose::STANDARD.encode(&output.reply_audio),
        }
    };
    send(tx, reply).await
}

async fn send(tx: &mpsc::Sender<WsOutgoing>, msg: WsOutgoing) -> crate::Result<()> {
    tx.send(msg)
        .await
        .map_err(|_| crate::Error::Session("outbound channel closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiServer, Config};

    async fn open_session_state(id: &str) -> (Arc<ApiState>, Arc<Session>) {
        let server = ApiServer::build(Config::default());
        let state = server.state();
        let session = state.manager.create(id).await;
        session.transition(ConnectionState::Open).unwrap();
        (state, session)
    }

    #[test]
    fn audio_message_deserializes() {
        let json = r#"{"type":"audio","audio":"AAAA"}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, WsIncoming::Audio { .. }));
    }

    #[test]
    fn text_message_deserializes() {
        let json = r#"{"type":"text","text":"hello there"}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, WsIncoming::Text { .. }));
    }

    #[test]
    fn eeg_sample_deserializes_with_and_without_time() {
        let json = r#"{"type":"eeg_sample","time":12.5,"data":{"met":{"str":0.8}}}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, WsIncoming::EegSample { time: Some(_), .. }));

        let json = r#"{"type":"eeg_sample","data":{"stress":0.5}}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, WsIncoming::EegSample { time: None, .. }));
    }

    #[test]
    fn welcome_serializes_with_type_tag() {
        let msg = WsOutgoing::Welcome {
            session_id: "abc".to_string(),
            capabilities: Capabilities {
                eeg_integration: true,
                emotional_awareness: true,
                responder: false,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"session_id\":\"abc\""));
    }

    #[test]
    fn transcription_carries_source_tier() {
        let msg = WsOutgoing::Transcription {
            text: "hello".to_string(),
            source: TranscriptSource::DurationHeuristic,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"source\":\"duration_heuristic\""));
    }

    #[test]
    fn text_response_has_no_audio_field() {
        let msg = WsOutgoing::TextResponse {
            text: "hi".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"text_response\""));
        assert!(!json.contains("audio"));
    }

    #[test]
    fn eeg_received_label_is_optional() {
        let json =
            serde_json::to_string(&WsOutgoing::EegReceived { label: None }).unwrap();
        assert!(json.contains("\"label\":null"));
        let json = serde_json::to_string(&WsOutgoing::EegReceived {
            label: Some(EmotionLabel::Stressed),
        })
        .unwrap();
        assert!(json.contains("\"label\":\"stressed\""));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_receiver_ends_the_loop() {
        let (state, session) = open_session_state("idle").await;
        let (tx, _rx) = mpsc::channel(8);

        // A stream that never yields: only the idle deadline can end the loop
        recv_loop(
            futures::stream::pending(),
            state,
            session,
            tx,
            "idle".to_string(),
            Duration::from_secs(300),
        )
        .await;
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (state, session) = open_session_state("ping").await;
        let (tx, mut rx) = mpsc::channel(8);

        let stream = futures::stream::iter(vec![Ok(Message::Text(
            r#"{"type":"ping"}"#.into(),
        ))])
        .chain(futures::stream::pending());
        let task = tokio::spawn(recv_loop(
            stream,
            state,
            session,
            tx,
            "ping".to_string(),
            Duration::from_secs(300),
        ));

        let msg = rx.recv().await.expect("pong within deadline");
        assert!(matches!(msg, WsOutgoing::Pong));
        task.abort();
    }

    #[tokio::test]
    async fn malformed_message_reports_error() {
        let (state, session) = open_session_state("bad").await;
        let (tx, mut rx) = mpsc::channel(8);

        let stream = futures::stream::iter(vec![Ok(Message::Text("{not json".into()))])
            .chain(futures::stream::pending());
        let task = tokio::spawn(recv_loop(
            stream,
            state,
            session,
            tx,
            "bad".to_string(),
            Duration::from_secs(300),
        ));

        let msg = rx.recv().await.expect("error within deadline");
        assert!(matches!(msg, WsOutgoing::Error { .. }));
        task.abort();
    }

    #[tokio::test]
    async fn typed_message_yields_a_reply() {
        let (state, session) = open_session_state("typed").await;
        let (tx, mut rx) = mpsc::channel(8);

        let stream = futures::stream::iter(vec![Ok(Message::Text(
            r#"{"type":"text","text":"good evening"}"#.into(),
        ))])
        .chain(futures::stream::pending());
        let task = tokio::spawn(recv_loop(
            stream,
            Arc::clone(&state),
            Arc::clone(&session),
            tx,
            "typed".to_string(),
            Duration::from_secs(300),
        ));

        // No responder or synthesizer configured: canned text, silent audio,
        // so the reply arrives as text_response
        let msg = rx.recv().await.expect("reply within deadline");
        assert!(matches!(msg, WsOutgoing::TextResponse { .. }));
        assert_eq!(session.store().len(), 1);
        task.abort();
    }
}
