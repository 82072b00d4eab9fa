//! Per-session REST endpoints: conversation summary and out-of-band EEG
//! sample injection

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::emotion::{EmotionLabel, EmotionSample};

/// Number of recent turns echoed in the summary
const RECENT_TURNS: usize = 3;

/// One recent turn in a session summary
#[derive(Debug, Serialize)]
pub struct TurnSummary {
    pub sequence_index: u64,
    pub user_text: String,
    pub reply_text: String,
    pub label: EmotionLabel,
}

/// Conversation summary for a live session
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub state: String,
    pub turns: usize,
    pub recent: Vec<TurnSummary>,
    pub ring_events: usize,
}

/// One EEG reading delivered over REST instead of the session socket
#[derive(Deserialize)]
pub struct EegSamplePayload {
    /// Seconds since the Unix epoch; defaults to arrival time
    #[serde(default)]
    pub time: Option<f64>,
    pub data: serde_json::Value,
}

/// Acknowledgement for an injected sample
#[derive(Debug, Serialize)]
pub struct EegInjectResponse {
    /// Label of the derived event, when one was emitted
    pub label: Option<EmotionLabel>,
    pub ring_events: usize,
}

/// `GET /sessions/{id}/summary`
async fn summary(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, StatusCode> {
    let session = state
        .manager
        .get(&id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    let recent = session
        .store()
        .recent(RECENT_TURNS)
        .into_iter()
        .map(|s| TurnSummary {
            sequence_index: s.sequence_index,
            user_text: s.frame.segment.text,
            reply_text: s.reply_text,
            label: s.frame.label,
        })
        .collect();

    Ok(Json(SessionSummary {
        session_id: session.id.clone(),
        state: format!("{:?}", session.state()),
        turns: session.store().len(),
        recent,
        ring_events: session.ring_len(),
    }))
}

/// `POST /sessions/{id}/eeg`
///
/// Same ingest path as the in-band `eeg_sample` socket message, for clients
/// that keep EEG delivery on a separate connection.
async fn inject_eeg(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(payload): Json<EegSamplePayload>,
) -> Result<Json<EegInjectResponse>, StatusCode> {
    let session = state
        .manager
        .get(&id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    let sample = EmotionSample::from_json(
        payload.time.unwrap_or_else(crate::epoch_secs),
        &payload.data,
    );
    let event = session.ingest_sample(&sample);
    if let Some(event) = event {
        let _ = state.emotion_tx.send(event);
    }

    Ok(Json(EegInjectResponse {
        label: event.map(|e| e.label),
        ring_events: session.ring_len(),
    }))
}

/// Build session REST router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/sessions/{id}/summary", get(summary))
        .route("/sessions/{id}/eeg", post(inject_eeg))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::ContextFrame;
    use crate::session::ConnectionState;
    use crate::transcribe::{TranscriptSegment, TranscriptSource};
    use crate::{ApiServer, Config};
    use serde_json::json;

    async fn open_state(id: &str) -> Arc<ApiState> {
        let server = ApiServer::build(Config::default());
        let state = server.state();
        let session = state.manager.create(id).await;
        session.transition(ConnectionState::Open).unwrap();
        state
    }

    fn frame(text: &str) -> ContextFrame {
        ContextFrame {
            segment: TranscriptSegment {
                start_time: 0.0,
                end_time: 1.0,
                text: text.to_string(),
                confidence: 0.9,
                source: TranscriptSource::Primary,
            },
            events: Vec::new(),
            label: EmotionLabel::Neutral,
            annotated_text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn summary_turn_count_matches_store_length() {
        let state = open_state("s").await;
        let session = state.manager.get("s").await.unwrap();
        session.store().append(frame("first"), "r0".to_string(), Vec::new());
        session.store().append(frame("second"), "r1".to_string(), Vec::new());

        let Json(summary) = summary(State(Arc::clone(&state)), Path("s".to_string()))
            .await
            .unwrap();
        assert_eq!(summary.turns, session.store().len());
        assert_eq!(summary.turns, 2);
        assert_eq!(summary.recent.len(), 2);
        assert_eq!(summary.recent[1].user_text, "second");
        assert_eq!(summary.state, "Open");
    }

    #[tokio::test]
    async fn summary_recent_is_capped() {
        let state = open_state("s").await;
        let session = state.manager.get("s").await.unwrap();
        for i in 0..5 {
            session
                .store()
                .append(frame(&format!("turn {i}")), String::new(), Vec::new());
        }

        let Json(summary) = summary(State(state), Path("s".to_string()))
            .await
            .unwrap();
        assert_eq!(summary.turns, 5);
        assert_eq!(summary.recent.len(), RECENT_TURNS);
        assert_eq!(summary.recent[0].sequence_index, 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let server = ApiServer::build(Config::default());
        let state = server.state();

        let err = summary(State(Arc::clone(&state)), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);

        let err = inject_eeg(
            State(state),
            Path("nope".to_string()),
            Json(EegSamplePayload {
                time: None,
                data: json!({}),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn injected_sample_reaches_the_session_ring() {
        let state = open_state("s").await;

        let Json(ack) = inject_eeg(
            State(Arc::clone(&state)),
            Path("s".to_string()),
            Json(EegSamplePayload {
                time: Some(50.0),
                data: json!({"stress": 0.9}),
            }),
        )
        .await
        .unwrap();
        assert_eq!(ack.label, Some(EmotionLabel::Stressed));
        assert_eq!(ack.ring_events, 1);

        let session = state.manager.get("s").await.unwrap();
        assert_eq!(session.ring_len(), 1);
    }
}
