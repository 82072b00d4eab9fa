//! Emotion display side-channel
//!
//! A read-only WebSocket feed of derived emotion events for dashboards and
//! visualizers. Subscribers that fall behind skip ahead to live events;
//! a slow display never backpressures the conversational pipeline.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
    routing::get,
};
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;

/// Build emotion feed router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws/emotions", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let mut rx = state.emotion_tx.subscribe();
    ws.on_upgrade(move |mut socket| async move {
        tracing::debug!("emotion display client connected");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "emotion display client lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("emotion display client disconnected");
    })
}
