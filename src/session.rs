//! Session lifecycle and turn processing
//!
//! A session owns its conversation memory, its emotion ring, and its feed
//! subscription. All mutation flows through the methods here; nothing outside
//! this module touches session state directly. Turns within a session run one
//! at a time; sessions are fully independent of each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{RwLock, broadcast};

use crate::config::Config;
use crate::emotion::{
    EmotionAdapter, EmotionEvent, EmotionFeed, EmotionSample, EventRing, FeedHandle, spawn_feed,
};
use crate::fusion::fuse;
use crate::respond::{Orchestrator, TurnReport};
use crate::store::SegmentStore;
use crate::transcribe::{TranscriptSegment, TranscriptSource, Transcriber};
use crate::{Error, Result};

/// Connection lifecycle state; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether the state machine allows moving to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open)
                | (Self::Connecting | Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

/// Everything the transport layer needs to report one completed turn
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub transcript: TranscriptSegment,
    pub frame_label: crate::emotion::EmotionLabel,
    pub reply_text: String,
    pub reply_audio: Vec<u8>,
    pub report: TurnReport,
    pub sequence_index: u64,
}

/// One active connection and the resources it owns
pub struct Session {
    pub id: String,
    state: Mutex<ConnectionState>,
    store: SegmentStore,
    ring: Arc<EventRing>,
    adapter: Arc<Mutex<EmotionAdapter>>,
    feed: Mutex<Option<FeedHandle>>,
    /// Serializes turn processing; guarantees `sequence_index` ordering
    turn_lock: tokio::sync::Mutex<()>,
    pad_secs: f64,
    history_turns: usize,
}

impl Session {
    #[must_use]
    pub fn new(id: String, config: &Config) -> Self {
        let horizon = config.fusion.pad_secs + config.fusion.purge_margin_secs;
        Self {
            id,
            state: Mutex::new(ConnectionState::Connecting),
            store: SegmentStore::new(config.session.max_segments),
            ring: Arc::new(EventRing::new(config.fusion.ring_capacity, horizon)),
            adapter: Arc::new(Mutex::new(EmotionAdapter::new(config.emotion.clone()))),
            feed: Mutex::new(None),
            turn_lock: tokio::sync::Mutex::new(()),
            pad_secs: config.fusion.pad_secs,
            history_turns: config.responder.history_turns,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether outbound sends are currently permitted
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move the state machine forward
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] on an illegal transition; the caller must
    /// treat that as fatal for the session.
    pub fn transition(&self, next: ConnectionState) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(Error::Invariant(format!(
                "illegal transition {:?} -> {next:?} for session {}",
                *state, self.id
            )));
        }
        tracing::debug!(session_id = %self.id, from = ?*state, to = ?next, "session transition");
        *state = next;
        Ok(())
    }

    /// Ingest one emotion sample arriving over the session transport
    ///
    /// Returns the derived event, when one was emitted, so the caller can
    /// broadcast it on the display side-channel.
    #[must_use]
    pub fn ingest_sample(&self, sample: &EmotionSample) -> Option<EmotionEvent> {
        let event = self
            .adapter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ingest(sample)?;
        self.ring.push(event);
        Some(event)
    }

    /// Attach an out-of-band sample feed; replaces any existing subscription
    ///
    /// The session transport delivers samples in-band (`eeg_sample` messages
    /// and the REST injection endpoint); this is the attachment point for
    /// vendor feeds that push samples over their own connection.
    pub fn attach_feed(
        &self,
        feed: Box<dyn EmotionFeed>,
        broadcast_tx: broadcast::Sender<EmotionEvent>,
        config: &Config,
    ) {
        let handle = spawn_feed(
            feed,
            Arc::clone(&self.adapter),
            Arc::clone(&self.ring),
            broadcast_tx,
            config.emotion.clone(),
        );
        *self
            .feed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
    }

    /// Process one full audio turn: recognition, fusion, response, synthesis
    ///
    /// Turns are serialized per session. If the session leaves `Open` while
    /// the turn is in flight, the result is discarded and no segment is
    /// appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] when the session closed mid-turn.
    pub async fn run_turn(
        &self,
        transcriber: &Transcriber,
        orchestrator: &Orchestrator,
        clip: &[u8],
        end_time: f64,
    ) -> Result<TurnOutput> {
        let _turn = self.turn_lock.lock().await;

        if !self.is_open() {
            return Err(Error::Session(format!("session {} not open", self.id)));
        }

        let transcript = transcriber.transcribe(clip, end_time).await;
        if !self.is_open() {
            tracing::info!(session_id = %self.id, "closed after recognition, dropping turn");
            return Err(Error::Session("session closed mid-turn".to_string()));
        }

        self.complete_turn(transcript, orchestrator).await
    }

    /// Process one typed-text turn through the same fusion and response path
    ///
    /// Recognition is skipped; the message text becomes the utterance, ranged
    /// at its arrival time so nearby emotion events still align with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] for an empty message or when the session
    /// closed mid-turn.
    pub async fn run_text_turn(
        &self,
        orchestrator: &Orchestrator,
        text: &str,
        end_time: f64,
    ) -> Result<TurnOutput> {
        let _turn = self.turn_lock.lock().await;

        if !self.is_open() {
            return Err(Error::Session(format!("session {} not open", self.id)));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Session("empty text message".to_string()));
        }

        let transcript = TranscriptSegment {
            start_time: end_time,
            end_time,
            text: text.to_string(),
            confidence: 1.0,
            source: TranscriptSource::Typed,
        };

        self.complete_turn(transcript, orchestrator).await
    }

    /// Fusion, response, and append shared by the audio and typed turn paths
    async fn complete_turn(
        &self,
        transcript: TranscriptSegment,
        orchestrator: &Orchestrator,
    ) -> Result<TurnOutput> {
        let frame = fuse(transcript.clone(), &self.ring.snapshot(), self.pad_secs);
        let history = self.store.recent(self.history_turns);
        let response = orchestrator.respond(&frame, &history).await;

        // No partial segments: a turn that outlived its session leaves the
        // store untouched
        if !self.is_open() {
            tracing::info!(session_id = %self.id, "closed after response, dropping turn");
            return Err(Error::Session("session closed mid-turn".to_string()));
        }

        let frame_label = frame.label;
        let segment = self.store.append(
            frame,
            response.reply_text.clone(),
            response.reply_audio.clone(),
        );

        Ok(TurnOutput {
            transcript,
            frame_label,
            reply_text: response.reply_text,
            reply_audio: response.reply_audio,
            report: response.report,
            sequence_index: segment.sequence_index,
        })
    }

    /// Read access to the conversation memory
    #[must_use]
    pub const fn store(&self) -> &SegmentStore {
        &self.store
    }

    /// Number of events currently in the emotion ring
    #[must_use]
    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Release owned resources on the way to `Closed`
    fn release(&self) {
        if let Some(handle) = self
            .feed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.shutdown();
        }
    }
}

/// Session registry, keyed by session id
///
/// Constructed once at start-up; entries live from connection establishment
/// to teardown. No session state exists outside this map.
pub struct SessionManager {
    config: Config,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a session in `Connecting` state
    pub async fn create(&self, id: &str) -> Arc<Session> {
        let session = Arc::new(Session::new(id.to_string(), &self.config));
        self.sessions
            .write()
            .await
            .insert(id.to_string(), Arc::clone(&session));
        tracing::info!(session_id = %id, "session created");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tear a session down: `Closing`, release resources, `Closed`, deregister
    ///
    /// Safe to call from any non-terminal state; calling it for an unknown id
    /// is a no-op.
    pub async fn close(&self, id: &str) {
        let Some(session) = self.sessions.write().await.remove(id) else {
            return;
        };
        if session.state() == ConnectionState::Closed {
            return;
        }
        if session.state() != ConnectionState::Closing
            && let Err(e) = session.transition(ConnectionState::Closing)
        {
            tracing::error!(session_id = %id, error = %e, "teardown transition failed");
        }
        session.release();
        if let Err(e) = session.transition(ConnectionState::Closed) {
            tracing::error!(session_id = %id, error = %e, "teardown transition failed");
        }
        tracing::info!(session_id = %id, "session closed");
    }
}
