//! Conversation segment store
//!
//! Ordered, session-scoped, append-only memory of conversational turns.
//! Append is the sole mutator and is atomic with respect to readers: a reader
//! sees the store either before or after a turn, never mid-construction.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fusion::ContextFrame;

/// One persisted conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSegment {
    /// Monotonic, session-scoped, gap-free index starting at 0
    pub sequence_index: u64,
    /// User side of the turn
    pub frame: ContextFrame,
    pub reply_text: String,
    /// Opaque synthesized audio (may be a silent clip on degraded turns)
    pub reply_audio: Vec<u8>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    segments: VecDeque<ConversationSegment>,
    next_index: u64,
}

/// Append-only per-session turn memory with FIFO eviction beyond a cap
#[derive(Debug)]
pub struct SegmentStore {
    inner: RwLock<Inner>,
    max_segments: usize,
}

impl SegmentStore {
    #[must_use]
    pub fn new(max_segments: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_segments,
        }
    }

    /// Append one completed turn, returning the stored segment
    ///
    /// Evicts the oldest segment once the cap is exceeded; indices keep
    /// increasing across evictions.
    pub fn append(
        &self,
        frame: ContextFrame,
        reply_text: String,
        reply_audio: Vec<u8>,
    ) -> ConversationSegment {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let segment = ConversationSegment {
            sequence_index: inner.next_index,
            frame,
            reply_text,
            reply_audio,
            generated_at: Utc::now(),
        };
        inner.next_index += 1;
        inner.segments.push_back(segment.clone());
        while inner.segments.len() > self.max_segments {
            inner.segments.pop_front();
        }
        segment
    }

    /// The last `n` segments in order
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ConversationSegment> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = inner.segments.len().saturating_sub(n);
        inner.segments.iter().skip(skip).cloned().collect()
    }

    /// The full retained sequence in order
    #[must_use]
    pub fn all(&self) -> Vec<ConversationSegment> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.segments.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .segments
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionLabel;
    use crate::transcribe::{TranscriptSegment, TranscriptSource};

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

    #[test]
    fn indices_are_monotonic_and_gap_free() {
        let store = SegmentStore::new(100);
        for i in 0..5 {
            let s = store.append(frame(&format!("turn {i}")), "ok".to_string(), Vec::new());
            assert_eq!(s.sequence_index, i);
        }
        let indices: Vec<u64> = store.all().iter().map(|s| s.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn recent_returns_suffix_in_order() {
        let store = SegmentStore::new(100);
        for i in 0..5 {
            store.append(frame(&format!("turn {i}")), String::new(), Vec::new());
        }
        let recent = store.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence_index, 3);
        assert_eq!(recent[1].sequence_index, 4);
    }

    #[test]
    fn recent_larger_than_len_returns_all() {
        let store = SegmentStore::new(100);
        store.append(frame("only"), String::new(), Vec::new());
        assert_eq!(store.recent(10).len(), 1);
    }

    #[test]
    fn cap_evicts_oldest_but_indices_keep_growing() {
        let store = SegmentStore::new(3);
        for i in 0..6 {
            store.append(frame(&format!("turn {i}")), String::new(), Vec::new());
        }
        let all = store.all();
        assert_eq!(all.len(), 3);
        let indices: Vec<u64> = all.iter().map(|s| s.sequence_index).collect();
        assert_eq!(indices, vec![3, 4, 5]);
    }

    #[test]
    fn concurrent_readers_never_see_partial_state() {
        use std::sync::Arc;

        let store = Arc::new(SegmentStore::new(1000));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.append(frame(&format!("turn {i}")), "r".to_string(), Vec::new());
                }
            })
        };
        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let all = store.all();
                    for (i, pair) in all.windows(2).enumerate() {
                        assert_eq!(
                            pair[1].sequence_index,
                            pair[0].sequence_index + 1,
                            "gap at position {i}"
                        );
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }
}
