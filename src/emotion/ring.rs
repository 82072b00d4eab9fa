//! Bounded recent-history ring for emotion events
//!
//! Single writer (the session's ingest path), read in full by the fusion
//! engine once per turn. The lock is never held across an await point.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::EmotionEvent;

/// Bounded, time-horizoned buffer of recent emotion events
#[derive(Debug)]
pub struct EventRing {
    inner: Mutex<VecDeque<EmotionEvent>>,
    capacity: usize,
    /// Events older than this many seconds behind the newest are purged
    horizon_secs: f64,
}

impl EventRing {
    #[must_use]
    pub fn new(capacity: usize, horizon_secs: f64) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            horizon_secs,
        }
    }

    /// Append an event, dropping the oldest entries beyond capacity and
    /// purging entries that have aged out of the alignment horizon
    pub fn push(&self, event: EmotionEvent) {
        let mut ring = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ring.push_back(event);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
        let cutoff = event.timestamp - self.horizon_secs;
        while ring.front().is_some_and(|e| e.timestamp < cutoff) {
            ring.pop_front();
        }
    }

    /// Ordered copy of the current contents, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<EmotionEvent> {
        let ring = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ring.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let ring = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ring.len()
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

    fn event(ts: f64) -> EmotionEvent {
        EmotionEvent {
            timestamp: ts,
            label: EmotionLabel::Engaged,
            intensity: 0.5,
        }
    }

    #[test]
    fn capacity_drops_oldest() {
        let ring = EventRing::new(3, 1000.0);
        for ts in 0..5 {
            ring.push(event(f64::from(ts)));
        }
        let events = ring.snapshot();
        assert_eq!(events.len(), 3);
        assert!((events[0].timestamp - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn horizon_purges_stale_events() {
        let ring = EventRing::new(64, 7.0);
        ring.push(event(1.0));
        ring.push(event(2.0));
        ring.push(event(20.0));
        let events = ring.snapshot();
        // 1.0 and 2.0 are more than 7s behind 20.0
        assert_eq!(events.len(), 1);
        assert!((events[0].timestamp - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_preserves_order() {
        let ring = EventRing::new(8, 1000.0);
        ring.push(event(1.0));
        ring.push(event(2.0));
        ring.push(event(3.0));
        let ts: Vec<f64> = ring.snapshot().iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![1.0, 2.0, 3.0]);
    }
}
