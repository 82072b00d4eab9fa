//! Context fusion engine
//!
//! Aligns a finalized transcript segment with the emotion events that
//! co-occurred with it. `fuse` is a pure function of its inputs: same segment
//! plus same ordered event set always yields the same frame.

use serde::{Deserialize, Serialize};

use crate::emotion::{EmotionEvent, EmotionLabel};
use crate::transcribe::TranscriptSegment;

/// A transcript segment annotated with co-occurring emotional state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub segment: TranscriptSegment,
    /// Events within the alignment window, in input order
    pub events: Vec<EmotionEvent>,
    /// Dominant label over the window; `Neutral` when no event qualifies
    pub label: EmotionLabel,
    /// Utterance text, with an emotion marker appended when one was observed
    pub annotated_text: String,
}

/// Fuse a transcript segment with recent emotion events
///
/// Selects events with timestamps in `[start_time - pad, end_time + pad]`,
/// both bounds inclusive. The dominant label is the qualifying event with the
/// highest intensity, ties broken by the most recent timestamp. With no
/// qualifying events (or only neutral ones) the annotation is the raw text;
/// emotion markers are observed, never fabricated.
#[must_use]
pub fn fuse(segment: TranscriptSegment, recent_events: &[EmotionEvent], pad: f64) -> ContextFrame {
    let lo = segment.start_time - pad;
    let hi = segment.end_time + pad;

    let events: Vec<EmotionEvent> = recent_events
        .iter()
        .filter(|e| e.timestamp >= lo && e.timestamp <= hi)
        .copied()
        .collect();

    let dominant = events
        .iter()
        .copied()
        .max_by(|a, b| {
            a.intensity
                .partial_cmp(&b.intensity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.timestamp
                        .partial_cmp(&b.timestamp)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

    let label = dominant.map_or(EmotionLabel::Neutral, |e| e.label);

    let annotated_text = if label == EmotionLabel::Neutral {
        segment.text.clone()
    } else {
        format!("{} [emotion: {label}]", segment.text)
    };

    tracing::debug!(
        events = events.len(),
        label = %label,
        window = ?(lo, hi),
        "fused context frame"
    );

    ContextFrame {
        segment,
        events,
        label,
        annotated_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::TranscriptSource;

    fn segment(start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            start_time: start,
            end_time: end,
            text: "I had a rough day".to_string(),
            confidence: 0.9,
            source: TranscriptSource::Primary,
        }
    }

    fn event(ts: f64, label: EmotionLabel, intensity: f64) -> EmotionEvent {
        EmotionEvent {
            timestamp: ts,
            label,
            intensity,
        }
    }

    #[test]
    fn no_events_yields_neutral_and_raw_text() {
        let frame = fuse(segment(10.0, 12.0), &[], 2.0);
        assert_eq!(frame.label, EmotionLabel::Neutral);
        assert_eq!(frame.annotated_text, "I had a rough day");
        assert!(frame.events.is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        // utterance [10, 12], pad 2 → window [8, 14]
        let events = vec![
            event(7.9, EmotionLabel::Stressed, 0.9),
            event(8.0, EmotionLabel::Stressed, 0.8),
            event(14.0, EmotionLabel::Relaxed, 0.5),
            event(14.1, EmotionLabel::Relaxed, 0.9),
        ];
        let frame = fuse(segment(10.0, 12.0), &events, 2.0);
        assert_eq!(frame.events.len(), 2);
        assert!((frame.events[0].timestamp - 8.0).abs() < f64::EPSILON);
        assert!((frame.events[1].timestamp - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dominant_is_highest_intensity() {
        let events = vec![
            event(10.5, EmotionLabel::Relaxed, 0.4),
            event(11.0, EmotionLabel::Stressed, 0.9),
            event(11.5, EmotionLabel::Engaged, 0.6),
        ];
        let frame = fuse(segment(10.0, 12.0), &events, 2.0);
        assert_eq!(frame.label, EmotionLabel::Stressed);
        assert_eq!(frame.annotated_text, "I had a rough day [emotion: stressed]");
    }

    #[test]
    fn intensity_tie_breaks_by_recency() {
        let events = vec![
            event(10.5, EmotionLabel::Stressed, 0.7),
            event(11.5, EmotionLabel::Excited, 0.7),
        ];
        let frame = fuse(segment(10.0, 12.0), &events, 2.0);
        assert_eq!(frame.label, EmotionLabel::Excited);
    }

    #[test]
    fn only_neutral_events_keeps_raw_text() {
        let events = vec![event(11.0, EmotionLabel::Neutral, 0.0)];
        let frame = fuse(segment(10.0, 12.0), &events, 2.0);
        assert_eq!(frame.label, EmotionLabel::Neutral);
        assert_eq!(frame.annotated_text, "I had a rough day");
        assert_eq!(frame.events.len(), 1);
    }

    #[test]
    fn fuse_is_deterministic() {
        let events = vec![
            event(9.0, EmotionLabel::Stressed, 0.8),
            event(13.0, EmotionLabel::Relaxed, 0.3),
        ];
        let a = fuse(segment(10.0, 12.0), &events, 2.0);
        let b = fuse(segment(10.0, 12.0), &events, 2.0);
        assert_eq!(a, b);
    }
}
