//! Sample-to-event derivation
//!
//! Maintains a rolling window of metric values and emits an [`EmotionEvent`]
//! whenever the derived dominant label changes, or when the heartbeat interval
//! elapses without a change.

use std::collections::VecDeque;

use crate::config::EmotionConfig;

use super::{EmotionEvent, EmotionLabel, EmotionSample, Metrics};

/// Label candidates in priority order; ties resolve to the earlier entry
const PRIORITY: [EmotionLabel; 5] = [
    EmotionLabel::Stressed,
    EmotionLabel::Excited,
    EmotionLabel::Engaged,
    EmotionLabel::Relaxed,
    EmotionLabel::Focused,
];

/// Pick the metric value backing a label candidate
const fn metric_for(label: EmotionLabel, metrics: &Metrics) -> f64 {
    match label {
        EmotionLabel::Stressed => metrics.stress,
        EmotionLabel::Excited => metrics.excitement,
        EmotionLabel::Engaged => metrics.engagement,
        EmotionLabel::Relaxed => metrics.relaxation,
        EmotionLabel::Focused => metrics.attention,
        EmotionLabel::Neutral => 0.0,
    }
}

/// Derive the dominant label and its intensity from one set of metrics
///
/// Returns `Neutral` with zero intensity when every candidate metric is below
/// `min_threshold`.
#[must_use]
pub fn dominant_label(metrics: &Metrics, min_threshold: f64) -> (EmotionLabel, f64) {
    let mut best = (EmotionLabel::Neutral, 0.0_f64);
    for label in PRIORITY {
        let value = metric_for(label, metrics);
        // Strict comparison keeps the earlier (higher-priority) label on ties
        if value >= min_threshold && value > best.1 {
            best = (label, value);
        }
    }
    best
}

/// Converts raw samples into discrete emotion events
///
/// Single-writer: owned by the session's ingest path. Timing decisions use
/// sample timestamps, so derivation is deterministic and replayable.
#[derive(Debug)]
pub struct EmotionAdapter {
    config: EmotionConfig,
    window: VecDeque<Metrics>,
    last_label: Option<EmotionLabel>,
    last_emit_ts: f64,
}

impl EmotionAdapter {
    #[must_use]
    pub fn new(config: EmotionConfig) -> Self {
        Self {
            config,
            window: VecDeque::new(),
            last_label: None,
            last_emit_ts: 0.0,
        }
    }

    /// Ingest one sample; returns an event when the dominant label changed or
    /// the heartbeat interval expired
    pub fn ingest(&mut self, sample: &EmotionSample) -> Option<EmotionEvent> {
        self.window.push_back(sample.metrics);
        while self.window.len() > self.config.smoothing_window {
            self.window.pop_front();
        }

        let smoothed = self.smoothed();
        let (label, intensity) = dominant_label(&smoothed, self.config.min_threshold);

        let heartbeat_due = self.last_label.is_some()
            && sample.timestamp - self.last_emit_ts >= self.config.heartbeat.as_secs_f64();
        let changed = self.last_label != Some(label);

        if changed || heartbeat_due {
            self.last_label = Some(label);
            self.last_emit_ts = sample.timestamp;
            let event = EmotionEvent {
                timestamp: sample.timestamp,
                label,
                intensity,
            };
            tracing::debug!(label = %label, intensity, changed, "emotion event derived");
            return Some(event);
        }
        None
    }

    /// Mean of the rolling window, element-wise
    #[allow(clippy::cast_precision_loss)]
    fn smoothed(&self) -> Metrics {
        let n = self.window.len();
        if n == 0 {
            return Metrics::default();
        }
        let mut sum = Metrics::default();
        for m in &self.window {
            sum.attention += m.attention;
            sum.engagement += m.engagement;
            sum.excitement += m.excitement;
            sum.interest += m.interest;
            sum.relaxation += m.relaxation;
            sum.stress += m.stress;
            sum.theta += m.theta;
            sum.alpha += m.alpha;
            sum.beta += m.beta;
            sum.gamma += m.gamma;
        }
        let n = n as f64;
        Metrics {
            attention: sum.attention / n,
            engagement: sum.engagement / n,
            excitement: sum.excitement / n,
            interest: sum.interest / n,
            relaxation: sum.relaxation / n,
            stress: sum.stress / n,
            theta: sum.theta / n,
            alpha: sum.alpha / n,
            beta: sum.beta / n,
            gamma: sum.gamma / n,
        }
    }
}
