//! Emotion event pipeline
//!
//! Normalizes a periodic physiological sample feed (EMOTIV-style performance
//! metrics and band powers) into discrete, timestamped emotion events that the
//! fusion engine can align with speech.

pub mod adapter;
pub mod feed;
pub mod ring;

pub use adapter::EmotionAdapter;
pub use feed::{EmotionFeed, FeedHandle, spawn_feed};
pub use ring::EventRing;

use serde::{Deserialize, Serialize};

/// Discrete emotional state label derived from physiological metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Stressed,
    Excited,
    Engaged,
    Relaxed,
    Focused,
    Neutral,
}

impl EmotionLabel {
    /// Wire/display name for the label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stressed => "stressed",
            Self::Excited => "excited",
            Self::Engaged => "engaged",
            Self::Relaxed => "relaxed",
            Self::Focused => "focused",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized metric values from one reading, all in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub attention: f64,
    pub engagement: f64,
    pub excitement: f64,
    pub interest: f64,
    pub relaxation: f64,
    pub stress: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// One raw periodic reading from the signal source
///
/// Not retained beyond event derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionSample {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub metrics: Metrics,
}

impl EmotionSample {
    /// Parse a sample from a JSON payload
    ///
    /// Accepts three wire shapes: the EMOTIV `met` short-key format, the `pow`
    /// band-power format, and a generic flat format with full metric names.
    #[must_use]
    pub fn from_json(timestamp: f64, data: &serde_json::Value) -> Self {
        let metrics = if let Some(met) = data.get("met") {
            Metrics {
                attention: num(met, "att"),
                engagement: num(met, "eng"),
                excitement: num(met, "exc"),
                interest: num(met, "int"),
                relaxation: num(met, "rel"),
                stress: num(met, "str"),
                ..Metrics::default()
            }
        } else if let Some(pow) = data.get("pow") {
            Metrics {
                theta: num(pow, "theta"),
                alpha: num(pow, "alpha"),
                beta: num(pow, "beta"),
                gamma: num(pow, "gamma"),
                ..Metrics::default()
            }
        } else {
            Metrics {
                attention: num(data, "attention"),
                engagement: num(data, "engagement"),
                excitement: num(data, "excitement"),
                interest: num(data, "interest"),
                relaxation: num(data, "relaxation"),
                stress: num(data, "stress"),
                theta: num(data, "theta"),
                alpha: num(data, "alpha"),
                beta: num(data, "beta"),
                gamma: num(data, "gamma"),
            }
        };

        Self { timestamp, metrics }
    }
}

/// A discrete labeled state derived from one or more samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionEvent {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub label: EmotionLabel,
    /// Normalized value of the winning metric, `0.0` for neutral
    pub intensity: f64,
}

impl EmotionEvent {
    /// A neutral placeholder event, used for heartbeats while the feed is down
    #[must_use]
    pub const fn neutral(timestamp: f64) -> Self {
        Self {
            timestamp,
            label: EmotionLabel::Neutral,
            intensity: 0.0,
        }
    }
}

fn num(value: &serde_json::Value, key: &str) -> f64 {
    value.get(key).and_then(serde_json::Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_emotiv_met_format() {
        let data = json!({"met": {"att": 0.4, "eng": 0.5, "exc": 0.1, "int": 0.2, "rel": 0.3, "str": 0.8}});
        let sample = EmotionSample::from_json(100.0, &data);
        assert!((sample.metrics.stress - 0.8).abs() < f64::EPSILON);
        assert!((sample.metrics.attention - 0.4).abs() < f64::EPSILON);
        assert!((sample.metrics.theta).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_band_power_format() {
        let data = json!({"pow": {"theta": 0.2, "alpha": 0.6, "beta": 0.3, "gamma": 0.1}});
        let sample = EmotionSample::from_json(100.0, &data);
        assert!((sample.metrics.alpha - 0.6).abs() < f64::EPSILON);
        assert!((sample.metrics.stress).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_generic_format() {
        let data = json!({"stress": 0.9, "relaxation": 0.1});
        let sample = EmotionSample::from_json(5.0, &data);
        assert!((sample.metrics.stress - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let sample = EmotionSample::from_json(0.0, &json!({}));
        assert_eq!(sample.metrics, Metrics::default());
    }

    #[test]
    fn label_serializes_snake_case() {
        let json = serde_json::to_string(&EmotionLabel::Stressed).unwrap();
        assert_eq!(json, "\"stressed\"");
    }
}
