//! Emotion feed subscription with bounded-backoff reconnect
//!
//! The vendor protocol that produces samples is out of scope; a feed is
//! anything implementing [`EmotionFeed`]. The subscription task keeps pulling
//! samples, and while the feed is down it emits neutral heartbeat events so
//! downstream fusion degrades instead of stalling.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::Result;
use crate::config::EmotionConfig;

use super::{EmotionAdapter, EmotionEvent, EmotionSample, EventRing};

/// A source of periodic emotion samples
///
/// `next_sample` resolving to `Err` means the underlying transport dropped;
/// the subscription task will retry with backoff and call again.
#[async_trait]
pub trait EmotionFeed: Send {
    async fn next_sample(&mut self) -> Result<EmotionSample>;
}

/// Handle to a running feed subscription; aborts the task on drop
#[derive(Debug)]
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Tear down the subscription
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Compute the delay before the next reconnect attempt
///
/// Exponential backoff `min(base * 2^attempt + jitter, max)`, with jitter of
/// 0-25% derived from the subsecond clock to avoid a dedicated RNG.
#[must_use]
pub fn reconnect_delay(config: &EmotionConfig, attempt: u32) -> Duration {
    let base = config
        .reconnect_base
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(config.reconnect_max);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(config.reconnect_max)
}

/// Spawn the per-session subscription task
///
/// Samples flow through the shared adapter into the session's ring; derived
/// events are also broadcast (best-effort) for the display side-channel.
pub fn spawn_feed(
    mut feed: Box<dyn EmotionFeed>,
    adapter: Arc<Mutex<EmotionAdapter>>,
    ring: Arc<EventRing>,
    broadcast_tx: broadcast::Sender<EmotionEvent>,
    config: EmotionConfig,
) -> FeedHandle {
    let task = tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            match feed.next_sample().await {
                Ok(sample) => {
                    attempt = 0;
                    let derived = adapter
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .ingest(&sample);
                    if let Some(event) = derived {
                        ring.push(event);
                        let _ = broadcast_tx.send(event);
                    }
                }
                Err(e) => {
                    let delay = reconnect_delay(&config, attempt);
                    tracing::warn!(error = %e, attempt, ?delay, "emotion feed dropped, retrying");
                    attempt = attempt.saturating_add(1);

                    // Sleep in heartbeat-sized chunks, emitting a neutral
                    // event per chunk so fusion never sees a silent gap
                    let mut remaining = delay;
                    loop {
                        let event = EmotionEvent::neutral(crate::epoch_secs());
                        ring.push(event);
                        let _ = broadcast_tx.send(event);
                        let chunk = remaining.min(config.heartbeat);
                        tokio::time::sleep(chunk).await;
                        remaining = remaining.saturating_sub(chunk);
                        if remaining.is_zero() {
                            break;
                        }
                    }
                }
            }
        }
    });

    FeedHandle { task }
}
