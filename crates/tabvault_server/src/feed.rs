//! The sample feed.
//!
//! A [`NumberFeed`] task produces one [`Sample`] per interval and publishes it
//! into a [`SampleChannel`], a single-slot, last-write-wins cell. Any number
//! of [`SampleReader`]s read the slot independently; they see either nothing
//! (before the first tick) or one whole sample, never a partial one.

use crate::audit::EventLog;
use chrono::{Local, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One produced value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local wall-clock time, ISO 8601 with microseconds.
    pub timestamp: String,
    /// Uniform value in `[0, 1)`.
    pub value: f64,
}

/// Single-slot holder of the most recent sample.
#[derive(Debug)]
pub struct SampleChannel {
    slot: watch::Sender<Option<Arc<Sample>>>,
}

impl SampleChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Replaces the current sample.
    pub fn publish(&self, sample: Sample) {
        self.slot.send_replace(Some(Arc::new(sample)));
    }

    /// Returns a new reader of this channel.
    pub fn reader(&self) -> SampleReader {
        SampleReader {
            slot: self.slot.subscribe(),
        }
    }
}

impl Default for SampleChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`SampleChannel`].
#[derive(Debug, Clone)]
pub struct SampleReader {
    slot: watch::Receiver<Option<Arc<Sample>>>,
}

impl SampleReader {
    /// The most recently published sample, if any.
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.slot.borrow().clone()
    }
}

/// Hands out strictly increasing local timestamps.
#[derive(Debug, Default)]
struct SampleClock {
    last: Option<NaiveDateTime>,
}

impl SampleClock {
    fn next(&mut self) -> String {
        let mut now = Local::now().naive_local();
        if let Some(last) = self.last {
            // Wall clocks step backwards; produce order wins.
            if now <= last {
                now = last + TimeDelta::microseconds(1);
            }
        }
        self.last = Some(now);
        now.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Periodic producer of random samples.
#[derive(Debug)]
pub struct NumberFeed {
    channel: Arc<SampleChannel>,
    interval: Duration,
    history: Option<Arc<EventLog>>,
}

impl NumberFeed {
    /// Creates a feed publishing into `channel` every `interval`.
    pub fn new(channel: Arc<SampleChannel>, interval: Duration) -> Self {
        Self {
            channel,
            interval,
            history: None,
        }
    }

    /// Also appends every sample to `log`, best-effort.
    pub fn with_history(mut self, log: Arc<EventLog>) -> Self {
        self.history = Some(log);
        self
    }

    /// Starts producing on the current Tokio runtime. The first sample is
    /// published immediately. Abort the handle to stop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut clock = SampleClock::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let sample = Sample {
                timestamp: clock.next(),
                value: rand::random::<f64>(),
            };

            debug!(timestamp = %sample.timestamp, value = sample.value, "produced sample");
            let pending = self.history.as_ref().map(|log| (Arc::clone(log), sample.clone()));
            self.channel.publish(sample);
            if let Some((log, sample)) = pending {
                record(log, sample).await;
            }
        }
    }
}

/// Writes `sample` to the history log on the blocking pool.
async fn record(log: Arc<EventLog>, sample: Sample) {
    match tokio::task::spawn_blocking(move || log.append(&sample)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to record sample"),
        Err(e) => warn!(error = %e, "sample recorder task failed"),
    }
}
