//! Keep-alive audio injection during slow lookups.
//!
//! Silent media frames are serialized once at startup and shared by every
//! session. While a tool call runs, a background task cycles through the
//! schedule, sending one frame per step until it is cancelled or the
//! session transport goes away.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::codec::{AudioFrame, WireEvent};
use crate::core::session::{OutboundSink, SessionRoute, SinkError};

/// Default schedule: 200ms, 500ms, then 1000ms of silence, five seconds apart.
pub const DEFAULT_KEEPALIVE_SCHEDULE: &str = "200:5000,500:5000,1000:5000";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid keep-alive step '{0}', expected <duration_ms>:<interval_ms>")]
    InvalidStep(String),
    #[error("Keep-alive step '{0}' must have non-zero duration and interval")]
    ZeroStep(String),
}

/// One step: send `frame_ms` of silence after waiting `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveStep {
    pub frame_ms: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveSchedule {
    steps: Vec<KeepAliveStep>,
}

impl KeepAliveSchedule {
    pub fn new(steps: Vec<KeepAliveStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[KeepAliveStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for KeepAliveSchedule {
    fn default() -> Self {
        let step = |frame_ms| KeepAliveStep {
            frame_ms,
            interval: Duration::from_secs(5),
        };
        Self::new(vec![step(200), step(500), step(1000)])
    }
}

impl FromStr for KeepAliveSchedule {
    type Err = ScheduleError;

    /// Parses `"200:5000,500:5000"`; blank input gives an empty schedule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (frame, interval) = part
                .split_once(':')
                .ok_or_else(|| ScheduleError::InvalidStep(part.to_string()))?;
            let frame_ms: u32 = frame
                .trim()
                .parse()
                .map_err(|_| ScheduleError::InvalidStep(part.to_string()))?;
            let interval_ms: u64 = interval
                .trim()
                .parse()
                .map_err(|_| ScheduleError::InvalidStep(part.to_string()))?;
            if frame_ms == 0 || interval_ms == 0 {
                return Err(ScheduleError::ZeroStep(part.to_string()));
            }
            steps.push(KeepAliveStep {
                frame_ms,
                interval: Duration::from_millis(interval_ms),
            });
        }
        Ok(Self::new(steps))
    }
}

/// Pre-serialized silent media frames, one per schedule step.
#[derive(Debug)]
pub struct KeepAliveFrames {
    frames: Vec<(KeepAliveStep, Arc<str>)>,
    sample_rate: u32,
}

impl KeepAliveFrames {
    /// Render every step's silence at `sample_rate` and serialize it once.
    pub fn prepare(
        schedule: &KeepAliveSchedule,
        sample_rate: u32,
    ) -> Result<Self, serde_json::Error> {
        let frames = schedule
            .steps()
            .iter()
            .map(|step| {
                let silence = AudioFrame::silence(step.frame_ms, sample_rate);
                let text = WireEvent::media_from_pcm(silence.data()).to_json()?;
                Ok((*step, Arc::<str>::from(text)))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        Ok(Self {
            frames,
            sample_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame(&self, index: usize) -> Option<&Arc<str>> {
        self.frames.get(index).map(|(_, text)| text)
    }
}

/// Counts running keep-alive tasks and remembers the peak.
#[derive(Debug, Clone, Default)]
pub struct ActiveTasks {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ActiveGuard {
        let now = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        ActiveGuard {
            inner: self.inner.clone(),
        }
    }
}

struct ActiveGuard {
    inner: Arc<Counters>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a running keep-alive task.
#[derive(Debug)]
pub struct KeepAliveHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepAliveHandle {
    /// Cancel the task and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await
            && !e.is_cancelled()
        {
            debug!(error = %e, "Keep-alive task ended abnormally");
        }
    }

    /// Cancel without waiting. Used when the owner is dropped mid-call.
    pub fn abort(self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start emitting keep-alive frames on `sink` until `cancel` fires.
pub fn spawn_keepalive(
    frames: Arc<KeepAliveFrames>,
    sink: OutboundSink,
    cancel: CancellationToken,
    tracker: &ActiveTasks,
    call_id: String,
) -> KeepAliveHandle {
    let guard = tracker.enter();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let _guard = guard;
        let mut sent = 0usize;

        for (step, frame) in frames.frames.iter().cycle() {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(step.interval) => {}
            }

            if sink.is_closed() {
                debug!(call_id = %call_id, "Session closed, stopping keep-alive");
                break;
            }

            match sink.try_push(SessionRoute::Prepared(frame.clone())) {
                Ok(()) => {
                    sent += 1;
                    debug!(call_id = %call_id, frame_ms = step.frame_ms, "Sent keep-alive frame");
                }
                Err(SinkError::Closed) => break,
                Err(e) => debug!(call_id = %call_id, error = %e, "Skipped keep-alive frame"),
            }
        }

        debug!(call_id = %call_id, sent, "Keep-alive task finished");
    });

    KeepAliveHandle { cancel, task }
}
