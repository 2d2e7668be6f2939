//! Single-writer outbound path for a session.
//!
//! Every producer (runtime audio, coordinator pushes, keep-alive frames)
//! enqueues routes on one bounded channel; the session's sender task is the
//! only code that writes to the socket.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::codec::WireEvent;

/// Default bound on a blocking send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes drained by the session sender task.
#[derive(Debug, Clone)]
pub enum SessionRoute {
    /// Serialize and send as a text frame.
    Event(WireEvent),
    /// Already-serialized text frame, shared across sessions.
    Prepared(Arc<str>),
    /// Send a close frame and stop the sender task.
    Close,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Session transport is closed")]
    Closed,
    #[error("Outbound queue is full")]
    Full,
    #[error("Outbound send timed out after {0:?}")]
    Timeout(Duration),
}

/// Cloneable handle onto a session's outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundSink {
    tx: mpsc::Sender<SessionRoute>,
    send_timeout: Duration,
}

impl OutboundSink {
    pub fn new(tx: mpsc::Sender<SessionRoute>, send_timeout: Duration) -> Self {
        Self { tx, send_timeout }
    }

    /// Sink plus the receiving end, for the sender task or tests.
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<SessionRoute>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, send_timeout), rx)
    }

    /// True once the sender task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Enqueue without waiting.
    pub fn try_push(&self, route: SessionRoute) -> Result<(), SinkError> {
        self.tx.try_send(route).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    /// Enqueue, waiting at most the configured send timeout for capacity.
    pub async fn push(&self, route: SessionRoute) -> Result<(), SinkError> {
        match tokio::time::timeout(self.send_timeout, self.tx.send(route)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SinkError::Closed),
            Err(_) => Err(SinkError::Timeout(self.send_timeout)),
        }
    }

    /// Convenience for event routes.
    pub async fn push_event(&self, event: WireEvent) -> Result<(), SinkError> {
        self.push(SessionRoute::Event(event)).await
    }
}
