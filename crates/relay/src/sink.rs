use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::StreamEvent;

/// Explicit sink lifecycle. Transitions only move forward:
/// `Open → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Open,
    Closing,
    Closed,
}

/// A write guard around the downstream event channel.
///
/// Emits are accepted only while `Open`. The first failed send (the
/// downstream receiver is gone) flips the state to `Closed`; every later
/// emit is a no-op rather than an error, so the relay loop can keep
/// draining its current read without special-casing a dead consumer.
pub struct GuardedSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
    state: SinkState,
}

impl GuardedSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx: Some(tx),
            state: SinkState::Open,
        }
    }

    /// Deliver an event downstream. Returns whether it was actually written.
    pub async fn emit(&mut self, event: StreamEvent) -> bool {
        if self.state != SinkState::Open {
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };
        if tx.send(event).await.is_err() {
            tracing::debug!("downstream receiver dropped, suppressing further writes");
            self.state = SinkState::Closed;
            self.tx = None;
            return false;
        }
        true
    }

    /// Idempotent close: releases the sender so the downstream stream ends.
    /// Calling it again is a no-op, never an error.
    pub fn close(&mut self) {
        if self.state == SinkState::Closed {
            return;
        }
        self.state = SinkState::Closing;
        self.tx.take();
        self.state = SinkState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == SinkState::Closed
    }

    pub fn state(&self) -> SinkState {
        self.state
    }
}

/// Caller-driven cancellation signal, observed by the relay loop once per
/// parsed line.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
