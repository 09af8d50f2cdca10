//! Event intake queue.
//!
//! Many producers, one consumer. Producers never block: on a bounded queue a
//! full channel means the event is dropped and reported.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::error::TelemetryError;
use super::event::ClickEvent;

pub struct EventQueue {
    tx: Sender<ClickEvent>,
    rx: Receiver<ClickEvent>,
    capacity: Option<usize>,
}

impl EventQueue {
    /// `None` (or `Some(0)`) gives an unbounded queue.
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.filter(|&c| c > 0);
        let (tx, rx) = match capacity {
            Some(cap) => crossbeam_channel::bounded(cap),
            None => crossbeam_channel::unbounded(),
        };

        Self { tx, rx, capacity }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Enqueue without blocking.
    pub fn enqueue(&self, event: ClickEvent) -> Result<(), TelemetryError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TelemetryError::QueueOverflow {
                capacity: self.capacity.unwrap_or_default(),
            }),
            // Both ends live in `self`, so this cannot happen while we exist.
            Err(TrySendError::Disconnected(_)) => Err(TelemetryError::QueueClosed),
        }
    }

    /// Wait up to `timeout` for the next event. Worker only.
    pub fn dequeue_blocking(&self, timeout: Duration) -> Option<ClickEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next event if one is immediately available.
    pub fn try_dequeue(&self) -> Option<ClickEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
