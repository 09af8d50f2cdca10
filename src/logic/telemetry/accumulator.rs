//! Batch Accumulator
//!
//! Pending events waiting for the next send.
//!
//! Overflow is handled when a failed batch comes back: if the retained
//! content exceeds `OVERFLOW_FACTOR * batch_size`, only the most recent
//! `batch_size` events survive. Between failures the buffer only grows by
//! what was appended since the last send.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::event::ClickEvent;
use crate::constants::OVERFLOW_FACTOR;

pub struct BatchAccumulator {
    batch_size: usize,
    cap: usize,
    buffer: Mutex<VecDeque<ClickEvent>>,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let cap = batch_size * OVERFLOW_FACTOR;

        Self {
            batch_size,
            cap,
            buffer: Mutex::new(VecDeque::with_capacity(cap)),
        }
    }

    pub fn append(&self, event: ClickEvent) {
        self.buffer.lock().push_back(event);
    }

    pub fn should_flush(&self) -> bool {
        self.buffer.lock().len() >= self.batch_size
    }

    /// Take everything currently buffered, leaving an empty buffer behind.
    pub fn drain_for_send(&self) -> Vec<ClickEvent> {
        let drained = std::mem::take(&mut *self.buffer.lock());
        drained.into()
    }

    /// Put back events that failed to send, ahead of anything newer.
    ///
    /// If the result would exceed the overflow cap only the most recent
    /// `batch_size` events survive. Returns the number evicted.
    pub fn restore(&self, failed: Vec<ClickEvent>) -> usize {
        let mut buffer = self.buffer.lock();

        let newer = std::mem::take(&mut *buffer);
        let mut combined: VecDeque<ClickEvent> = failed.into();
        combined.extend(newer);

        let evicted = self.truncate(&mut combined);
        *buffer = combined;
        evicted
    }

    /// Apply the overflow rule to what is buffered now, without a send.
    /// Returns the number evicted.
    pub fn trim_overflow(&self) -> usize {
        self.truncate(&mut self.buffer.lock())
    }

    fn truncate(&self, buffer: &mut VecDeque<ClickEvent>) -> usize {
        if buffer.len() <= self.cap {
            return 0;
        }
        let evicted = buffer.len() - self.batch_size;
        buffer.drain(..evicted);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Largest buffer that survives a failed send untruncated
    pub fn overflow_cap(&self) -> usize {
        self.cap
    }
}
