//! Sink - where delivered batches go.

use std::sync::Arc;

use super::error::SinkError;
use super::event::ClickEvent;

/// A remote analytics destination.
///
/// `send` is only ever called from the delivery worker, one batch at a time.
pub trait Sink: Send + Sync {
    /// Write a batch. The batch is lent for the duration of the attempt.
    fn send(&self, batch: &[ClickEvent]) -> Result<(), SinkError>;

    /// Human-readable destination for diagnostics
    fn destination(&self) -> String {
        "sink".to_string()
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn send(&self, batch: &[ClickEvent]) -> Result<(), SinkError> {
        (**self).send(batch)
    }

    fn destination(&self) -> String {
        (**self).destination()
    }
}
