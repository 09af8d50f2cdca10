//! Delivery Worker
//!
//! The single background thread that moves events from the intake queue into
//! the accumulator and hands full batches to the sink.
//!
//! ```text
//!          event            should_flush
//!   Idle ────────▶ append ──────────────▶ Draining ──▶ Sending ──▶ Idle
//!    │                                                   │
//!    │ shutdown requested            Ok: count delivered │
//!    ▼                               NotFound/Rejected: discard
//!  ShuttingDown ──▶ Terminated       Transient/Unknown: restore (capped)
//! ```
//!
//! Only one send is ever in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use super::accumulator::BatchAccumulator;
use super::error::{SinkError, TelemetryError};
use super::event::ClickEvent;
use super::queue::EventQueue;
use super::sink::Sink;

// ============================================================================
// SHARED STATE
// ============================================================================

/// One-way shutdown flag, observed by the worker between polls
#[derive(Debug, Default)]
pub struct ShutdownSignal(AtomicBool);

impl ShutdownSignal {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Delivery counters, updated by producers and the worker
#[derive(Debug, Default)]
pub struct DeliveryStats {
    pub tracked: AtomicU64,
    pub dropped_at_intake: AtomicU64,
    pub delivered: AtomicU64,
    pub batches_sent: AtomicU64,
    pub failed_sends: AtomicU64,
    pub discarded: AtomicU64,
    pub evicted: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounters {
    pub tracked: u64,
    pub dropped_at_intake: u64,
    pub delivered: u64,
    pub batches_sent: u64,
    pub failed_sends: u64,
    pub discarded: u64,
    pub evicted: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryCounters {
        DeliveryCounters {
            tracked: self.tracked.load(Ordering::Relaxed),
            dropped_at_intake: self.dropped_at_intake.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

// ============================================================================
// WORKER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Draining,
    Sending,
    ShuttingDown,
    Terminated,
}

/// What happened to a drained batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Delivered(usize),
    Discarded(usize),
    Retained(usize),
}

pub struct DeliveryWorker {
    queue: Arc<EventQueue>,
    accumulator: Arc<BatchAccumulator>,
    sink: Box<dyn Sink>,
    signal: Arc<ShutdownSignal>,
    stats: Arc<DeliveryStats>,
    poll_interval: Duration,
    state: WorkerState,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<EventQueue>,
        accumulator: Arc<BatchAccumulator>,
        sink: Box<dyn Sink>,
        signal: Arc<ShutdownSignal>,
        stats: Arc<DeliveryStats>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            accumulator,
            sink,
            signal,
            stats,
            poll_interval,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name("clickstream-worker".to_string())
            .spawn(move || {
                // Dropped on return or unwind; that is the completion signal.
                let _done: Sender<()> = done_tx;
                self.run();
            })?;

        Ok(WorkerHandle {
            thread,
            done: done_rx,
        })
    }

    /// Main loop. Returns once shutdown has been requested and the final
    /// flush has been attempted.
    pub fn run(mut self) {
        log::info!(
            "Clickstream worker started (batch size {}, destination {})",
            self.accumulator.batch_size(),
            self.sink.destination()
        );

        while !self.signal.is_requested() {
            self.state = WorkerState::Idle;
            if let Some(event) = self.queue.dequeue_blocking(self.poll_interval) {
                self.accept(event);
                if self.accumulator.should_flush() {
                    self.flush();
                }
            }
        }

        self.shut_down();
    }

    fn accept(&self, event: ClickEvent) {
        self.accumulator.append(event);
    }

    fn trim(&self) {
        let evicted = self.accumulator.trim_overflow();
        if evicted > 0 {
            DeliveryStats::add(&self.stats.evicted, evicted);
            log::debug!("Retry buffer over capacity, evicted {} oldest event(s)", evicted);
        }
    }

    /// Drain the accumulator and make one send attempt.
    pub fn flush(&mut self) -> FlushOutcome {
        let previous = self.state;
        self.state = WorkerState::Draining;
        let batch = self.accumulator.drain_for_send();
        if batch.is_empty() {
            self.state = previous;
            return FlushOutcome::Empty;
        }

        self.state = WorkerState::Sending;
        let count = batch.len();

        let outcome = match self.sink.send(&batch) {
            Ok(()) => {
                DeliveryStats::add(&self.stats.delivered, count);
                DeliveryStats::add(&self.stats.batches_sent, 1);
                log::info!(
                    "Delivered {} clickstream events to {}",
                    count,
                    self.sink.destination()
                );
                FlushOutcome::Delivered(count)
            }
            Err(err @ SinkError::NotFound(_)) => {
                DeliveryStats::add(&self.stats.failed_sends, 1);
                DeliveryStats::add(&self.stats.discarded, count);
                log::error!(
                    "{} ({}); discarding {} events. Provision the destination table to enable tracking.",
                    TelemetryError::from(err),
                    self.sink.destination(),
                    count
                );
                FlushOutcome::Discarded(count)
            }
            Err(err @ SinkError::Rejected { .. }) => {
                DeliveryStats::add(&self.stats.failed_sends, 1);
                DeliveryStats::add(&self.stats.discarded, count);
                log::warn!(
                    "{} ({}); discarding {} events",
                    TelemetryError::from(err),
                    self.sink.destination(),
                    count
                );
                FlushOutcome::Discarded(count)
            }
            Err(err) => {
                DeliveryStats::add(&self.stats.failed_sends, 1);
                let evicted = self.accumulator.restore(batch);
                DeliveryStats::add(&self.stats.evicted, evicted);
                let retained = count - evicted.min(count);
                log::warn!(
                    "{}; retaining {} events for retry ({} evicted)",
                    TelemetryError::from(err),
                    self.accumulator.len(),
                    evicted
                );
                FlushOutcome::Retained(retained)
            }
        };

        self.state = previous;
        outcome
    }

    /// Pull whatever is left in the queue, then force a final send.
    fn shut_down(&mut self) {
        self.state = WorkerState::ShuttingDown;
        log::info!("Clickstream worker shutting down...");

        // Keep sending full batches while the sink accepts them; after a
        // failure only accumulate, under the same overflow rule as a retry.
        let mut sink_healthy = true;
        let mut pulled = 0usize;
        while let Some(event) = self.queue.try_dequeue() {
            pulled += 1;
            self.accept(event);
            if !sink_healthy {
                self.trim();
            } else if self.accumulator.should_flush() {
                sink_healthy = matches!(self.flush(), FlushOutcome::Delivered(_));
            }
        }
        if pulled > 0 {
            log::debug!("Drained {} queued events during shutdown", pulled);
        }

        if !self.accumulator.is_empty() {
            log::info!(
                "Flushing {} remaining clickstream events...",
                self.accumulator.len()
            );
        }
        if let FlushOutcome::Retained(_) = self.flush() {
            log::warn!(
                "{} clickstream events undelivered at shutdown",
                self.accumulator.len()
            );
        }

        self.state = WorkerState::Terminated;
        log::info!("Clickstream worker stopped");
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Join handle with a bounded wait
pub struct WorkerHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait up to `timeout` for the worker to finish. On timeout the thread
    /// is detached and left to finish (or die with the process) on its own.
    pub fn join_timeout(self, timeout: Duration) -> Result<(), TelemetryError> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    log::error!("Clickstream worker panicked");
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(TelemetryError::ShutdownTimeout(timeout)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
