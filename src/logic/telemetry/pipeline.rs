//! Clickstream Pipeline
//!
//! The façade producers talk to. Owns the intake queue, the accumulator and
//! the delivery worker, and tears them down exactly once.
//!
//! Nothing here can fail the host: a sink that cannot be built, a worker that
//! cannot be spawned or a worker that will not stop all degrade to
//! "telemetry incomplete" and a log line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::accumulator::BatchAccumulator;
use super::config::TrackerConfig;
use super::error::TelemetryError;
use super::event::{EventContext, Identity, Metadata};
use super::queue::EventQueue;
use super::sink::Sink;
use super::worker::{DeliveryCounters, DeliveryStats, DeliveryWorker, ShutdownSignal, WorkerHandle};
use crate::logic::cloud_sync::{BigQueryClient, SinkConfig};

/// The one interface event producers depend on.
pub trait Tracker: Send + Sync {
    /// Record an interaction. Fire-and-forget: never blocks, never fails.
    fn track(&self, event_type: &str, component: &str, metadata: Option<&Metadata>);
}

impl<T: Tracker + ?Sized> Tracker for Arc<T> {
    fn track(&self, event_type: &str, component: &str, metadata: Option<&Metadata>) {
        (**self).track(event_type, component, metadata)
    }
}

/// Statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub enabled: bool,
    pub session_id: String,
    pub queue_size: usize,
    pub buffer_size: usize,
    #[serde(flatten)]
    pub counters: DeliveryCounters,
}

struct Running {
    queue: Arc<EventQueue>,
    accumulator: Arc<BatchAccumulator>,
    signal: Arc<ShutdownSignal>,
    stats: Arc<DeliveryStats>,
    worker: Mutex<Option<WorkerHandle>>,
}

pub struct Pipeline {
    context: EventContext,
    running: Option<Running>,
    shut_down: AtomicBool,
    shutdown_timeout: Duration,
}

impl Pipeline {
    /// Start a pipeline, building its sink with `make_sink`.
    ///
    /// Returns a disabled pipeline if tracking is off or the sink (or the
    /// worker thread) cannot be created.
    pub fn start<F>(config: &TrackerConfig, identity: Identity, make_sink: F) -> Self
    where
        F: FnOnce(&SinkConfig) -> Result<Box<dyn Sink>, TelemetryError>,
    {
        let context = EventContext::new(identity);
        let shutdown_timeout = config.shutdown_timeout();

        if !config.enabled {
            log::info!("Clickstream tracking is disabled");
            return Self::inert(context, shutdown_timeout);
        }

        let sink = match make_sink(&config.sink) {
            Ok(sink) => sink,
            Err(e) => {
                log::warn!("{} - clickstream tracking disabled", e);
                return Self::inert(context, shutdown_timeout);
            }
        };

        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        let accumulator = Arc::new(BatchAccumulator::new(config.effective_batch_size()));
        let signal = Arc::new(ShutdownSignal::default());
        let stats = Arc::new(DeliveryStats::default());

        let worker = DeliveryWorker::new(
            Arc::clone(&queue),
            Arc::clone(&accumulator),
            sink,
            Arc::clone(&signal),
            Arc::clone(&stats),
            config.poll_interval(),
        );

        let handle = match worker.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                let err = TelemetryError::ConstructionFailure(format!("worker thread: {}", e));
                log::warn!("{} - clickstream tracking disabled", err);
                return Self::inert(context, shutdown_timeout);
            }
        };

        log::info!(
            "Clickstream tracking enabled (session {})",
            context.session_id()
        );

        Self {
            context,
            running: Some(Running {
                queue,
                accumulator,
                signal,
                stats,
                worker: Mutex::new(Some(handle)),
            }),
            shut_down: AtomicBool::new(false),
            shutdown_timeout,
        }
    }

    /// Start a pipeline delivering to the configured BigQuery table.
    pub fn connect(config: &TrackerConfig, identity: Identity) -> Self {
        Self::start(config, identity, |sink_config| {
            BigQueryClient::new(sink_config.clone()).map(|client| Box::new(client) as Box<dyn Sink>)
        })
    }

    /// Start a pipeline around an already-built sink.
    pub fn with_sink(config: &TrackerConfig, identity: Identity, sink: Box<dyn Sink>) -> Self {
        Self::start(config, identity, move |_| Ok(sink))
    }

    /// A pipeline that ignores everything.
    pub fn disabled(identity: Identity) -> Self {
        Self::inert(EventContext::new(identity), Duration::ZERO)
    }

    fn inert(context: EventContext, shutdown_timeout: Duration) -> Self {
        Self {
            context,
            running: None,
            shut_down: AtomicBool::new(false),
            shutdown_timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.running.is_some()
    }

    pub fn session_id(&self) -> &str {
        self.context.session_id()
    }

    /// Record an interaction. No-op when disabled or after shutdown.
    pub fn track(&self, event_type: &str, component: &str, metadata: Option<&Metadata>) {
        let Some(running) = &self.running else {
            return;
        };
        if self.shut_down.load(Ordering::Acquire) {
            log::debug!("Clickstream event after shutdown ignored: {}", event_type);
            return;
        }

        let event = self.context.event(event_type, component, metadata);
        match running.queue.enqueue(event) {
            Ok(()) => {
                running.stats.tracked.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                running.stats.dropped_at_intake.fetch_add(1, Ordering::Relaxed);
                log::warn!("{} ({} / {})", e, event_type, component);
            }
        }
    }

    /// Flush and stop. Only the first call does anything.
    ///
    /// Blocks the caller for at most the configured shutdown timeout.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(running) = &self.running else {
            return;
        };

        log::info!("Shutting down clickstream tracker...");
        running.signal.request();

        let handle = running.worker.lock().take();
        if let Some(handle) = handle {
            match handle.join_timeout(self.shutdown_timeout) {
                Ok(()) => log::info!("Clickstream tracker shutdown complete"),
                Err(e) => log::warn!("{} - continuing shutdown without it", e),
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        match &self.running {
            Some(running) => PipelineStats {
                enabled: true,
                session_id: self.session_id().to_string(),
                queue_size: running.queue.len(),
                buffer_size: running.accumulator.len(),
                counters: running.stats.snapshot(),
            },
            None => PipelineStats {
                enabled: false,
                session_id: self.session_id().to_string(),
                queue_size: 0,
                buffer_size: 0,
                counters: DeliveryCounters::default(),
            },
        }
    }
}

impl Tracker for Pipeline {
    fn track(&self, event_type: &str, component: &str, metadata: Option<&Metadata>) {
        Pipeline::track(self, event_type, component, metadata)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// TESTS
// ============================================================================
