//! Telemetry Module
//!
//! Clickstream tracking: UI interaction events recorded without blocking the
//! caller and shipped in batches to the analytics store.
//!
//! ## Structure
//! - `event.rs` - ClickEvent (immutable, timestamped) and its identity context
//! - `queue.rs` - Non-blocking intake queue (many producers, one consumer)
//! - `accumulator.rs` - Bounded batch buffer with retry overflow policy
//! - `sink.rs` - Destination trait
//! - `worker.rs` - Background delivery thread
//! - `pipeline.rs` - Façade: start / track / shutdown
//!
//! ## Usage
//! ```no_run
//! use timeleft::logic::telemetry::{Identity, Pipeline, TrackerConfig};
//!
//! // Initialize at app start
//! let pipeline = Pipeline::connect(&TrackerConfig::default(), Identity::current());
//!
//! // Record events throughout the app
//! pipeline.track("button_click", "start_button", None);
//!
//! // Shutdown at app exit
//! pipeline.shutdown();
//! ```

pub mod accumulator;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use accumulator::BatchAccumulator;
pub use config::TrackerConfig;
pub use error::{SinkError, TelemetryError};
pub use event::{ClickEvent, EventContext, Identity, Metadata};
pub use pipeline::{Pipeline, PipelineStats, Tracker};
pub use queue::EventQueue;
pub use sink::Sink;
pub use worker::{DeliveryCounters, DeliveryWorker, FlushOutcome, WorkerState};
