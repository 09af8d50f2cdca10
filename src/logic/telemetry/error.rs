//! Telemetry error types.
//!
//! Nothing in here ever reaches the host application: the pipeline logs
//! these and carries on with "telemetry incomplete".

use std::time::Duration;

use thiserror::Error;

/// Failures of the telemetry pipeline itself.
#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    /// Intake queue at capacity, event dropped
    #[error("event queue full (capacity {capacity}), event dropped")]
    QueueOverflow { capacity: usize },

    /// Destination missing or misconfigured, batch discarded
    #[error("sink destination not found: {0}")]
    SinkNotFound(String),

    /// Store refused the rows, batch discarded
    #[error("sink rejected {rows} rows: {reason}")]
    SinkRejected { rows: usize, reason: String },

    /// Intake queue has no receiver left
    #[error("event queue closed, event dropped")]
    QueueClosed,

    /// Network/quota/availability failure, batch will be retried
    #[error("transient sink failure: {0}")]
    SinkTransient(String),

    /// Sink could not be created, pipeline runs disabled
    #[error("telemetry sink construction failed: {0}")]
    ConstructionFailure(String),

    /// Worker did not terminate within the shutdown bound
    #[error("delivery worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Outcome of a failed `Sink::send`, classified by what the worker should do.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Destination does not exist; retrying cannot succeed
    #[error("destination not found: {0}")]
    NotFound(String),

    /// Store refused the rows themselves; retrying cannot succeed
    #[error("{rows} rows rejected: {reason}")]
    Rejected { rows: usize, reason: String },

    /// Network, quota or server error
    #[error("transient error: {0}")]
    Transient(String),

    /// Unclassified failure, handled like `Transient`
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SinkError {
    /// Whether the batch should be restored and sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Transient(_) | SinkError::Unknown(_))
    }
}

impl From<SinkError> for TelemetryError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::NotFound(msg) => TelemetryError::SinkNotFound(msg),
            SinkError::Rejected { rows, reason } => TelemetryError::SinkRejected { rows, reason },
            SinkError::Transient(msg) | SinkError::Unknown(msg) => {
                TelemetryError::SinkTransient(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SinkError::Transient("503".into()).is_retryable());
        assert!(SinkError::Unknown("?".into()).is_retryable());
        assert!(!SinkError::NotFound("table".into()).is_retryable());
        assert!(!SinkError::Rejected { rows: 2, reason: "bad schema".into() }.is_retryable());
    }

    #[test]
    fn test_sink_error_conversion() {
        let err: TelemetryError = SinkError::Unknown("boom".into()).into();
        assert!(matches!(err, TelemetryError::SinkTransient(ref m) if m == "boom"));

        let err: TelemetryError = SinkError::NotFound("t".into()).into();
        assert!(matches!(err, TelemetryError::SinkNotFound(_)));
    }

    #[test]
    fn test_rejected_rows_keep_their_own_message() {
        let err: TelemetryError = SinkError::Rejected {
            rows: 3,
            reason: "row 0: no such field".into(),
        }
        .into();
        assert!(matches!(err, TelemetryError::SinkRejected { rows: 3, .. }));
        assert_eq!(err.to_string(), "sink rejected 3 rows: row 0: no such field");
    }

    #[test]
    fn test_closed_queue_is_not_overflow() {
        let msg = TelemetryError::QueueClosed.to_string();
        assert!(!msg.contains("full"));
        assert!(msg.contains("closed"));
    }
}
