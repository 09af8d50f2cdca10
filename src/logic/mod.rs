//! Logic Module - Timer, identity and clickstream telemetry.

pub mod cloud_sync;
pub mod identity;
pub mod telemetry;
pub mod timer;
