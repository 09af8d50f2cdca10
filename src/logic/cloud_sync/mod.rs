//! Cloud Sync Module - Clickstream delivery to the analytics store
//!
//! This module handles:
//! - Destination configuration (project / dataset / table)
//! - Streaming inserts of event batches
//! - Classifying store failures for the retry policy

pub mod client;

pub use client::{BigQueryClient, SinkConfig};
