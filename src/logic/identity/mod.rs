//! Installation Identity Module
//!
//! Provides the stable, pseudonymous user ID stamped on every clickstream
//! event. The raw OS identifier never leaves the machine, only its hash.

pub mod machine_id;

pub use machine_id::{get_machine_id, hash_identifier};
