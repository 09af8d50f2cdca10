//! HL VOX TimeLEFT
//!
//! Pomodoro timer core with asynchronous clickstream telemetry.

pub mod constants;
pub mod logic;
