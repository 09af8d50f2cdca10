//! Test doubles shared by the telemetry tests.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::SinkError;
use super::event::{ClickEvent, EventContext, Identity};
use super::sink::Sink;

/// Sink that records every attempt and answers from a script (then `Ok`).
#[derive(Default)]
pub struct ScriptedSink {
    script: Mutex<VecDeque<Result<(), SinkError>>>,
    attempts: Mutex<Vec<Vec<ClickEvent>>>,
    delivered: Mutex<Vec<Vec<ClickEvent>>>,
    delay: Duration,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<(), SinkError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_always(err: SinkError) -> Self {
        Self::with_script(vec![Err(err); 1000])
    }

    pub fn attempts(&self) -> Vec<Vec<ClickEvent>> {
        self.attempts.lock().clone()
    }

    pub fn delivered(&self) -> Vec<Vec<ClickEvent>> {
        self.delivered.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

impl Sink for ScriptedSink {
    fn send(&self, batch: &[ClickEvent]) -> Result<(), SinkError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        self.attempts.lock().push(batch.to_vec());
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.delivered.lock().push(batch.to_vec());
        }
        outcome
    }

    fn destination(&self) -> String {
        "scripted".to_string()
    }
}

pub fn test_context() -> EventContext {
    EventContext::new(Identity::new("0123456789abcdef", "0.0.0-test"))
}

pub fn components(batch: &[ClickEvent]) -> Vec<String> {
    batch.iter().map(|e| e.component().to_string()).collect()
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
