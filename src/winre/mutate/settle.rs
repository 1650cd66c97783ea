//! Bounded polling until the storage stack reflects a change

use std::thread;
use std::time::{Duration, Instant};

use crate::common::progress::{create_spinner, finish_spinner};
use crate::winre::error::ResizeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
        }
    }
}

/// Call `poll` until it yields a value or the timeout passes.
/// Probe errors abort the wait immediately.
pub fn wait_until<T>(
    policy: &SettlePolicy,
    what: &str,
    mut poll: impl FnMut() -> Result<Option<T>, ResizeError>,
) -> Result<T, ResizeError> {
    let deadline = Instant::now() + policy.timeout;
    let spinner = create_spinner(format!("Waiting for {what}..."));

    let outcome = loop {
        match poll() {
            Ok(Some(value)) => break Ok(value),
            Ok(None) => {}
            Err(e) => break Err(e),
        }
        if Instant::now() >= deadline {
            break Err(ResizeError::SettleTimeout(what.to_string()));
        }
        thread::sleep(policy.interval);
    };

    finish_spinner(spinner);
    outcome
}
