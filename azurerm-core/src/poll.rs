//! Poll - Wait for a remote object to reach a target state
//!
//! A refresh function is called at a fixed interval until the state it
//! reports is one of the target states, or the deadline passes. There is no
//! backoff and no jitter.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::provider::ProviderError;

/// Outcome of one refresh call: `None` when the object was not found,
/// otherwise the fetched value and its current state string
pub type RefreshResult<T> = Result<Option<(T, String)>, ProviderError>;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("timeout while waiting for state to become '{}' (last state: '{}', timeout: {:?})", expected.join(", "), last_state.as_deref().unwrap_or(""), timeout)]
    Timeout {
        last_state: Option<String>,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: usize },

    #[error("{0}")]
    Refresh(#[from] ProviderError),
}

impl From<PollError> for ProviderError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::Refresh(inner) => inner,
            other => ProviderError::new(other.to_string()).with_cause(other),
        }
    }
}

/// Configuration of a state wait
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// Wait before the first refresh
    pub delay: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Consecutive not-found results tolerated while waiting for a target
    pub not_found_checks: usize,
    /// Consecutive target results required before succeeding
    pub continuous_target_occurence: usize,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            timeout,
            not_found_checks: 20,
            continuous_target_occurence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: usize) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurence(mut self, occurrences: usize) -> Self {
        self.continuous_target_occurence = occurrences.max(1);
        self
    }

    /// Poll `refresh` until a target state is reached
    ///
    /// Returns `Ok(None)` only when `target` is empty and the object
    /// disappeared, which is how deletions are awaited.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state: Option<String> = None;
        let mut not_found = 0;
        let mut target_hits = 0;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout_error(last_state));
            }

            match refresh().await? {
                None => {
                    target_hits = 0;
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(PollError::NotFound {
                            checks: not_found - 1,
                        });
                    }
                    log::debug!(
                        "Resource not found yet ({} of {})",
                        not_found,
                        self.not_found_checks
                    );
                }
                Some((value, state)) => {
                    not_found = 0;
                    log::debug!(
                        "Waiting for state to become: [{}] (current: {})",
                        self.target.join(", "),
                        state
                    );
                    if self.target.contains(&state) {
                        target_hits += 1;
                        if target_hits >= self.continuous_target_occurence {
                            return Ok(Some(value));
                        }
                    } else if self.pending.contains(&state) {
                        target_hits = 0;
                    } else {
                        return Err(PollError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    last_state = Some(state);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error(last_state));
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    fn timeout_error(&self, last_state: Option<String>) -> PollError {
        PollError::Timeout {
            last_state,
            expected: self.target.clone(),
            timeout: self.timeout,
        }
    }
}
