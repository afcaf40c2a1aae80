//! Bounded wait-until-ready polling.
//!
//! The remote API has no wait primitive, so every dependency on an
//! asynchronous state transition is expressed as a poll loop with a fixed
//! interval. No backoff and no jitter: the budget is `max_attempts`
//! fetches, optionally capped by a deadline, and the caller can abort at
//! any point through a [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CcmError, Result};

/// Budget of a single wait point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of fetches.
    pub max_attempts: u32,
    /// Sleep between two fetches.
    pub interval: Duration,
    /// Wall-clock cap on the whole wait.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(10),
            deadline: None,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Fetch a resource until `is_ready` holds.
///
/// `fetch` returns `Ok(None)` once the resource no longer exists, which ends
/// the wait with `NotFound`. Fetch errors propagate immediately; only
/// "exists but not ready yet" is retried. Never fetches more than
/// `policy.max_attempts` times.
pub async fn wait_until<T, F, Fut, P>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut fetch: F,
    is_ready: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(CcmError::Cancelled(what.to_string()));
        }

        let Some(resource) = fetch().await? else {
            return Err(CcmError::NotFound(what.to_string()));
        };
        if is_ready(&resource) {
            debug!("{} ready after {} attempt(s)", what, attempt);
            return Ok(resource);
        }
        if attempt == policy.max_attempts {
            break;
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() + policy.interval > deadline {
                warn!("{} not ready before its {:?} deadline", what, deadline);
                return Err(CcmError::NotReady {
                    what: what.to_string(),
                    attempts: attempt,
                });
            }
        }

        debug!(
            "{} is not ready, retry {}/{} in {:?}",
            what, attempt, policy.max_attempts, policy.interval
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(CcmError::Cancelled(what.to_string())),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    warn!("{} not ready after {} attempts", what, policy.max_attempts);
    Err(CcmError::NotReady {
        what: what.to_string(),
        attempts: policy.max_attempts,
    })
}
