//! Worker supervision
//!
//! Workers only return when something they cannot retry themselves went
//! wrong (a storage or filesystem error), or when they panic. The supervisor
//! logs the failure, waits an exponential backoff and starts a fresh
//! incarnation. Too many consecutive failures are escalated to the caller.

use crate::config::SupervisorConfig;
use crate::HarvestError;
use std::any::Any;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// When and how often a failed worker is restarted
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Consecutive failures tolerated; the next one is escalated
    pub max_restarts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// An incarnation that lived this long resets the failure count
    pub healthy_after: Duration,
}

impl RestartPolicy {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            max_restarts: config.max_restarts,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            healthy_after: config.healthy_after(),
        }
    }

    /// Delay before restarting after the `failures`-th consecutive failure
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs the worker produced by `spawn_worker`, restarting it on failure
///
/// Returns `Ok(())` when an incarnation exits cleanly (or its task is
/// cancelled), and `HarvestError::WorkerExhausted` once the policy gives up.
///
/// The running incarnation is owned by the supervisor: dropping or aborting
/// the supervisor's future aborts the worker task as well.
pub async fn supervise<F, Fut>(
    worker: &'static str,
    policy: RestartPolicy,
    mut spawn_worker: F,
) -> Result<(), HarvestError>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), HarvestError>> + Send + 'static,
{
    let mut failures = 0u32;

    loop {
        let started = Instant::now();
        let mut incarnation = JoinSet::new();
        incarnation.spawn(spawn_worker());

        let Some(joined) = incarnation.join_next().await else {
            return Ok(());
        };
        let failure = match joined {
            Ok(Ok(())) => {
                tracing::info!(worker, "Worker exited");
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(join_err) if join_err.is_panic() => HarvestError::WorkerPanicked {
                worker,
                message: panic_message(join_err.into_panic()),
            },
            Err(_) => {
                tracing::info!(worker, "Worker task was cancelled");
                return Ok(());
            }
        };

        if started.elapsed() >= policy.healthy_after {
            failures = 0;
        }
        failures += 1;

        if failures > policy.max_restarts {
            tracing::error!(worker, failures, "Worker failed too often, giving up: {}", failure);
            return Err(HarvestError::WorkerExhausted {
                worker,
                restarts: failures - 1,
                last_error: failure.to_string(),
            });
        }

        let delay = policy.backoff(failures);
        tracing::error!(worker, failures, ?delay, "Worker failed, restarting: {}", failure);
        tokio::time::sleep(delay).await;
    }
}
