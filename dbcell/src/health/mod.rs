//! Container readiness polling.
//!
//! ```text
//!            ┌──────── tick (1s) ────────┐
//!            ▼                           │
//!        Polling ── inspect ── no status / starting / probe exit 0|1
//!            │
//!            ├── healthy              → Healthy
//!            ├── unhealthy            → Unhealthy
//!            ├── probe exit > 1       → ProbeExecutionError
//!            └── cancellation         → Cancelled
//! ```
//!
//! There is no internal deadline; the caller's cancellation token is the only
//! bound on how long [`ReadinessPoller::wait_ready`] runs.

mod probe;

pub use probe::{HealthState, ProbeOutcome};

use crate::constants::{health::POLL_INTERVAL, ops};
use crate::runtime::{
    ContainerDetails, ContainerRef, HealthStatus, ProbeResult, SharedRuntime, cancellable,
};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use tokio_util::sync::CancellationToken;

/// Poller state. Everything except `Polling` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Healthy,
    Unhealthy {
        retries: Option<i64>,
        last_probe: Option<ProbeResult>,
    },
    Cancelled,
    ProbeExecutionError(ProbeResult),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }

    /// Decide the next state from one inspection.
    pub fn evaluate(details: &ContainerDetails) -> Self {
        let Some(health) = &details.health else {
            return PollState::Polling;
        };

        match health.status {
            HealthStatus::Healthy => return PollState::Healthy,
            HealthStatus::Unhealthy => {
                return PollState::Unhealthy {
                    retries: details.healthcheck_retries,
                    last_probe: health.last_probe().cloned(),
                };
            }
            HealthStatus::None | HealthStatus::Starting => {}
        }

        match health.last_probe().map(ProbeOutcome::classify) {
            Some(ProbeOutcome::ExecutionError(probe)) => PollState::ProbeExecutionError(probe),
            _ => PollState::Polling,
        }
    }

    fn into_result(self) -> DbcellResult<()> {
        let op = ops::READINESS.to_string();
        match self {
            PollState::Healthy => Ok(()),
            PollState::Unhealthy {
                retries,
                last_probe,
            } => {
                let (last_exit_code, last_output) = match last_probe {
                    Some(probe) => (Some(probe.exit_code), Some(probe.output)),
                    None => (None, None),
                };
                Err(DbcellError::Unhealthy {
                    op,
                    retries,
                    last_exit_code,
                    last_output,
                })
            }
            PollState::ProbeExecutionError(probe) => Err(DbcellError::ProbeExecution {
                op,
                exit_code: probe.exit_code,
                output: probe.output,
            }),
            PollState::Cancelled => Err(DbcellError::Cancelled { op }),
            PollState::Polling => Err(DbcellError::Internal(
                "readiness poller finished while still polling".into(),
            )),
        }
    }
}

/// Waits for a container's health check to settle.
#[derive(Clone)]
pub struct ReadinessPoller {
    runtime: SharedRuntime,
}

impl ReadinessPoller {
    pub fn new(runtime: SharedRuntime) -> Self {
        Self { runtime }
    }

    /// Poll once per second until the container is healthy, confirmed
    /// unhealthy, its probe cannot execute, or `cancel` fires.
    ///
    /// Cancellation always surfaces as [`DbcellError::Cancelled`].
    pub async fn wait_ready(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> DbcellResult<()> {
        tracing::info!(container = %container, "Check container readiness");

        let state = self.poll(container, cancel).await?;
        match &state {
            PollState::Healthy => tracing::info!(container = %container, "Container is healthy"),
            PollState::Cancelled => {
                tracing::debug!(container = %container, "Readiness check cancelled")
            }
            other => tracing::warn!(container = %container, state = ?other, "Container is not ready"),
        }
        state.into_result()
    }

    async fn poll(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> DbcellResult<PollState> {
        loop {
            if cancel.is_cancelled() {
                return Ok(PollState::Cancelled);
            }

            let inspected = cancellable(ops::READINESS, cancel, async {
                self.runtime
                    .container_inspect(container.id())
                    .await
                    .map_err(|e| {
                        DbcellError::inspection(
                            ops::READINESS,
                            format!("failed to inspect container {}: {}", container, e),
                        )
                    })
            })
            .await;

            let details = match inspected {
                Err(e) if e.is_cancelled() => return Ok(PollState::Cancelled),
                other => other?,
            };

            let state = PollState::evaluate(&details);
            if state.is_terminal() {
                return Ok(state);
            }

            tracing::info!(
                container = %container,
                health = ?HealthState::from_details(&details),
                "Container is not ready yet"
            );

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = cancel.cancelled() => return Ok(PollState::Cancelled),
            }
        }
    }
}
