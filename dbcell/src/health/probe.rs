//! Health probe classification.

use crate::constants::health::{PROBE_EXIT_OK, PROBE_EXIT_UNHEALTHY};
use crate::runtime::{ContainerDetails, HealthStatus, ProbeResult};

/// What a single probe run says about the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Probe passed.
    Ok,
    /// Probe ran and reported unhealthy; the runtime will retry it.
    UnhealthyRetryable,
    /// The probe command itself could not execute (exit code above 1).
    ExecutionError(ProbeResult),
}

impl ProbeOutcome {
    pub fn classify(probe: &ProbeResult) -> Self {
        match probe.exit_code {
            PROBE_EXIT_OK => ProbeOutcome::Ok,
            code if code > PROBE_EXIT_UNHEALTHY => ProbeOutcome::ExecutionError(probe.clone()),
            // 1, and negative codes the runtime uses for probe timeouts
            _ => ProbeOutcome::UnhealthyRetryable,
        }
    }
}

/// Point-in-time health of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    /// No health status yet: no health check configured, or not bootstrapped.
    NoHealthcheck,
    Starting,
    Healthy,
    Unhealthy { last_probe: Option<ProbeResult> },
}

impl HealthState {
    pub fn from_details(details: &ContainerDetails) -> Self {
        let Some(health) = &details.health else {
            return HealthState::NoHealthcheck;
        };

        match health.status {
            HealthStatus::None | HealthStatus::Starting => HealthState::Starting,
            HealthStatus::Healthy => HealthState::Healthy,
            HealthStatus::Unhealthy => HealthState::Unhealthy {
                last_probe: health.last_probe().cloned(),
            },
        }
    }
}
