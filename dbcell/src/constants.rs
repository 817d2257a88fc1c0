//! Timing and naming constants.
//!
//! Centralized location for values the supervision core relies on.

/// Readiness polling
pub mod health {
    use std::time::Duration;

    /// Interval between container inspections. Fixed, not configurable.
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Probe exit code for a passing health check
    pub const PROBE_EXIT_OK: i64 = 0;

    /// Probe exit code for a failing but retryable health check
    pub const PROBE_EXIT_UNHEALTHY: i64 = 1;
}

/// Exec sessions
pub mod exec {
    use std::time::Duration;

    /// How long an abandoned demux task may take to wind down before it is
    /// aborted.
    pub const DEMUX_CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Container log retrieval
pub mod logs {
    use std::time::Duration;

    /// Window of recent container logs attached to diagnostics.
    pub const RECENT_WINDOW: Duration = Duration::from_secs(10);
}

/// Environment variables
pub mod env {
    pub const DOCKER_HOST: &str = "DBCELL_DOCKER_HOST";
    pub const DOCKER_HOST_FALLBACK: &str = "DOCKER_HOST";
    pub const DOCKER_TIMEOUT: &str = "DBCELL_DOCKER_TIMEOUT";
    pub const LOG_DIR: &str = "DBCELL_LOG_DIR";
}

/// Operation names carried by errors
pub mod ops {
    pub const EXEC: &str = "exec";
    pub const EXEC_FOREGROUND: &str = "exec foreground";
    pub const EXEC_DETACHED: &str = "exec detached";
    pub const READINESS: &str = "readiness";
    pub const MOUNTS: &str = "compute mounts";
    pub const LOGS: &str = "container logs";
}
