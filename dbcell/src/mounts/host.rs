//! Host virtualization-role probe.
//!
//! Decides whether this process runs inside a container, in which case data
//! directories it hands to sibling containers must be expressed in terms of
//! the outer host's paths.

use dbcell_shared::errors::{DbcellError, DbcellResult};
use serde::Serialize;
use std::path::Path;

/// Markers whose presence under `/` means we are in a container.
const MARKER_FILES: &[&str] = &[".dockerenv", "run/.containerenv"];

/// Substrings of `/proc/1/cgroup` that only appear inside containers.
const CGROUP_MARKERS: &[&str] = &["docker", "kubepods", "lxc", "containerd", "libpod"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtualizationRole {
    Host,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEnvironment {
    hostname: String,
    role: VirtualizationRole,
}

impl HostEnvironment {
    pub fn new(hostname: impl Into<String>, role: VirtualizationRole) -> Self {
        Self {
            hostname: hostname.into(),
            role,
        }
    }

    /// Probe the running system.
    pub fn detect() -> DbcellResult<Self> {
        let hostname = sysinfo::System::host_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbcellError::Config("failed to get host info: no hostname".into()))?;

        let env = Self::new(hostname, detect_role(Path::new("/")));
        tracing::debug!(hostname = %env.hostname, role = ?env.role, "Detected host environment");
        Ok(env)
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn role(&self) -> VirtualizationRole {
        self.role
    }

    pub fn is_guest(&self) -> bool {
        self.role == VirtualizationRole::Guest
    }
}

/// Inspect container markers below `root`.
pub fn detect_role(root: &Path) -> VirtualizationRole {
    if MARKER_FILES.iter().any(|marker| root.join(marker).exists()) {
        return VirtualizationRole::Guest;
    }

    if let Ok(cgroup) = std::fs::read_to_string(root.join("proc/1/cgroup")) {
        if CGROUP_MARKERS.iter().any(|marker| cgroup.contains(marker)) {
            return VirtualizationRole::Guest;
        }
    }

    if let Ok(environ) = std::fs::read(root.join("proc/1/environ")) {
        if environ
            .split(|b| *b == 0)
            .any(|entry| entry.starts_with(b"container="))
        {
            return VirtualizationRole::Guest;
        }
    }

    VirtualizationRole::Host
}
