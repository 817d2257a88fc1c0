//! Mount resolution for database containers.
//!
//! When this process runs directly on the host, the data directory is bound
//! into the database container as-is. When it runs inside a container itself,
//! the data directory path only exists in our own filesystem view, so the
//! mount has to be rewritten against whatever outer source backs it.
//!
//! ```text
//! self:  /vol/data (host)  ->  /data (us)
//! want:  /data/pg
//! emit:  /vol/data/pg      ->  /data/pg
//! ```

mod host;

pub use host::{HostEnvironment, VirtualizationRole, detect_role};

use crate::constants::ops;
use crate::runtime::{MountKind, MountPoint, SharedRuntime};
use bollard::models::{Mount, MountBindOptions, MountBindOptionsPropagationEnum, MountTypeEnum};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A mount to apply to a new container's host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountSpec {
    pub kind: MountKind,
    pub source: PathBuf,
    pub target: PathBuf,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<String>,
}

impl MountSpec {
    /// A read-write bind of `source` at `target`.
    pub fn bind(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            kind: MountKind::Bind,
            source: source.into(),
            target: target.into(),
            read_only: false,
            propagation: None,
        }
    }

    fn carried(point: &MountPoint) -> Self {
        Self {
            kind: point.kind.clone(),
            source: PathBuf::from(&point.source),
            target: PathBuf::from(&point.destination),
            read_only: !point.rw,
            propagation: point.propagation.clone(),
        }
    }
}

impl From<&MountSpec> for Mount {
    fn from(spec: &MountSpec) -> Self {
        let typ = match spec.kind {
            MountKind::Bind => MountTypeEnum::BIND,
            MountKind::Volume => MountTypeEnum::VOLUME,
            MountKind::Tmpfs => MountTypeEnum::TMPFS,
            MountKind::Other(_) => MountTypeEnum::EMPTY,
        };

        let bind_options = match (&spec.kind, spec.propagation.as_deref()) {
            (MountKind::Bind, Some(raw)) => propagation(raw).map(|propagation| MountBindOptions {
                propagation: Some(propagation),
                ..Default::default()
            }),
            _ => None,
        };

        Mount {
            typ: Some(typ),
            source: Some(spec.source.to_string_lossy().into_owned()),
            target: Some(spec.target.to_string_lossy().into_owned()),
            read_only: Some(spec.read_only),
            bind_options,
            ..Default::default()
        }
    }
}

fn propagation(raw: &str) -> Option<MountBindOptionsPropagationEnum> {
    match raw {
        "private" => Some(MountBindOptionsPropagationEnum::PRIVATE),
        "rprivate" => Some(MountBindOptionsPropagationEnum::RPRIVATE),
        "shared" => Some(MountBindOptionsPropagationEnum::SHARED),
        "rshared" => Some(MountBindOptionsPropagationEnum::RSHARED),
        "slave" => Some(MountBindOptionsPropagationEnum::SLAVE),
        "rslave" => Some(MountBindOptionsPropagationEnum::RSLAVE),
        _ => None,
    }
}

/// Compute the mounts a database container needs to see `data_dir`.
///
/// `self_mounts` is `None` when this process runs on the host. Otherwise it
/// holds the mounts of the container we run in; the most specific one whose
/// destination contains `data_dir` is rewritten to point at the data
/// directory, less specific ones covering it are dropped, and the rest are
/// carried over unchanged.
pub fn compute_mounts(data_dir: &Path, self_mounts: Option<&[MountPoint]>) -> Vec<MountSpec> {
    let Some(points) = self_mounts else {
        return vec![MountSpec::bind(data_dir, data_dir)];
    };

    let covering = points
        .iter()
        .enumerate()
        .filter(|(_, point)| data_dir.starts_with(&point.destination))
        .max_by_key(|(_, point)| Path::new(&point.destination).components().count())
        .map(|(index, _)| index);

    if covering.is_none() {
        tracing::warn!(
            data_dir = %data_dir.display(),
            "No mount of the current container contains the data directory"
        );
    }

    let mut targets = HashSet::new();
    let mut specs = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let spec = if Some(index) == covering {
            rewrite(data_dir, point)
        } else if data_dir.starts_with(&point.destination) {
            tracing::debug!(
                destination = %point.destination,
                "Dropping mount shadowed by a more specific one"
            );
            continue;
        } else {
            MountSpec::carried(point)
        };

        if targets.insert(spec.target.clone()) {
            specs.push(spec);
        }
    }
    specs
}

fn rewrite(data_dir: &Path, point: &MountPoint) -> MountSpec {
    let source = Path::new(&point.source);
    let source = match data_dir.strip_prefix(&point.destination) {
        Ok(rest) if rest.as_os_str().is_empty() => source.to_path_buf(),
        Ok(rest) => source.join(rest),
        Err(_) => source.to_path_buf(),
    };

    tracing::debug!(
        data_dir = %data_dir.display(),
        source = %source.display(),
        via = %point.destination,
        "Rewrote data directory mount against outer source"
    );

    MountSpec {
        kind: point.kind.clone(),
        source,
        target: data_dir.to_path_buf(),
        read_only: !point.rw,
        propagation: point.propagation.clone(),
    }
}

/// Resolves mounts against the live runtime, inspecting our own container
/// when we run nested.
#[derive(Clone)]
pub struct MountResolver {
    runtime: SharedRuntime,
}

impl MountResolver {
    pub fn new(runtime: SharedRuntime) -> Self {
        Self { runtime }
    }

    pub async fn compute_mounts(
        &self,
        data_dir: &Path,
        host: &HostEnvironment,
    ) -> DbcellResult<Vec<MountSpec>> {
        if !data_dir.is_absolute() {
            return Err(DbcellError::Config(format!(
                "data directory must be absolute: {}",
                data_dir.display()
            )));
        }

        if !host.is_guest() {
            return Ok(compute_mounts(data_dir, None));
        }

        let details = self
            .runtime
            .container_inspect(host.hostname())
            .await
            .map_err(|e| DbcellError::inspection(ops::MOUNTS, e))?;

        Ok(compute_mounts(data_dir, Some(&details.mounts)))
    }
}
