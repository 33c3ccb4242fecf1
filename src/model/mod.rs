//! Validated domain records decoded from provider transport records
//!
//! Decoding happens once per describe cycle. Records own all of their data,
//! so nothing a provider does afterwards can change a built snapshot.

pub mod cluster;
pub mod host;
pub mod service;
pub mod workload;

pub use cluster::ClusterSummary;
pub use host::{ComputeInstance, Host, Liveness, ResourceVector, Usage};
pub use service::{
    Deployment, InstanceHealth, LoadBalancerAttachment, LoadBalancerHealth, LoadBalancerKind,
    Service, ServiceEvent, TargetHealth,
};
pub use workload::{
    Container, ContainerDefinition, ContainerOverride, Workload, WorkloadDefinition,
    WorkloadStatus,
};

use crate::{EcsInfoError, Result};
use chrono::{DateTime, Utc};

/// Position of a host in its snapshot's host collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostIndex(pub(crate) usize);

/// Position of a service in its snapshot's service collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIndex(pub(crate) usize);

/// Position of a workload in its snapshot's workload collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadIndex(pub(crate) usize);

macro_rules! index_position {
    ($($ty:ty),*) => {
        $(impl $ty {
            pub fn position(self) -> usize {
                self.0
            }
        })*
    };
}

index_position!(HostIndex, ServiceIndex, WorkloadIndex);

pub(crate) fn parse_timestamp(
    kind: &'static str,
    id: &str,
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| EcsInfoError::invalid(kind, id, format!("bad {}: {}", field, e)))
        })
        .transpose()
}

pub(crate) fn pairs(records: &[crate::provider::KeyValueRecord]) -> Vec<(String, String)> {
    records
        .iter()
        .map(|kv| (kv.name.clone(), kv.value.clone()))
        .collect()
}
