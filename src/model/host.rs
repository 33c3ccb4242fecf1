use super::{parse_timestamp, WorkloadIndex};
use crate::provider::{ComputeInstanceRecord, HostRecord, ResourceRecord};
use crate::{EcsInfoError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether a host came from the live listing or was recovered afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Live,
    /// Deregistered, described only to resolve a task's host reference
    Recovered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceVector {
    pub cpu: i64,
    pub memory: i64,
}

impl ResourceVector {
    fn decode(id: &str, field: &str, resources: &[ResourceRecord]) -> Result<Self> {
        let quantity = |name: &str| {
            resources
                .iter()
                .find(|r| r.name == name)
                .and_then(|r| r.integer_value.or(r.long_value))
                .ok_or_else(|| {
                    EcsInfoError::invalid(
                        "container instance",
                        id,
                        format!("{} has no {} quantity", field, name),
                    )
                })
        };

        Ok(Self {
            cpu: quantity("CPU")?,
            memory: quantity("MEMORY")?,
        })
    }
}

/// `remaining/registered` pair for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub remaining: i64,
    pub registered: i64,
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.remaining, self.registered)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeInstance {
    pub instance_id: String,
    pub instance_type: Option<String>,
    pub availability_zone: Option<String>,
    pub private_ip: Option<String>,
    pub public_dns: Option<String>,
    pub private_dns: Option<String>,
    pub state: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
}

impl ComputeInstance {
    pub fn decode(record: ComputeInstanceRecord) -> Result<Self> {
        let launch_time = parse_timestamp(
            "instance",
            &record.instance_id,
            "LaunchTime",
            record.launch_time.as_deref(),
        )?;

        Ok(Self {
            availability_zone: record.placement.and_then(|p| p.availability_zone),
            state: record.state.and_then(|s| s.name),
            instance_type: record.instance_type,
            private_ip: record.private_ip_address.filter(|s| !s.is_empty()),
            public_dns: record.public_dns_name.filter(|s| !s.is_empty()),
            private_dns: record.private_dns_name.filter(|s| !s.is_empty()),
            instance_id: record.instance_id,
            launch_time,
        })
    }
}

/// A container instance and the compute instance underneath it
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub container_instance_id: String,
    pub compute_instance_id: String,
    pub status: Option<String>,
    pub agent_connected: bool,
    pub registered: ResourceVector,
    pub remaining: ResourceVector,
    pub compute: Option<ComputeInstance>,
    pub liveness: Liveness,
    pub(crate) workloads: Vec<WorkloadIndex>,
}

impl Host {
    pub fn decode(
        record: HostRecord,
        compute: Option<ComputeInstance>,
        liveness: Liveness,
    ) -> Result<Self> {
        const KIND: &str = "container instance";
        let id = record.container_instance_arn.as_str();

        if id.is_empty() {
            return Err(EcsInfoError::invalid(
                KIND,
                "<unknown>",
                "missing containerInstanceArn",
            ));
        }

        let compute_instance_id = record
            .ec2_instance_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EcsInfoError::invalid(KIND, id, "missing ec2InstanceId"))?;

        let registered =
            ResourceVector::decode(id, "registeredResources", &record.registered_resources)?;
        let remaining =
            ResourceVector::decode(id, "remainingResources", &record.remaining_resources)?;

        Ok(Self {
            container_instance_id: record.container_instance_arn,
            compute_instance_id,
            status: record.status,
            agent_connected: record.agent_connected,
            registered,
            remaining,
            compute,
            liveness,
            workloads: Vec::new(),
        })
    }

    pub fn is_live(&self) -> bool {
        self.liveness == Liveness::Live
    }

    pub fn workload_indices(&self) -> &[WorkloadIndex] {
        &self.workloads
    }

    pub fn registered_cpu(&self) -> i64 {
        self.registered.cpu
    }

    pub fn registered_memory(&self) -> i64 {
        self.registered.memory
    }

    pub fn available_cpu(&self) -> i64 {
        self.remaining.cpu
    }

    pub fn available_memory(&self) -> i64 {
        self.remaining.memory
    }

    pub fn cpu_usage(&self) -> Usage {
        Usage {
            remaining: self.remaining.cpu,
            registered: self.registered.cpu,
        }
    }

    pub fn memory_usage(&self) -> Usage {
        Usage {
            remaining: self.remaining.memory,
            registered: self.registered.memory,
        }
    }

    pub fn instance_type(&self) -> Option<&str> {
        self.compute.as_ref()?.instance_type.as_deref()
    }

    pub fn availability_zone(&self) -> Option<&str> {
        self.compute.as_ref()?.availability_zone.as_deref()
    }

    pub fn public_dns(&self) -> Option<&str> {
        self.compute.as_ref()?.public_dns.as_deref()
    }

    pub fn private_ip(&self) -> Option<&str> {
        self.compute.as_ref()?.private_ip.as_deref()
    }
}
