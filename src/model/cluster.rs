use crate::provider::ClusterRecord;
use crate::{EcsInfoError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub registered_host_count: i64,
    pub running_workload_count: i64,
    pub pending_workload_count: i64,
    pub active_service_count: i64,
}

impl ClusterSummary {
    pub fn decode(record: ClusterRecord) -> Result<Self> {
        if record.cluster_arn.is_empty() {
            return Err(EcsInfoError::invalid(
                "cluster",
                "<unknown>",
                "missing clusterArn",
            ));
        }

        let name = record
            .cluster_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| name_from_arn(&record.cluster_arn).to_string());

        Ok(Self {
            id: record.cluster_arn,
            name,
            status: record.status,
            registered_host_count: record.registered_container_instances_count,
            running_workload_count: record.running_tasks_count,
            pending_workload_count: record.pending_tasks_count,
            active_service_count: record.active_services_count,
        })
    }
}

/// `arn:aws:ecs:us-east-1:1:cluster/demo` -> `demo`
fn name_from_arn(arn: &str) -> &str {
    arn.rsplit(':')
        .next()
        .map(|tail| tail.trim_start_matches("cluster/"))
        .unwrap_or(arn)
}
