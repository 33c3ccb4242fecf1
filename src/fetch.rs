//! Parallel top-level fetches for one cluster
//!
//! The cluster summary, tasks (per desired status), container instances and
//! services are fetched concurrently. The join fails on the first branch
//! error, dropping every sibling still in flight, so a partially fetched
//! cluster is never returned.

use crate::collector::PaginatedCollector;
use crate::config::DescribeConfig;
use crate::model::{
    ClusterSummary, ComputeInstance, Host, Liveness, Service, Workload, WorkloadDefinition,
    WorkloadStatus,
};
use crate::provider::{ControlPlane, Operation};
use crate::{EcsInfoError, Result};
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Decoded, not yet linked, records for one cluster
#[derive(Debug, Clone)]
pub struct RawCluster {
    pub summary: ClusterSummary,
    pub workloads: Vec<Workload>,
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
}

pub struct ClusterFetcher<'a, P: ?Sized> {
    plane: &'a P,
    cluster: &'a str,
    config: &'a DescribeConfig,
    collector: PaginatedCollector,
}

impl<'a, P: ControlPlane + ?Sized> ClusterFetcher<'a, P> {
    pub fn new(plane: &'a P, cluster: &'a str, config: &'a DescribeConfig) -> Self {
        Self {
            plane,
            cluster,
            config,
            collector: PaginatedCollector::new(config.batch_size),
        }
    }

    pub async fn fetch(&self) -> Result<RawCluster> {
        info!("Fetching cluster {}", self.cluster);

        let (summary, workloads, hosts, services) = tokio::try_join!(
            self.fetch_summary(),
            self.fetch_workloads(),
            self.fetch_hosts(),
            self.fetch_services(),
        )?;

        debug!(
            "Fetched {} tasks, {} container instances, {} services",
            workloads.len(),
            hosts.len(),
            services.len()
        );

        Ok(RawCluster {
            summary,
            workloads,
            hosts,
            services,
        })
    }

    pub async fn fetch_summary(&self) -> Result<ClusterSummary> {
        let records = self
            .plane
            .describe_clusters(&[self.cluster.to_string()])
            .await
            .map_err(|e| e.describing(Operation::DescribeClusters))?;

        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| EcsInfoError::Describe {
                operation: Operation::DescribeClusters.as_str(),
                message: format!("cluster {} was not returned", self.cluster),
            })?;

        ClusterSummary::decode(record)
    }

    /// Tasks for every listed desired status, merged in status order
    ///
    /// A task that changed status between listings is kept once, at its
    /// first position.
    pub async fn fetch_workloads(&self) -> Result<Vec<Workload>> {
        let by_status = future::try_join_all(
            WorkloadStatus::LISTED
                .iter()
                .map(|&status| self.fetch_workloads_with(status)),
        )
        .await?;

        let mut seen = HashSet::new();
        let mut workloads: Vec<Workload> = by_status
            .into_iter()
            .flatten()
            .filter(|w| seen.insert(w.id.clone()))
            .collect();

        self.attach_definitions(&mut workloads).await?;
        Ok(workloads)
    }

    async fn fetch_workloads_with(&self, status: WorkloadStatus) -> Result<Vec<Workload>> {
        let plane = self.plane;
        let cluster = self.cluster;

        let workloads = self
            .collector
            .collect(
                Operation::ListWorkloads,
                |token| plane.list_workloads(cluster, status, token),
                |ids| async move {
                    plane
                        .describe_workloads(cluster, &ids)
                        .await
                        .map_err(|e| e.describing(Operation::DescribeWorkloads))?
                        .into_iter()
                        .map(Workload::decode)
                        .collect::<Result<Vec<_>>>()
                },
            )
            .await?;

        debug!("{} {} tasks", workloads.len(), status);
        Ok(workloads)
    }

    /// Describe each distinct task definition once and share it across tasks
    async fn attach_definitions(&self, workloads: &mut [Workload]) -> Result<()> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = workloads
            .iter()
            .filter(|w| seen.insert(w.definition_id.as_str()))
            .map(|w| w.definition_id.clone())
            .collect();

        debug!(
            "Describing {} task definitions for {} tasks",
            distinct.len(),
            workloads.len()
        );

        let plane = self.plane;
        let definitions: HashMap<String, Arc<WorkloadDefinition>> = stream::iter(distinct)
            .map(|id| async move {
                let record = plane
                    .describe_workload_definition(&id)
                    .await
                    .map_err(|e| e.describing(Operation::DescribeWorkloadDefinition))?;
                let definition = WorkloadDefinition::decode(record)?;
                Ok::<_, EcsInfoError>((id, Arc::new(definition)))
            })
            .buffer_unordered(self.config.definition_concurrency.max(1))
            .try_collect()
            .await?;

        for workload in workloads.iter_mut() {
            workload.definition = definitions.get(&workload.definition_id).cloned();
        }

        Ok(())
    }

    pub async fn fetch_hosts(&self) -> Result<Vec<Host>> {
        let plane = self.plane;
        let cluster = self.cluster;

        self.collector
            .collect(
                Operation::ListHosts,
                |token| plane.list_hosts(cluster, token),
                |ids| describe_host_batch(plane, cluster, ids, Liveness::Live),
            )
            .await
    }

    pub async fn fetch_services(&self) -> Result<Vec<Service>> {
        let plane = self.plane;
        let cluster = self.cluster;

        self.collector
            .collect(
                Operation::ListServices,
                |token| plane.list_services(cluster, token),
                |ids| async move {
                    plane
                        .describe_services(cluster, &ids)
                        .await
                        .map_err(|e| e.describing(Operation::DescribeServices))?
                        .into_iter()
                        .map(Service::decode)
                        .collect::<Result<Vec<_>>>()
                },
            )
            .await
    }
}

/// Describe container instances and pair each with its compute instance
pub(crate) async fn describe_host_batch<P: ControlPlane + ?Sized>(
    plane: &P,
    cluster: &str,
    ids: Vec<String>,
    liveness: Liveness,
) -> Result<Vec<Host>> {
    let records = plane
        .describe_hosts(cluster, &ids)
        .await
        .map_err(|e| e.describing(Operation::DescribeHosts))?;

    let instance_ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.ec2_instance_id.clone())
        .filter(|id| !id.is_empty())
        .collect();

    let mut compute = HashMap::new();
    if !instance_ids.is_empty() {
        let instances = plane
            .describe_compute_instances(&instance_ids)
            .await
            .map_err(|e| e.describing(Operation::DescribeComputeInstances))?;

        for record in instances {
            let instance = ComputeInstance::decode(record)?;
            compute.insert(instance.instance_id.clone(), instance);
        }
    }

    records
        .into_iter()
        .map(|record| {
            let instance = record
                .ec2_instance_id
                .as_ref()
                .and_then(|id| compute.get(id))
                .cloned();
            Host::decode(record, instance, liveness)
        })
        .collect()
}
