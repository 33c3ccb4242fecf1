//! In-memory control plane backed by a captured cluster document
//!
//! The document holds one cluster's records in provider JSON shape. Listings
//! are paginated with numeric offset tokens, container instances under
//! `retired_hosts` answer description calls without being listed, every call
//! is recorded, and any operation can be made to fail.

use super::{
    ClusterRecord, ComputeInstanceRecord, Connect, ControlPlane, HostRecord, InstanceHealthRecord,
    Operation, Page, ProviderError, ProviderResult, ServiceRecord, TargetHealthRecord,
    WorkloadDefinitionRecord, WorkloadRecord,
};
use crate::config::MAX_BATCH_SIZE;
use crate::model::WorkloadStatus;
use crate::{EcsInfoError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default)]
    pub clusters: Vec<ClusterRecord>,
    #[serde(default)]
    pub hosts: Vec<HostRecord>,
    /// Deregistered instances: describable by id, absent from listings
    #[serde(default)]
    pub retired_hosts: Vec<HostRecord>,
    #[serde(default)]
    pub compute_instances: Vec<ComputeInstanceRecord>,
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub workloads: Vec<WorkloadRecord>,
    #[serde(default)]
    pub definitions: Vec<WorkloadDefinitionRecord>,
    /// Target group ARN -> target health
    #[serde(default)]
    pub target_health: HashMap<String, Vec<TargetHealthRecord>>,
    /// Classic load balancer name -> instance health
    #[serde(default)]
    pub instance_health: HashMap<String, Vec<InstanceHealthRecord>>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl FixtureDocument {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
                .map_err(|e| EcsInfoError::ParseError(format!("{}: {}", path.display(), e))),
            _ => serde_json::from_str(&raw)
                .map_err(|e| EcsInfoError::ParseError(format!("{}: {}", path.display(), e))),
        }
    }
}

/// One call made against the fixture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Ids passed to a describe call, or the continuation token of a listing
    pub arguments: Vec<String>,
}

struct FixtureState {
    document: FixtureDocument,
    page_size: usize,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashSet<Operation>>,
    regions: Mutex<Vec<Option<String>>>,
}

#[derive(Clone)]
pub struct FixtureControlPlane {
    inner: Arc<FixtureState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FixtureControlPlane {
    pub fn new(document: FixtureDocument) -> Self {
        let page_size = document.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

        Self {
            inner: Arc::new(FixtureState {
                document,
                page_size,
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashSet::new()),
                regions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(FixtureDocument::from_path(path)?))
    }

    /// Make every later call of `operation` fail
    pub fn fail_on(&self, operation: Operation) {
        lock(&self.inner.failures).insert(operation);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.inner.calls).clone()
    }

    pub fn calls_to(&self, operation: Operation) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Regions requested through [`Connect`], in order
    pub fn connected_regions(&self) -> Vec<Option<String>> {
        lock(&self.inner.regions).clone()
    }

    fn document(&self) -> &FixtureDocument {
        &self.inner.document
    }

    fn enter(&self, operation: Operation, arguments: Vec<String>) -> ProviderResult<()> {
        debug!("fixture {} ({} args)", operation, arguments.len());
        lock(&self.inner.calls).push(RecordedCall {
            operation,
            arguments,
        });

        if lock(&self.inner.failures).contains(&operation) {
            return Err(ProviderError::new(
                "InjectedFailure",
                format!("{} failed", operation),
            ));
        }
        Ok(())
    }

    fn enter_batch(&self, operation: Operation, ids: &[String]) -> ProviderResult<()> {
        self.enter(operation, ids.to_vec())?;
        if ids.len() > MAX_BATCH_SIZE {
            return Err(ProviderError::new(
                "InvalidParameterException",
                format!("{} ids exceeds the limit of {}", ids.len(), MAX_BATCH_SIZE),
            ));
        }
        Ok(())
    }

    fn check_cluster(&self, cluster: &str) -> ProviderResult<()> {
        let known = self.document().clusters.iter().any(|c| {
            c.cluster_arn == cluster || c.cluster_name.as_deref() == Some(cluster)
        });
        if known {
            Ok(())
        } else {
            Err(ProviderError::new(
                "ClusterNotFoundException",
                format!("Cluster not found: {}", cluster),
            ))
        }
    }

    fn page(&self, ids: Vec<String>, token: Option<String>) -> ProviderResult<Page> {
        let start = match token {
            Some(t) => t.parse::<usize>().map_err(|_| {
                ProviderError::new("InvalidParameterException", format!("bad token {}", t))
            })?,
            None => 0,
        };
        let start = start.min(ids.len());
        let end = (start + self.inner.page_size).min(ids.len());
        let next_token = (end < ids.len()).then(|| end.to_string());

        Ok(Page::new(ids[start..end].to_vec(), next_token))
    }
}

fn token_args(token: &Option<String>) -> Vec<String> {
    token.iter().cloned().collect()
}

#[async_trait]
impl ControlPlane for FixtureControlPlane {
    async fn list_clusters(&self, next_token: Option<String>) -> ProviderResult<Page> {
        self.enter(Operation::ListClusters, token_args(&next_token))?;
        let ids = self
            .document()
            .clusters
            .iter()
            .map(|c| c.cluster_arn.clone())
            .collect();
        self.page(ids, next_token)
    }

    async fn describe_clusters(&self, clusters: &[String]) -> ProviderResult<Vec<ClusterRecord>> {
        self.enter_batch(Operation::DescribeClusters, clusters)?;
        Ok(self
            .document()
            .clusters
            .iter()
            .filter(|c| {
                clusters.iter().any(|id| {
                    *id == c.cluster_arn || c.cluster_name.as_deref() == Some(id.as_str())
                })
            })
            .cloned()
            .collect())
    }

    async fn list_hosts(&self, cluster: &str, next_token: Option<String>) -> ProviderResult<Page> {
        self.enter(Operation::ListHosts, token_args(&next_token))?;
        self.check_cluster(cluster)?;
        let ids = self
            .document()
            .hosts
            .iter()
            .map(|h| h.container_instance_arn.clone())
            .collect();
        self.page(ids, next_token)
    }

    async fn describe_hosts(&self, cluster: &str, ids: &[String]) -> ProviderResult<Vec<HostRecord>> {
        self.enter_batch(Operation::DescribeHosts, ids)?;
        self.check_cluster(cluster)?;
        let doc = self.document();
        Ok(ids
            .iter()
            .filter_map(|id| {
                doc.hosts
                    .iter()
                    .chain(doc.retired_hosts.iter())
                    .find(|h| h.container_instance_arn == *id)
                    .cloned()
            })
            .collect())
    }

    async fn describe_compute_instances(
        &self,
        ids: &[String],
    ) -> ProviderResult<Vec<ComputeInstanceRecord>> {
        self.enter_batch(Operation::DescribeComputeInstances, ids)?;
        Ok(self
            .document()
            .compute_instances
            .iter()
            .filter(|i| ids.contains(&i.instance_id))
            .cloned()
            .collect())
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> ProviderResult<Page> {
        self.enter(Operation::ListServices, token_args(&next_token))?;
        self.check_cluster(cluster)?;
        let ids = self
            .document()
            .services
            .iter()
            .map(|s| s.service_arn.clone())
            .collect();
        self.page(ids, next_token)
    }

    async fn describe_services(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<ServiceRecord>> {
        self.enter_batch(Operation::DescribeServices, ids)?;
        self.check_cluster(cluster)?;
        let doc = self.document();
        Ok(ids
            .iter()
            .filter_map(|id| doc.services.iter().find(|s| s.service_arn == *id).cloned())
            .collect())
    }

    async fn describe_workload_definition(
        &self,
        id: &str,
    ) -> ProviderResult<WorkloadDefinitionRecord> {
        self.enter(Operation::DescribeWorkloadDefinition, vec![id.to_string()])?;
        self.document()
            .definitions
            .iter()
            .find(|d| d.task_definition_arn == id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::new(
                    "ClientException",
                    format!("Unable to describe task definition {}", id),
                )
            })
    }

    async fn list_workloads(
        &self,
        cluster: &str,
        status: WorkloadStatus,
        next_token: Option<String>,
    ) -> ProviderResult<Page> {
        let mut args = vec![status.to_string()];
        args.extend(token_args(&next_token));
        self.enter(Operation::ListWorkloads, args)?;
        self.check_cluster(cluster)?;

        let ids = self
            .document()
            .workloads
            .iter()
            .filter(|w| {
                w.desired_status
                    .as_deref()
                    .or(w.last_status.as_deref())
                    == Some(status.as_str())
            })
            .map(|w| w.task_arn.clone())
            .collect();
        self.page(ids, next_token)
    }

    async fn describe_workloads(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<WorkloadRecord>> {
        self.enter_batch(Operation::DescribeWorkloads, ids)?;
        self.check_cluster(cluster)?;
        let doc = self.document();
        Ok(ids
            .iter()
            .filter_map(|id| doc.workloads.iter().find(|w| w.task_arn == *id).cloned())
            .collect())
    }

    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> ProviderResult<Vec<TargetHealthRecord>> {
        self.enter(Operation::DescribeTargetHealth, vec![target_group.to_string()])?;
        self.document()
            .target_health
            .get(target_group)
            .cloned()
            .ok_or_else(|| {
                ProviderError::new(
                    "TargetGroupNotFound",
                    format!("One or more target groups not found: {}", target_group),
                )
            })
    }

    async fn describe_instance_health(
        &self,
        load_balancer: &str,
    ) -> ProviderResult<Vec<InstanceHealthRecord>> {
        self.enter(
            Operation::DescribeInstanceHealth,
            vec![load_balancer.to_string()],
        )?;
        self.document()
            .instance_health
            .get(load_balancer)
            .cloned()
            .ok_or_else(|| {
                ProviderError::new(
                    "LoadBalancerNotFound",
                    format!("There is no ACTIVE Load Balancer named '{}'", load_balancer),
                )
            })
    }
}

#[async_trait]
impl Connect for FixtureControlPlane {
    type Plane = FixtureControlPlane;

    async fn connect(&self, region: Option<&str>) -> Result<Self::Plane> {
        lock(&self.inner.regions).push(region.map(str::to_string));
        Ok(self.clone())
    }
}
