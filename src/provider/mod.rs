#[cfg(feature = "aws")]
pub mod aws;
pub mod fixture;
pub mod types;

use crate::model::WorkloadStatus;
use crate::{EcsInfoError, Result};
use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "aws")]
pub use aws::{AwsConnector, AwsControlPlane};
pub use fixture::{FixtureControlPlane, FixtureDocument, RecordedCall};
pub use types::*;

/// One page of a token-paginated listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub ids: Vec<String>,
    pub next_token: Option<String>,
}

impl Page {
    pub fn new(ids: Vec<String>, next_token: Option<String>) -> Self {
        Self { ids, next_token }
    }
}

/// Failure reported by a provider call, before it is classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn listing(self, operation: Operation) -> EcsInfoError {
        EcsInfoError::Listing {
            operation: operation.as_str(),
            message: self.to_string(),
        }
    }

    pub fn describing(self, operation: Operation) -> EcsInfoError {
        EcsInfoError::Describe {
            operation: operation.as_str(),
            message: self.to_string(),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The control-plane operations a describe cycle consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    ListClusters,
    DescribeClusters,
    ListHosts,
    DescribeHosts,
    DescribeComputeInstances,
    ListServices,
    DescribeServices,
    DescribeWorkloadDefinition,
    ListWorkloads,
    DescribeWorkloads,
    DescribeTargetHealth,
    DescribeInstanceHealth,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::ListClusters => "list-clusters",
            Operation::DescribeClusters => "describe-clusters",
            Operation::ListHosts => "list-container-instances",
            Operation::DescribeHosts => "describe-container-instances",
            Operation::DescribeComputeInstances => "describe-instances",
            Operation::ListServices => "list-services",
            Operation::DescribeServices => "describe-services",
            Operation::DescribeWorkloadDefinition => "describe-task-definition",
            Operation::ListWorkloads => "list-tasks",
            Operation::DescribeWorkloads => "describe-tasks",
            Operation::DescribeTargetHealth => "describe-target-health",
            Operation::DescribeInstanceHealth => "describe-instance-health",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only access to one region's orchestration, compute and load
/// balancer APIs.
///
/// Batched `describe_*` calls must not be given more ids than
/// [`crate::config::MAX_BATCH_SIZE`]; the collectors take care of chunking.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_clusters(&self, next_token: Option<String>) -> ProviderResult<Page>;

    async fn describe_clusters(&self, clusters: &[String]) -> ProviderResult<Vec<ClusterRecord>>;

    async fn list_hosts(&self, cluster: &str, next_token: Option<String>) -> ProviderResult<Page>;

    async fn describe_hosts(&self, cluster: &str, ids: &[String])
        -> ProviderResult<Vec<HostRecord>>;

    async fn describe_compute_instances(
        &self,
        ids: &[String],
    ) -> ProviderResult<Vec<ComputeInstanceRecord>>;

    async fn list_services(&self, cluster: &str, next_token: Option<String>)
        -> ProviderResult<Page>;

    async fn describe_services(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<ServiceRecord>>;

    async fn describe_workload_definition(
        &self,
        id: &str,
    ) -> ProviderResult<WorkloadDefinitionRecord>;

    async fn list_workloads(
        &self,
        cluster: &str,
        status: WorkloadStatus,
        next_token: Option<String>,
    ) -> ProviderResult<Page>;

    async fn describe_workloads(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<WorkloadRecord>>;

    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> ProviderResult<Vec<TargetHealthRecord>>;

    async fn describe_instance_health(
        &self,
        load_balancer: &str,
    ) -> ProviderResult<Vec<InstanceHealthRecord>>;
}

/// Hands out a [`ControlPlane`] bound to a region
#[async_trait]
pub trait Connect: Send + Sync {
    type Plane: ControlPlane;

    async fn connect(&self, region: Option<&str>) -> Result<Self::Plane>;
}
