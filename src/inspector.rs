//! Entry points: describe a cluster by identifier or resolve one by name

use crate::collector::PaginatedCollector;
use crate::config::DescribeConfig;
use crate::enrich::enrich_services;
use crate::fetch::{ClusterFetcher, RawCluster};
use crate::provider::{Connect, ControlPlane, Operation};
use crate::recovery::recover_hosts;
use crate::snapshot::ClusterSnapshot;
use crate::{EcsInfoError, Result};
use regex::Regex;
use tracing::{debug, info};

pub struct ClusterInspector<C> {
    connector: C,
    config: DescribeConfig,
}

impl<C: Connect> ClusterInspector<C> {
    pub fn new(connector: C, config: DescribeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { connector, config })
    }

    pub fn with_defaults(connector: C) -> Self {
        Self {
            connector,
            config: DescribeConfig::default(),
        }
    }

    pub fn config(&self) -> &DescribeConfig {
        &self.config
    }

    /// Find the first cluster whose identifier matches `fragment` and describe it
    ///
    /// `fragment` is a regular expression matched anywhere in the cluster
    /// ARN, so a plain name fragment works as a substring match.
    pub async fn resolve_by_name(
        &self,
        fragment: &str,
        region: Option<&str>,
    ) -> Result<ClusterSnapshot> {
        let pattern = Regex::new(fragment)?;
        let region = region
            .map(str::to_string)
            .or_else(|| self.config.default_region.clone());
        let plane = self.connector.connect(region.as_deref()).await?;

        let clusters = PaginatedCollector::new(self.config.batch_size)
            .collect_ids(Operation::ListClusters, |token| plane.list_clusters(token))
            .await?;
        debug!("{} clusters listed", clusters.len());

        let cluster = clusters
            .into_iter()
            .find(|id| pattern.is_match(id))
            .ok_or_else(|| EcsInfoError::NotFound(fragment.to_string()))?;

        info!("Resolved {} to {}", fragment, cluster);
        self.describe_with(&plane, &cluster).await
    }

    /// Aggregate one cluster, given its exact identifier
    pub async fn describe(&self, cluster: &str, region: Option<&str>) -> Result<ClusterSnapshot> {
        let region = self.config.region_for(cluster, region);
        let plane = self.connector.connect(region.as_deref()).await?;
        self.describe_with(&plane, cluster).await
    }

    async fn describe_with(&self, plane: &C::Plane, cluster: &str) -> Result<ClusterSnapshot> {
        let snapshot = describe_cluster(plane, cluster, &self.config).await?;
        info!(
            "Built snapshot of {}: {} tasks, {} container instances, {} services",
            snapshot.name(),
            snapshot.workloads().len(),
            snapshot.hosts().len(),
            snapshot.services().len()
        );
        Ok(snapshot)
    }
}

/// Describe with a plane directly, bypassing region resolution
pub async fn describe_cluster<P: ControlPlane + ?Sized>(
    plane: &P,
    cluster: &str,
    config: &DescribeConfig,
) -> Result<ClusterSnapshot> {
    let RawCluster {
        summary,
        workloads,
        mut hosts,
        mut services,
    } = ClusterFetcher::new(plane, cluster, config).fetch().await?;

    let collector = PaginatedCollector::new(config.batch_size);
    let (recovered, ()) = tokio::try_join!(
        recover_hosts(
            plane,
            cluster,
            &workloads,
            &hosts,
            &collector,
            config.recovery_concurrency,
        ),
        enrich_services(plane, &mut services, config.enrichment_concurrency),
    )?;
    hosts.extend(recovered);

    Ok(ClusterSnapshot::new(summary, workloads, hosts, services))
}
