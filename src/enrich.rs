//! Load balancer health for every service attachment
//!
//! Target-group attachments are answered by the target health API, classic
//! ones by the instance health API. Every query runs under one bounded
//! pool; the first failure aborts enrichment for the whole cluster.

use crate::model::{
    InstanceHealth, LoadBalancerHealth, LoadBalancerKind, Service, TargetHealth,
};
use crate::provider::{ControlPlane, ProviderError};
use crate::{EcsInfoError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

pub async fn enrich_services<P: ControlPlane + ?Sized>(
    plane: &P,
    services: &mut [Service],
    concurrency: usize,
) -> Result<()> {
    let queries: Vec<(usize, usize, LoadBalancerKind)> = services
        .iter()
        .enumerate()
        .flat_map(|(s, service)| {
            service
                .load_balancers
                .iter()
                .enumerate()
                .map(move |(l, attachment)| (s, l, attachment.kind.clone()))
        })
        .collect();

    if queries.is_empty() {
        return Ok(());
    }

    debug!("Querying health for {} load balancers", queries.len());

    let results: Vec<(usize, usize, LoadBalancerHealth)> = stream::iter(queries)
        .map(|(s, l, kind)| async move {
            let health = query_health(plane, &kind).await?;
            Ok::<_, EcsInfoError>((s, l, health))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    for (s, l, health) in results {
        services[s].load_balancers[l].health = Some(health);
    }

    Ok(())
}

pub async fn query_health<P: ControlPlane + ?Sized>(
    plane: &P,
    kind: &LoadBalancerKind,
) -> Result<LoadBalancerHealth> {
    let failed = |e: ProviderError| EcsInfoError::Enrichment {
        load_balancer: kind.label().to_string(),
        message: e.to_string(),
    };

    match kind {
        LoadBalancerKind::TargetGroup { arn } => {
            let targets = plane.describe_target_health(arn).await.map_err(failed)?;
            Ok(LoadBalancerHealth::TargetGroup(
                targets.into_iter().map(TargetHealth::from).collect(),
            ))
        }
        LoadBalancerKind::Classic { name } => {
            let instances = plane.describe_instance_health(name).await.map_err(failed)?;
            Ok(LoadBalancerHealth::Classic(
                instances.into_iter().map(InstanceHealth::from).collect(),
            ))
        }
    }
}
