//! Recovery of container instances that tasks still reference
//!
//! A stopped task can point at a container instance that has since been
//! deregistered and dropped out of the listing. Describing it by id still
//! works for a while, so those records are fetched directly and marked
//! [`Liveness::Recovered`]; they resolve host links but never count towards
//! cluster capacity.

use crate::collector::PaginatedCollector;
use crate::fetch::describe_host_batch;
use crate::model::{Host, Liveness, Workload};
use crate::provider::ControlPlane;
use crate::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Distinct host ids referenced by tasks but absent from `hosts`, in task order
pub fn orphaned_host_ids(workloads: &[Workload], hosts: &[Host]) -> Vec<String> {
    let known: HashSet<&str> = hosts
        .iter()
        .map(|h| h.container_instance_id.as_str())
        .collect();
    let mut seen = HashSet::new();

    workloads
        .iter()
        .filter_map(|w| w.host_id.as_deref())
        .filter(|id| !known.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Describe the hosts tasks point at but the live listing no longer has
///
/// Batches of at most the collector's batch size go out with up to
/// `concurrency` in flight; results keep id order. A `concurrency` of 1
/// (`recovery_concurrency = 1`) describes one batch at a time, each batch's
/// host and compute lookups finishing before the next batch starts.
pub async fn recover_hosts<P: ControlPlane + ?Sized>(
    plane: &P,
    cluster: &str,
    workloads: &[Workload],
    hosts: &[Host],
    collector: &PaginatedCollector,
    concurrency: usize,
) -> Result<Vec<Host>> {
    let orphaned = orphaned_host_ids(workloads, hosts);

    if orphaned.is_empty() {
        debug!("Every task host is in the live listing");
        return Ok(Vec::new());
    }

    info!(
        "Recovering {} container instances missing from the listing",
        orphaned.len()
    );

    let recovered = collector
        .describe_bounded(&orphaned, concurrency, |ids| {
            describe_host_batch(plane, cluster, ids, Liveness::Recovered)
        })
        .await?;

    if recovered.len() < orphaned.len() {
        warn!(
            "{} of {} missing container instances could not be described",
            orphaned.len() - recovered.len(),
            orphaned.len()
        );
    }

    Ok(recovered)
}
