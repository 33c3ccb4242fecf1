//! The linked, read-only view of one cluster
//!
//! Every query is recomputed on each call. Capacity queries only consider
//! hosts from the live listing; recovered hosts exist to resolve task links.

use crate::graph;
use crate::model::{
    ClusterSummary, Host, HostIndex, LoadBalancerAttachment, ResourceVector, Service,
    ServiceIndex, Workload,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Instance type and availability zone of a host
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Placement {
    pub instance_type: Option<String>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    cluster: ClusterSummary,
    workloads: Vec<Workload>,
    hosts: Vec<Host>,
    services: Vec<Service>,
}

impl ClusterSnapshot {
    /// Link the records and freeze them
    pub fn new(
        cluster: ClusterSummary,
        workloads: Vec<Workload>,
        hosts: Vec<Host>,
        services: Vec<Service>,
    ) -> Self {
        let linked = graph::link(workloads, hosts, services);

        Self {
            cluster,
            workloads: linked.workloads,
            hosts: linked.hosts,
            services: linked.services,
        }
    }

    pub fn cluster(&self) -> &ClusterSummary {
        &self.cluster
    }

    pub fn id(&self) -> &str {
        &self.cluster.id
    }

    pub fn name(&self) -> &str {
        &self.cluster.name
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn host(&self, index: HostIndex) -> Option<&Host> {
        self.hosts.get(index.position())
    }

    pub fn service(&self, index: ServiceIndex) -> Option<&Service> {
        self.services.get(index.position())
    }

    pub fn host_of(&self, workload: &Workload) -> Option<&Host> {
        workload.host_index().and_then(|i| self.host(i))
    }

    pub fn service_of(&self, workload: &Workload) -> Option<&Service> {
        workload.service_index().and_then(|i| self.service(i))
    }

    pub fn workloads_on<'a>(&'a self, host: &'a Host) -> impl Iterator<Item = &'a Workload> + 'a {
        host.workload_indices()
            .iter()
            .filter_map(move |i| self.workloads.get(i.position()))
    }

    pub fn workloads_of<'a>(
        &'a self,
        service: &'a Service,
    ) -> impl Iterator<Item = &'a Workload> + 'a {
        service
            .workload_indices()
            .iter()
            .filter_map(move |i| self.workloads.get(i.position()))
    }

    pub fn live_hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.is_live())
    }

    pub fn find_host(&self, container_instance_id: &str) -> Option<&Host> {
        self.hosts
            .iter()
            .find(|h| h.container_instance_id == container_instance_id)
    }

    pub fn find_workload(&self, id: &str) -> Option<&Workload> {
        self.workloads.iter().find(|w| w.id == id)
    }

    /// Look a service up by ARN or by name
    pub fn find_service(&self, id_or_name: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.id == id_or_name || s.name == id_or_name)
    }

    pub fn registered_resources(&self) -> ResourceVector {
        self.live_hosts()
            .fold(ResourceVector::default(), |total, host| ResourceVector {
                cpu: total.cpu + host.registered.cpu,
                memory: total.memory + host.registered.memory,
            })
    }

    pub fn available_resources(&self) -> ResourceVector {
        self.live_hosts()
            .fold(ResourceVector::default(), |total, host| ResourceVector {
                cpu: total.cpu + host.remaining.cpu,
                memory: total.memory + host.remaining.memory,
            })
    }

    pub fn host_with_most_free_cpu(&self) -> Option<&Host> {
        self.most_free(Host::available_cpu)
    }

    pub fn host_with_most_free_memory(&self) -> Option<&Host> {
        self.most_free(Host::available_memory)
    }

    /// First live host with the strictly highest value wins
    fn most_free(&self, available: fn(&Host) -> i64) -> Option<&Host> {
        self.live_hosts().fold(None, |best: Option<&Host>, host| match best {
            Some(b) if available(host) <= available(b) => Some(b),
            _ => Some(host),
        })
    }

    /// Live host count per instance type and availability zone
    pub fn placement_counts(&self) -> BTreeMap<Placement, usize> {
        let mut counts = BTreeMap::new();
        for host in self.live_hosts() {
            let placement = Placement {
                instance_type: host.instance_type().map(str::to_string),
                availability_zone: host.availability_zone().map(str::to_string),
            };
            *counts.entry(placement).or_insert(0) += 1;
        }
        counts
    }

    /// Deployment id -> owning service
    ///
    /// When two services report the same deployment id the first one in
    /// listing order wins, the same service its tasks are linked to.
    pub fn service_deployment_index(&self) -> HashMap<&str, &Service> {
        let mut index = HashMap::new();
        for service in &self.services {
            for id in service.deployment_ids() {
                index.entry(id).or_insert(service);
            }
        }
        index
    }

    /// Readable label -> raw starter token, for grouping tasks by origin
    ///
    /// Tokens that belong to a service deployment are labelled
    /// `(service) <name>`; anything else is its own label.
    pub fn workload_starters(&self) -> BTreeMap<String, String> {
        self.workloads
            .iter()
            .filter_map(|w| {
                let token = w.started_by.as_ref()?;
                let label = match self.service_of(w) {
                    Some(service) => format!("(service) {}", service.display_name()),
                    None => token.clone(),
                };
                Some((label, token.clone()))
            })
            .collect()
    }

    pub fn live_workloads_on<'a>(&'a self, host: &'a Host) -> Vec<&'a Workload> {
        self.workloads_on(host).filter(|w| w.is_running()).collect()
    }

    /// Distinct services with a running task on `host`
    pub fn running_services_on<'a>(&'a self, host: &'a Host) -> Vec<&'a Service> {
        let mut seen = HashSet::new();
        self.workloads_on(host)
            .filter(|w| w.is_running())
            .filter_map(|w| w.service_index())
            .filter(|i| seen.insert(*i))
            .filter_map(|i| self.service(i))
            .collect()
    }

    pub fn load_balancers_in_use<'a>(&'a self, host: &'a Host) -> Vec<&'a LoadBalancerAttachment> {
        self.running_services_on(host)
            .into_iter()
            .flat_map(|s| s.load_balancers.iter())
            .collect()
    }

    pub fn compute_instance_for_private_ip(&self, ip: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|h| h.private_ip() == Some(ip))
            .map(|h| h.compute_instance_id.as_str())
    }

    /// Tasks ordered by their host's public DNS name, host-less tasks last
    pub fn workloads_by_host(&self) -> Vec<&Workload> {
        let mut ordered: Vec<&Workload> = self.workloads.iter().collect();
        ordered.sort_by(|a, b| {
            let dns_a = self.host_of(a).and_then(Host::public_dns);
            let dns_b = self.host_of(b).and_then(Host::public_dns);
            match (dns_a, dns_b) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        ordered
    }

    /// Most recently updated tasks first
    pub fn workloads_by_recency(&self) -> Vec<&Workload> {
        let mut ordered: Vec<&Workload> = self.workloads.iter().collect();
        ordered.sort_by_key(|w| std::cmp::Reverse(w.last_update_time()));
        ordered
    }

    pub fn summary(&self) -> SnapshotSummary {
        let capacity = |host: &Host| HostCapacity {
            container_instance_id: host.container_instance_id.clone(),
            compute_instance_id: host.compute_instance_id.clone(),
            cpu: host.cpu_usage().to_string(),
            memory: host.memory_usage().to_string(),
        };

        let mut services: Vec<ServiceTally> = self
            .services
            .iter()
            .map(|s| ServiceTally {
                name: s.display_name().to_string(),
                workloads: s.workload_indices().len(),
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));

        SnapshotSummary {
            cluster: self.cluster.clone(),
            workloads: self.workloads.len(),
            live_hosts: self.live_hosts().count(),
            recovered_hosts: self.hosts.len() - self.live_hosts().count(),
            registered: self.registered_resources(),
            available: self.available_resources(),
            most_free_cpu: self.host_with_most_free_cpu().map(capacity),
            most_free_memory: self.host_with_most_free_memory().map(capacity),
            placements: self
                .placement_counts()
                .into_iter()
                .map(|(placement, hosts)| PlacementCount { placement, hosts })
                .collect(),
            services,
            starters: self.workload_starters(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostCapacity {
    pub container_instance_id: String,
    pub compute_instance_id: String,
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementCount {
    #[serde(flatten)]
    pub placement: Placement,
    pub hosts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceTally {
    pub name: String,
    pub workloads: usize,
}

/// Serialisable digest of a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub cluster: ClusterSummary,
    pub workloads: usize,
    pub live_hosts: usize,
    pub recovered_hosts: usize,
    pub registered: ResourceVector,
    pub available: ResourceVector,
    pub most_free_cpu: Option<HostCapacity>,
    pub most_free_memory: Option<HostCapacity>,
    pub placements: Vec<PlacementCount>,
    pub services: Vec<ServiceTally>,
    pub starters: BTreeMap<String, String>,
}
