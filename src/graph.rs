//! Cross-linking tasks, container instances and services
//!
//! Links are indices into the snapshot's own collections, never pointers.
//! Forward links (task -> host, task -> service) are resolved first; the
//! inverse lists on hosts and services are then derived from those forward
//! links alone, so the two directions cannot disagree.

use crate::model::{Host, HostIndex, Service, ServiceIndex, Workload, WorkloadIndex};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct LinkedEntities {
    pub workloads: Vec<Workload>,
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
}

/// Install every cross-reference, replacing any links already present
pub fn link(
    mut workloads: Vec<Workload>,
    mut hosts: Vec<Host>,
    mut services: Vec<Service>,
) -> LinkedEntities {
    {
        // first record wins on a duplicate id
        let mut host_by_id: HashMap<&str, HostIndex> = HashMap::new();
        for (i, host) in hosts.iter().enumerate() {
            host_by_id
                .entry(host.container_instance_id.as_str())
                .or_insert(HostIndex(i));
        }

        let mut service_by_deployment: HashMap<&str, ServiceIndex> = HashMap::new();
        for (i, service) in services.iter().enumerate() {
            for id in service.deployment_ids() {
                service_by_deployment.entry(id).or_insert(ServiceIndex(i));
            }
        }

        for workload in workloads.iter_mut() {
            workload.host = workload
                .host_id
                .as_deref()
                .and_then(|id| host_by_id.get(id).copied());
            workload.service = workload
                .started_by
                .as_deref()
                .and_then(|token| service_by_deployment.get(token).copied());
        }
    }

    for service in services.iter_mut() {
        service.workloads.clear();
    }
    for host in hosts.iter_mut() {
        host.workloads.clear();
    }

    for (i, workload) in workloads.iter().enumerate() {
        if let Some(ServiceIndex(s)) = workload.service {
            services[s].workloads.push(WorkloadIndex(i));
        }
        if let Some(HostIndex(h)) = workload.host {
            hosts[h].workloads.push(WorkloadIndex(i));
        }
    }

    LinkedEntities {
        workloads,
        hosts,
        services,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Liveness;
    use crate::provider::{DeploymentRecord, HostRecord, ResourceRecord, ServiceRecord, WorkloadRecord};

    fn host(id: &str) -> Host {
        let resources = vec![
            ResourceRecord {
                name: "CPU".to_string(),
                integer_value: Some(1024),
                ..Default::default()
            },
            ResourceRecord {
                name: "MEMORY".to_string(),
                integer_value: Some(2048),
                ..Default::default()
            },
        ];
        Host::decode(
            HostRecord {
                container_instance_arn: id.to_string(),
                ec2_instance_id: Some(format!("i-{}", id)),
                registered_resources: resources.clone(),
                remaining_resources: resources,
                ..Default::default()
            },
            None,
            Liveness::Live,
        )
        .expect("valid host")
    }

    fn service(name: &str, deployments: &[&str]) -> Service {
        Service::decode(ServiceRecord {
            service_arn: format!("arn:aws:ecs:us-east-1:1:service/demo/{}", name),
            service_name: Some(name.to_string()),
            deployments: deployments
                .iter()
                .map(|id| DeploymentRecord {
                    id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
        .expect("valid service")
    }

    fn workload(id: &str, host: Option<&str>, started_by: Option<&str>) -> Workload {
        Workload::decode(WorkloadRecord {
            task_arn: id.to_string(),
            task_definition_arn: "def:1".to_string(),
            container_instance_arn: host.map(str::to_string),
            started_by: started_by.map(str::to_string),
            last_status: Some("RUNNING".to_string()),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        })
        .expect("valid task")
    }

    #[test]
    fn test_forward_and_inverse_links_agree() {
        let linked = link(
            vec![
                workload("t1", Some("ci-a"), Some("d1")),
                workload("t2", Some("ci-b"), Some("d2")),
                workload("t3", Some("ci-a"), Some("manual")),
                workload("t4", Some("ci-gone"), Some("d1")),
            ],
            vec![host("ci-a"), host("ci-b")],
            vec![service("web", &["d1", "d2"]), service("worker", &["d3"])],
        );

        assert_eq!(linked.workloads[0].host_index(), Some(HostIndex(0)));
        assert_eq!(linked.workloads[3].host_index(), None);
        assert_eq!(linked.workloads[2].service_index(), None);

        assert_eq!(
            linked.hosts[0].workload_indices(),
            &[WorkloadIndex(0), WorkloadIndex(2)]
        );
        assert_eq!(linked.hosts[1].workload_indices(), &[WorkloadIndex(1)]);
        assert_eq!(
            linked.services[0].workload_indices(),
            &[WorkloadIndex(0), WorkloadIndex(1), WorkloadIndex(3)]
        );
        assert!(linked.services[1].workload_indices().is_empty());

        for (i, w) in linked.workloads.iter().enumerate() {
            if let Some(HostIndex(h)) = w.host_index() {
                assert!(linked.hosts[h].workload_indices().contains(&WorkloadIndex(i)));
            }
            if let Some(ServiceIndex(s)) = w.service_index() {
                assert!(linked.services[s]
                    .workload_indices()
                    .contains(&WorkloadIndex(i)));
            }
        }
    }

    #[test]
    fn test_shared_deployment_id_links_first_service_only() {
        let linked = link(
            vec![workload("t1", None, Some("dup"))],
            vec![],
            vec![service("a", &["dup"]), service("b", &["dup"])],
        );

        assert_eq!(linked.workloads[0].service_index(), Some(ServiceIndex(0)));
        assert_eq!(linked.services[0].workload_indices().len(), 1);
        assert!(linked.services[1].workload_indices().is_empty());
    }

    #[test]
    fn test_relinking_is_idempotent() {
        let first = link(
            vec![workload("t1", Some("ci-a"), Some("d1"))],
            vec![host("ci-a")],
            vec![service("web", &["d1"])],
        );
        let second = link(first.workloads, first.hosts, first.services);

        assert_eq!(second.hosts[0].workload_indices(), &[WorkloadIndex(0)]);
        assert_eq!(second.services[0].workload_indices(), &[WorkloadIndex(0)]);
    }
}
