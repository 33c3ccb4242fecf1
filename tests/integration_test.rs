use ecs_info::error::{EcsInfoError, Result};
use ecs_info::model::{Liveness, WorkloadStatus};
use ecs_info::provider::{
    ClusterRecord, ComputeInstanceRecord, DeploymentRecord, FixtureControlPlane, FixtureDocument,
    HostRecord, LoadBalancerRecord, Operation, PlacementRecord, ResourceRecord, ServiceRecord,
    WorkloadDefinitionRecord, WorkloadRecord,
};
use ecs_info::{ClusterInspector, ClusterSnapshot, DescribeConfig};
use std::path::PathBuf;

const CLUSTER: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/demo";
const DEFINITION: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition/web:1";

fn resources(cpu: i64, memory: i64) -> Vec<ResourceRecord> {
    vec![
        ResourceRecord {
            name: "CPU".to_string(),
            integer_value: Some(cpu),
            ..Default::default()
        },
        ResourceRecord {
            name: "MEMORY".to_string(),
            integer_value: Some(memory),
            ..Default::default()
        },
    ]
}

fn host(name: &str, cpu: i64, remaining_cpu: i64) -> HostRecord {
    HostRecord {
        container_instance_arn: name.to_string(),
        ec2_instance_id: Some(format!("i-{}", name)),
        status: Some("ACTIVE".to_string()),
        agent_connected: true,
        registered_resources: resources(cpu, 2048),
        remaining_resources: resources(remaining_cpu, 1024),
        ..Default::default()
    }
}

fn instance(name: &str) -> ComputeInstanceRecord {
    ComputeInstanceRecord {
        instance_id: format!("i-{}", name),
        instance_type: Some("c5.xlarge".to_string()),
        placement: Some(PlacementRecord {
            availability_zone: Some("us-east-1a".to_string()),
        }),
        ..Default::default()
    }
}

fn workload(id: &str, status: &str, host: Option<&str>, started_by: &str) -> WorkloadRecord {
    WorkloadRecord {
        task_arn: id.to_string(),
        task_definition_arn: DEFINITION.to_string(),
        container_instance_arn: host.map(str::to_string),
        last_status: Some(status.to_string()),
        desired_status: Some(status.to_string()),
        started_by: Some(started_by.to_string()),
        created_at: Some("2024-05-01T10:00:00Z".to_string()),
        ..Default::default()
    }
}

fn service(name: &str, deployment: &str) -> ServiceRecord {
    ServiceRecord {
        service_arn: format!("arn:aws:ecs:us-east-1:123456789012:service/demo/{}", name),
        service_name: Some(name.to_string()),
        deployments: vec![DeploymentRecord {
            id: deployment.to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Hosts A (1024 registered, 512 free) and B (2048, 2048) with one task on A
/// started by deployment d1 of service "svc"
fn demo() -> FixtureDocument {
    FixtureDocument {
        clusters: vec![ClusterRecord {
            cluster_arn: CLUSTER.to_string(),
            cluster_name: Some("demo".to_string()),
            ..Default::default()
        }],
        hosts: vec![host("A", 1024, 512), host("B", 2048, 2048)],
        compute_instances: vec![instance("A"), instance("B")],
        services: vec![service("svc", "d1")],
        workloads: vec![workload("t1", "RUNNING", Some("A"), "d1")],
        definitions: vec![WorkloadDefinitionRecord {
            task_definition_arn: DEFINITION.to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

async fn describe(plane: &FixtureControlPlane) -> Result<ClusterSnapshot> {
    ClusterInspector::with_defaults(plane.clone())
        .describe(CLUSTER, None)
        .await
}

fn assert_links_consistent(snapshot: &ClusterSnapshot) {
    for workload in snapshot.workloads() {
        if let Some(host) = snapshot.host_of(workload) {
            assert!(snapshot
                .workloads_on(host)
                .any(|w| std::ptr::eq(w, workload)));
        }
        if let Some(service) = snapshot.service_of(workload) {
            assert!(snapshot
                .workloads_of(service)
                .any(|w| std::ptr::eq(w, workload)));
        }
    }
    for host in snapshot.hosts() {
        for w in snapshot.workloads_on(host) {
            assert_eq!(w.host_id.as_deref(), Some(host.container_instance_id.as_str()));
        }
    }
}

#[tokio::test]
async fn test_demo_scenario() {
    let plane = FixtureControlPlane::new(demo());
    let snapshot = ClusterInspector::with_defaults(plane)
        .resolve_by_name("demo", None)
        .await
        .expect("describe succeeds");

    assert_eq!(snapshot.name(), "demo");
    assert_eq!(snapshot.registered_resources().cpu, 3072);
    assert_eq!(
        snapshot
            .host_with_most_free_cpu()
            .map(|h| h.container_instance_id.as_str()),
        Some("B")
    );

    let task = snapshot.find_workload("t1").expect("task present");
    let service = snapshot.service_of(task).expect("service resolved");
    assert_eq!(service.display_name(), "svc");
    assert_eq!(
        snapshot.host_of(task).map(|h| h.container_instance_id.as_str()),
        Some("A")
    );
    assert_links_consistent(&snapshot);
}

#[tokio::test]
async fn test_orphaned_task_host_recovered() {
    let mut doc = demo();
    doc.retired_hosts = vec![host("gone", 4096, 4096)];
    doc.workloads
        .push(workload("t-old", "STOPPED", Some("gone"), "manual"));
    let plane = FixtureControlPlane::new(doc);

    let snapshot = describe(&plane).await.expect("describe succeeds");

    let task = snapshot.find_workload("t-old").expect("task present");
    let recovered = snapshot.host_of(task).expect("host recovered");
    assert_eq!(recovered.container_instance_id, "gone");
    assert_eq!(recovered.liveness, Liveness::Recovered);

    assert_eq!(snapshot.hosts().len(), 3);
    assert_eq!(snapshot.live_hosts().count(), 2);
    assert_eq!(snapshot.registered_resources().cpu, 3072);
    assert_eq!(
        snapshot
            .host_with_most_free_cpu()
            .map(|h| h.container_instance_id.as_str()),
        Some("B")
    );
    assert_links_consistent(&snapshot);
}

#[tokio::test]
async fn test_empty_cluster_has_zero_capacity() {
    let mut doc = demo();
    doc.hosts.clear();
    doc.workloads.clear();
    let plane = FixtureControlPlane::new(doc);

    let snapshot = describe(&plane).await.expect("describe succeeds");

    assert_eq!(snapshot.registered_resources().cpu, 0);
    assert_eq!(snapshot.available_resources().memory, 0);
    assert!(snapshot.host_with_most_free_memory().is_none());
    assert!(plane.calls_to(Operation::DescribeWorkloadDefinition).is_empty());
}

#[tokio::test]
async fn test_describe_calls_are_batched() {
    let mut doc = demo();
    doc.workloads = (0..230)
        .map(|i| workload(&format!("t{:03}", i), "RUNNING", Some("A"), "d1"))
        .collect();
    doc.page_size = Some(1000);
    let plane = FixtureControlPlane::new(doc);

    let snapshot = describe(&plane).await.expect("describe succeeds");

    let ids: Vec<&str> = snapshot.workloads().iter().map(|w| w.id.as_str()).collect();
    let expected: Vec<String> = (0..230).map(|i| format!("t{:03}", i)).collect();
    assert_eq!(ids, expected);

    let calls = plane.calls_to(Operation::DescribeWorkloads);
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.arguments.len() <= 100));
    assert_eq!(plane.calls_to(Operation::DescribeWorkloadDefinition).len(), 1);

    let service = snapshot.find_service("svc").expect("service");
    assert_eq!(snapshot.workloads_of(service).count(), 230);
}

#[tokio::test]
async fn test_services_branch_failure_fails_describe() {
    let plane = FixtureControlPlane::new(demo());
    plane.fail_on(Operation::DescribeServices);

    let err = describe(&plane).await.unwrap_err();

    assert!(matches!(err, EcsInfoError::Describe { .. }));
    assert!(!plane.calls_to(Operation::ListServices).is_empty());
}

#[tokio::test]
async fn test_listing_failure_is_listing_error() {
    let plane = FixtureControlPlane::new(demo());
    plane.fail_on(Operation::ListHosts);

    let err = describe(&plane).await.unwrap_err();

    assert!(matches!(
        err,
        EcsInfoError::Listing {
            operation: "list-container-instances",
            ..
        }
    ));
}

#[tokio::test]
async fn test_enrichment_failure_fails_describe() {
    let mut doc = demo();
    doc.services[0].load_balancers = vec![LoadBalancerRecord {
        load_balancer_name: Some("legacy-elb".to_string()),
        ..Default::default()
    }];
    let plane = FixtureControlPlane::new(doc);

    let err = describe(&plane).await.unwrap_err();

    assert!(err.to_string().contains("legacy-elb"));
    assert!(matches!(err, EcsInfoError::Enrichment { .. }));
}

#[tokio::test]
async fn test_unmatched_fragment_is_not_found() {
    let plane = FixtureControlPlane::new(demo());

    let err = ClusterInspector::with_defaults(plane.clone())
        .resolve_by_name("^prod-", None)
        .await
        .unwrap_err();

    assert!(matches!(err, EcsInfoError::NotFound(ref f) if f == "^prod-"));
    assert!(plane.calls_to(Operation::DescribeClusters).is_empty());
}

#[tokio::test]
async fn test_invalid_fragment_rejected() {
    let plane = FixtureControlPlane::new(demo());

    let err = ClusterInspector::with_defaults(plane)
        .resolve_by_name("demo(", None)
        .await
        .unwrap_err();

    assert!(matches!(err, EcsInfoError::InvalidPattern(_)));
}

#[tokio::test]
async fn test_region_taken_from_cluster_arn() {
    let plane = FixtureControlPlane::new(demo());
    let config = DescribeConfig {
        default_region: Some("eu-west-1".to_string()),
        ..Default::default()
    };

    ClusterInspector::new(plane.clone(), config.clone())
        .expect("valid config")
        .describe(CLUSTER, None)
        .await
        .expect("by arn");
    ClusterInspector::new(plane.clone(), config)
        .expect("valid config")
        .describe("demo", None)
        .await
        .expect("by name");

    assert_eq!(
        plane.connected_regions(),
        vec![
            Some("us-east-1".to_string()),
            Some("eu-west-1".to_string())
        ]
    );
}

#[test]
fn test_invalid_config_rejected() {
    let plane = FixtureControlPlane::new(demo());
    let config = DescribeConfig {
        batch_size: 250,
        ..Default::default()
    };

    assert!(matches!(
        ClusterInspector::new(plane, config),
        Err(EcsInfoError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_demo_document_end_to_end() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/demo-cluster.yaml");
    let plane = FixtureControlPlane::from_path(&path).expect("document loads");

    let snapshot = ClusterInspector::with_defaults(plane.clone())
        .resolve_by_name("demo", None)
        .await
        .expect("describe succeeds");

    assert_eq!(snapshot.workloads().len(), 2);
    assert_eq!(snapshot.hosts().len(), 3);
    assert_eq!(snapshot.registered_resources().cpu, 3072);
    assert_links_consistent(&snapshot);

    let stopped = snapshot
        .workloads()
        .iter()
        .find(|w| w.status == WorkloadStatus::Stopped)
        .expect("stopped task");
    assert!(snapshot.host_of(stopped).is_some_and(|h| !h.is_live()));

    let starters = snapshot.workload_starters();
    assert_eq!(
        starters.get("(service) svc").map(String::as_str),
        Some("ecs-svc/1111")
    );
    assert_eq!(
        starters.get("deploy-bot").map(String::as_str),
        Some("deploy-bot")
    );

    let service = snapshot.find_service("svc").expect("service");
    assert!(service.load_balancers[0].health.is_some());
    assert_eq!(
        service.events_chronological()[0].1,
        "has started 1 tasks."
    );

    assert_eq!(
        snapshot.compute_instance_for_private_ip("10.0.2.33"),
        Some("i-0bbb")
    );
    assert_eq!(plane.calls_to(Operation::ListClusters).len(), 1);
}

#[test]
fn test_error_types() {
    let err = EcsInfoError::NotFound("prod".to_string());
    assert!(err.to_string().contains("prod"));

    let err = EcsInfoError::Enrichment {
        load_balancer: "web".to_string(),
        message: "throttled".to_string(),
    };
    assert!(err.to_string().contains("web"));
    assert!(err.to_string().contains("throttled"));
}

#[test]
fn test_version_const() {
    assert!(!ecs_info::VERSION.is_empty());
}
