//! Control plane backed by the AWS SDK
//!
//! Credentials, profile and endpoint come from the SDK's default provider
//! chain; only the region is chosen here. SDK responses are copied into the
//! transport records so they go through the same decode step as captured
//! documents.

use super::{
    ClusterRecord, ComputeInstanceRecord, Connect, ContainerDefinitionRecord,
    ContainerOverrideRecord, ContainerRecord, ControlPlane, DeploymentRecord, HostRecord,
    InstanceHealthRecord, InstanceStateRecord, KeyValueRecord, LoadBalancerRecord, Page,
    PlacementRecord, ProviderError, ProviderResult, ResourceRecord, ServiceEventRecord,
    ServiceRecord, TargetHealthRecord, TargetHealthStateRecord, TargetRecord, TaskOverrideRecord,
    WorkloadDefinitionRecord, WorkloadRecord,
};
use crate::model::WorkloadStatus;
use crate::Result;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ecs::config::Region;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ecs::primitives::{DateTime, DateTimeFormat};
use aws_sdk_ecs::types as ecs;
use tracing::debug;

/// Connects to the region's ECS, EC2 and ELB endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConnector;

#[async_trait]
impl Connect for AwsConnector {
    type Plane = AwsControlPlane;

    async fn connect(&self, region: Option<&str>) -> Result<Self::Plane> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        debug!(
            "Connected to {}",
            config.region().map(|r| r.as_ref()).unwrap_or("default region")
        );

        Ok(AwsControlPlane::new(&config))
    }
}

#[derive(Debug, Clone)]
pub struct AwsControlPlane {
    ecs: aws_sdk_ecs::Client,
    ec2: aws_sdk_ec2::Client,
    elb: aws_sdk_elasticloadbalancing::Client,
    elbv2: aws_sdk_elasticloadbalancingv2::Client,
}

impl AwsControlPlane {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ecs: aws_sdk_ecs::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
            elb: aws_sdk_elasticloadbalancing::Client::new(config),
            elbv2: aws_sdk_elasticloadbalancingv2::Client::new(config),
        }
    }
}

fn sdk_error<E>(err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ProviderError::new(code, message)
}

fn page(ids: &[String], next_token: Option<&str>) -> Page {
    Page::new(ids.to_vec(), next_token.map(str::to_string))
}

// SDK accessors differ between optional and plain members across models;
// these accept either shape.

fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

fn opt<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

fn count(value: impl Into<Option<i32>>) -> i64 {
    value.into().map(i64::from).unwrap_or_default()
}

fn timestamp(value: Option<&DateTime>) -> Option<String> {
    value.and_then(|t| t.fmt(DateTimeFormat::DateTime).ok())
}

fn pairs(values: &[ecs::KeyValuePair]) -> Vec<KeyValueRecord> {
    values
        .iter()
        .map(|kv| KeyValueRecord {
            name: text(kv.name()),
            value: text(kv.value()),
        })
        .collect()
}

fn cluster_record(cluster: &ecs::Cluster) -> ClusterRecord {
    ClusterRecord {
        cluster_arn: text(cluster.cluster_arn()),
        cluster_name: opt(cluster.cluster_name()),
        status: opt(cluster.status()),
        registered_container_instances_count: count(cluster.registered_container_instances_count()),
        running_tasks_count: count(cluster.running_tasks_count()),
        pending_tasks_count: count(cluster.pending_tasks_count()),
        active_services_count: count(cluster.active_services_count()),
    }
}

fn resource_record(resource: &ecs::Resource) -> ResourceRecord {
    let kind = opt(resource.r#type());
    let integer: Option<i32> = resource.integer_value().into();
    let long: Option<i64> = resource.long_value().into();
    let double: Option<f64> = resource.double_value().into();

    match kind.as_deref() {
        Some("LONG") => ResourceRecord {
            name: text(resource.name()),
            kind,
            long_value: long,
            ..Default::default()
        },
        Some("DOUBLE") => ResourceRecord {
            name: text(resource.name()),
            kind,
            double_value: double,
            ..Default::default()
        },
        _ => ResourceRecord {
            name: text(resource.name()),
            kind,
            integer_value: integer.map(i64::from),
            ..Default::default()
        },
    }
}

fn host_record(instance: &ecs::ContainerInstance) -> HostRecord {
    let connected: Option<bool> = instance.agent_connected().into();

    HostRecord {
        container_instance_arn: text(instance.container_instance_arn()),
        ec2_instance_id: opt(instance.ec2_instance_id()),
        status: opt(instance.status()),
        agent_connected: connected.unwrap_or(false),
        running_tasks_count: count(instance.running_tasks_count()),
        pending_tasks_count: count(instance.pending_tasks_count()),
        registered_resources: instance
            .registered_resources()
            .iter()
            .map(resource_record)
            .collect(),
        remaining_resources: instance
            .remaining_resources()
            .iter()
            .map(resource_record)
            .collect(),
    }
}

fn instance_record(instance: &aws_sdk_ec2::types::Instance) -> ComputeInstanceRecord {
    ComputeInstanceRecord {
        instance_id: text(instance.instance_id()),
        instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
        placement: instance.placement().map(|p| PlacementRecord {
            availability_zone: opt(p.availability_zone()),
        }),
        private_ip_address: opt(instance.private_ip_address()),
        public_dns_name: opt(instance.public_dns_name()),
        private_dns_name: opt(instance.private_dns_name()),
        state: instance.state().map(|s| InstanceStateRecord {
            name: s.name().map(|n| n.as_str().to_string()),
        }),
        launch_time: timestamp(instance.launch_time()),
    }
}

fn service_record(service: &ecs::Service) -> ServiceRecord {
    ServiceRecord {
        service_arn: text(service.service_arn()),
        service_name: opt(service.service_name()),
        status: opt(service.status()),
        desired_count: count(service.desired_count()),
        running_count: count(service.running_count()),
        pending_count: count(service.pending_count()),
        deployments: service
            .deployments()
            .iter()
            .map(|d| DeploymentRecord {
                id: text(d.id()),
                status: opt(d.status()),
                task_definition: opt(d.task_definition()),
                desired_count: count(d.desired_count()),
                running_count: count(d.running_count()),
                pending_count: count(d.pending_count()),
                created_at: timestamp(d.created_at()),
            })
            .collect(),
        load_balancers: service
            .load_balancers()
            .iter()
            .map(|lb| LoadBalancerRecord {
                target_group_arn: opt(lb.target_group_arn()),
                load_balancer_name: opt(lb.load_balancer_name()),
                container_name: opt(lb.container_name()),
                container_port: lb.container_port().into(),
            })
            .collect(),
        events: service
            .events()
            .iter()
            .map(|e| ServiceEventRecord {
                id: opt(e.id()),
                created_at: timestamp(e.created_at()),
                message: text(e.message()),
            })
            .collect(),
    }
}

fn definition_record(definition: &ecs::TaskDefinition) -> WorkloadDefinitionRecord {
    let revision: Option<i32> = definition.revision().into();

    WorkloadDefinitionRecord {
        task_definition_arn: text(definition.task_definition_arn()),
        family: opt(definition.family()),
        revision: revision.map(i64::from),
        container_definitions: definition
            .container_definitions()
            .iter()
            .map(|c| {
                let cpu: Option<i32> = c.cpu().into();
                let memory: Option<i32> = c.memory().into();
                ContainerDefinitionRecord {
                    name: text(c.name()),
                    image: opt(c.image()),
                    cpu: cpu.map(i64::from),
                    memory: memory.map(i64::from),
                    environment: pairs(c.environment()),
                }
            })
            .collect(),
    }
}

fn workload_record(task: &ecs::Task) -> WorkloadRecord {
    WorkloadRecord {
        task_arn: text(task.task_arn()),
        task_definition_arn: text(task.task_definition_arn()),
        container_instance_arn: opt(task.container_instance_arn()),
        last_status: opt(task.last_status()),
        desired_status: opt(task.desired_status()),
        started_by: opt(task.started_by()),
        created_at: timestamp(task.created_at()),
        started_at: timestamp(task.started_at()),
        stopped_at: timestamp(task.stopped_at()),
        stopped_reason: opt(task.stopped_reason()),
        containers: task
            .containers()
            .iter()
            .map(|c| ContainerRecord {
                name: text(c.name()),
                container_arn: opt(c.container_arn()),
                last_status: opt(c.last_status()),
                exit_code: c.exit_code().into(),
                reason: opt(c.reason()),
            })
            .collect(),
        overrides: task.overrides().map(|o| TaskOverrideRecord {
            container_overrides: o
                .container_overrides()
                .iter()
                .map(|c| ContainerOverrideRecord {
                    name: text(c.name()),
                    environment: pairs(c.environment()),
                })
                .collect(),
        }),
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn list_clusters(&self, next_token: Option<String>) -> ProviderResult<Page> {
        let out = self
            .ecs
            .list_clusters()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(page(out.cluster_arns(), out.next_token()))
    }

    async fn describe_clusters(&self, clusters: &[String]) -> ProviderResult<Vec<ClusterRecord>> {
        let out = self
            .ecs
            .describe_clusters()
            .set_clusters(Some(clusters.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out.clusters().iter().map(cluster_record).collect())
    }

    async fn list_hosts(&self, cluster: &str, next_token: Option<String>) -> ProviderResult<Page> {
        let out = self
            .ecs
            .list_container_instances()
            .cluster(cluster)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(page(out.container_instance_arns(), out.next_token()))
    }

    async fn describe_hosts(&self, cluster: &str, ids: &[String]) -> ProviderResult<Vec<HostRecord>> {
        let out = self
            .ecs
            .describe_container_instances()
            .cluster(cluster)
            .set_container_instances(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out.container_instances().iter().map(host_record).collect())
    }

    async fn describe_compute_instances(
        &self,
        ids: &[String],
    ) -> ProviderResult<Vec<ComputeInstanceRecord>> {
        let out = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(instance_record)
            .collect())
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> ProviderResult<Page> {
        let out = self
            .ecs
            .list_services()
            .cluster(cluster)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(page(out.service_arns(), out.next_token()))
    }

    async fn describe_services(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<ServiceRecord>> {
        let out = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .set_services(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out.services().iter().map(service_record).collect())
    }

    async fn describe_workload_definition(
        &self,
        id: &str,
    ) -> ProviderResult<WorkloadDefinitionRecord> {
        let out = self
            .ecs
            .describe_task_definition()
            .task_definition(id)
            .send()
            .await
            .map_err(sdk_error)?;
        out.task_definition().map(definition_record).ok_or_else(|| {
            ProviderError::new(
                "ClientException",
                format!("task definition {} was not returned", id),
            )
        })
    }

    async fn list_workloads(
        &self,
        cluster: &str,
        status: WorkloadStatus,
        next_token: Option<String>,
    ) -> ProviderResult<Page> {
        let out = self
            .ecs
            .list_tasks()
            .cluster(cluster)
            .desired_status(ecs::DesiredStatus::from(status.as_str()))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(page(out.task_arns(), out.next_token()))
    }

    async fn describe_workloads(
        &self,
        cluster: &str,
        ids: &[String],
    ) -> ProviderResult<Vec<WorkloadRecord>> {
        let out = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(ids.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out.tasks().iter().map(workload_record).collect())
    }

    async fn describe_target_health(
        &self,
        target_group: &str,
    ) -> ProviderResult<Vec<TargetHealthRecord>> {
        let out = self
            .elbv2
            .describe_target_health()
            .target_group_arn(target_group)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .target_health_descriptions()
            .iter()
            .map(|d| TargetHealthRecord {
                target: d.target().map(|t| TargetRecord {
                    id: text(t.id()),
                    port: t.port().into(),
                }),
                target_health: d.target_health().map(|h| TargetHealthStateRecord {
                    state: h.state().map(|s| s.as_str().to_string()),
                    reason: h.reason().map(|r| r.as_str().to_string()),
                    description: opt(h.description()),
                }),
            })
            .collect())
    }

    async fn describe_instance_health(
        &self,
        load_balancer: &str,
    ) -> ProviderResult<Vec<InstanceHealthRecord>> {
        let out = self
            .elb
            .describe_instance_health()
            .load_balancer_name(load_balancer)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .instance_states()
            .iter()
            .map(|s| InstanceHealthRecord {
                instance_id: text(s.instance_id()),
                state: opt(s.state()),
                reason_code: opt(s.reason_code()),
                description: opt(s.description()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Host, Liveness, Service, Workload, WorkloadStatus};

    fn resource(name: &str, value: i32) -> ecs::Resource {
        ecs::Resource::builder()
            .name(name)
            .r#type("INTEGER")
            .integer_value(value)
            .build()
    }

    #[test]
    fn test_container_instance_decodes() {
        let instance = ecs::ContainerInstance::builder()
            .container_instance_arn("arn:aws:ecs:us-east-1:1:container-instance/demo/abc")
            .ec2_instance_id("i-0abc")
            .status("ACTIVE")
            .agent_connected(true)
            .registered_resources(resource("CPU", 2048))
            .registered_resources(resource("MEMORY", 7982))
            .remaining_resources(resource("CPU", 1024))
            .remaining_resources(resource("MEMORY", 4000))
            .build();

        let host = Host::decode(host_record(&instance), None, Liveness::Live).expect("valid host");

        assert_eq!(host.compute_instance_id, "i-0abc");
        assert_eq!(host.registered_cpu(), 2048);
        assert_eq!(host.available_memory(), 4000);
        assert!(host.agent_connected);
    }

    #[test]
    fn test_task_decodes_with_sdk_timestamps() {
        let task = ecs::Task::builder()
            .task_arn("arn:aws:ecs:us-east-1:1:task/demo/t1")
            .task_definition_arn("arn:aws:ecs:us-east-1:1:task-definition/web:3")
            .last_status("RUNNING")
            .desired_status("RUNNING")
            .started_by("ecs-svc/1111")
            .created_at(DateTime::from_secs(1_714_557_600))
            .containers(ecs::Container::builder().name("web").last_status("RUNNING").build())
            .build();

        let workload = Workload::decode(workload_record(&task)).expect("valid task");

        assert_eq!(workload.status, WorkloadStatus::Running);
        assert_eq!(workload.created_at.timestamp(), 1_714_557_600);
        assert_eq!(workload.started_by.as_deref(), Some("ecs-svc/1111"));
        assert_eq!(workload.containers.len(), 1);
    }

    #[test]
    fn test_service_load_balancers_copied() {
        let service = ecs::Service::builder()
            .service_arn("arn:aws:ecs:us-east-1:1:service/demo/web")
            .service_name("web")
            .deployments(ecs::Deployment::builder().id("ecs-svc/1111").build())
            .load_balancers(
                ecs::LoadBalancer::builder()
                    .load_balancer_name("legacy")
                    .container_name("web")
                    .container_port(80)
                    .build(),
            )
            .build();

        let service = Service::decode(service_record(&service)).expect("valid service");

        assert!(service.has_deployment("ecs-svc/1111"));
        assert_eq!(service.load_balancers[0].kind.label(), "legacy");
        assert_eq!(service.load_balancers[0].container_port, Some(80));
    }
}
