use super::{parse_timestamp, WorkloadIndex};
use crate::provider::{
    InstanceHealthRecord, LoadBalancerRecord, ServiceRecord, TargetHealthRecord,
};
use crate::{EcsInfoError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub id: String,
    pub status: Option<String>,
    pub definition_id: Option<String>,
    pub desired_count: i64,
    pub running_count: i64,
    pub pending_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// Which health API answers for a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadBalancerKind {
    TargetGroup { arn: String },
    Classic { name: String },
}

impl LoadBalancerKind {
    /// A target group id selects the target-group API even when a name is present
    pub fn classify(record: &LoadBalancerRecord) -> Option<Self> {
        if let Some(arn) = record.target_group_arn.as_ref().filter(|s| !s.is_empty()) {
            return Some(LoadBalancerKind::TargetGroup { arn: arn.clone() });
        }
        record
            .load_balancer_name
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|name| LoadBalancerKind::Classic { name: name.clone() })
    }

    pub fn label(&self) -> &str {
        match self {
            LoadBalancerKind::TargetGroup { arn } => arn,
            LoadBalancerKind::Classic { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetHealth {
    pub target_id: String,
    pub port: Option<i32>,
    pub state: Option<String>,
    pub reason: Option<String>,
    pub description: Option<String>,
}

impl From<TargetHealthRecord> for TargetHealth {
    fn from(record: TargetHealthRecord) -> Self {
        let (target_id, port) = record
            .target
            .map(|t| (t.id, t.port))
            .unwrap_or_default();
        let health = record.target_health.unwrap_or_default();

        Self {
            target_id,
            port,
            state: health.state,
            reason: health.reason,
            description: health.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceHealth {
    pub instance_id: String,
    pub state: Option<String>,
    pub reason_code: Option<String>,
    pub description: Option<String>,
}

impl From<InstanceHealthRecord> for InstanceHealth {
    fn from(record: InstanceHealthRecord) -> Self {
        Self {
            instance_id: record.instance_id,
            state: record.state,
            reason_code: record.reason_code,
            description: record.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "targets", rename_all = "snake_case")]
pub enum LoadBalancerHealth {
    TargetGroup(Vec<TargetHealth>),
    Classic(Vec<InstanceHealth>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerAttachment {
    pub kind: LoadBalancerKind,
    pub container_name: Option<String>,
    pub container_port: Option<i32>,
    /// Filled in by load balancer enrichment
    pub health: Option<LoadBalancerHealth>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub desired_count: i64,
    pub running_count: i64,
    pub pending_count: i64,
    pub deployments: Vec<Deployment>,
    pub load_balancers: Vec<LoadBalancerAttachment>,
    pub events: Vec<ServiceEvent>,
    pub(crate) workloads: Vec<WorkloadIndex>,
}

impl Service {
    pub fn decode(record: ServiceRecord) -> Result<Self> {
        const KIND: &str = "service";
        let id = record.service_arn.as_str();

        if id.is_empty() {
            return Err(EcsInfoError::invalid(KIND, "<unknown>", "missing serviceArn"));
        }

        let name = record
            .service_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| id.rsplit('/').next().unwrap_or(id).to_string());

        let deployments = record
            .deployments
            .iter()
            .map(|d| {
                Ok(Deployment {
                    id: d.id.clone(),
                    status: d.status.clone(),
                    definition_id: d.task_definition.clone(),
                    desired_count: d.desired_count,
                    running_count: d.running_count,
                    pending_count: d.pending_count,
                    created_at: parse_timestamp(KIND, id, "deployment createdAt", d.created_at.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let load_balancers = record
            .load_balancers
            .iter()
            .map(|lb| {
                let kind = LoadBalancerKind::classify(lb).ok_or_else(|| {
                    EcsInfoError::invalid(
                        KIND,
                        id,
                        "load balancer has neither targetGroupArn nor loadBalancerName",
                    )
                })?;
                Ok(LoadBalancerAttachment {
                    kind,
                    container_name: lb.container_name.clone(),
                    container_port: lb.container_port,
                    health: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let events = record
            .events
            .iter()
            .map(|e| {
                let created_at = parse_timestamp(KIND, id, "event createdAt", e.created_at.as_deref())?
                    .ok_or_else(|| EcsInfoError::invalid(KIND, id, "event without createdAt"))?;
                Ok(ServiceEvent {
                    id: e.id.clone(),
                    created_at,
                    message: e.message.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: record.service_arn,
            name,
            status: record.status,
            desired_count: record.desired_count,
            running_count: record.running_count,
            pending_count: record.pending_count,
            deployments,
            load_balancers,
            events,
            workloads: Vec::new(),
        })
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn deployment_ids(&self) -> impl Iterator<Item = &str> {
        self.deployments.iter().map(|d| d.id.as_str())
    }

    pub fn has_deployment(&self, id: &str) -> bool {
        self.deployments.iter().any(|d| d.id == id)
    }

    pub fn workload_indices(&self) -> &[WorkloadIndex] {
        &self.workloads
    }

    /// Events oldest first, with the leading `(service name)` tag removed
    pub fn events_chronological(&self) -> Vec<(DateTime<Utc>, String)> {
        let mut events: Vec<_> = self
            .events
            .iter()
            .map(|e| (e.created_at, strip_event_tag(&e.message).to_string()))
            .collect();
        events.sort_by_key(|(at, _)| *at);
        events
    }
}

fn strip_event_tag(message: &str) -> &str {
    let message = message.trim();
    match message.strip_prefix('(').and_then(|rest| rest.split_once(')')) {
        Some((_, rest)) => rest.trim_start(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DeploymentRecord, ServiceEventRecord};

    fn record() -> ServiceRecord {
        ServiceRecord {
            service_arn: "arn:aws:ecs:us-east-1:1:service/demo/web".to_string(),
            service_name: Some("web".to_string()),
            deployments: vec![DeploymentRecord {
                id: "ecs-svc/1".to_string(),
                status: Some("PRIMARY".to_string()),
                ..Default::default()
            }],
            load_balancers: vec![
                LoadBalancerRecord {
                    target_group_arn: Some("tg-1".to_string()),
                    load_balancer_name: Some("ignored".to_string()),
                    ..Default::default()
                },
                LoadBalancerRecord {
                    load_balancer_name: Some("legacy".to_string()),
                    ..Default::default()
                },
            ],
            events: vec![
                ServiceEventRecord {
                    id: Some("e2".to_string()),
                    created_at: Some("2024-01-01T00:05:00Z".to_string()),
                    message: "(service web) has reached a steady state.".to_string(),
                },
                ServiceEventRecord {
                    id: Some("e1".to_string()),
                    created_at: Some("2024-01-01T00:01:00Z".to_string()),
                    message: "  (service web) registered 1 targets ".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_load_balancer_classification() {
        let service = Service::decode(record()).expect("valid service");
        assert_eq!(
            service.load_balancers[0].kind,
            LoadBalancerKind::TargetGroup {
                arn: "tg-1".to_string()
            }
        );
        assert_eq!(
            service.load_balancers[1].kind,
            LoadBalancerKind::Classic {
                name: "legacy".to_string()
            }
        );
    }

    #[test]
    fn test_load_balancer_without_identity_is_rejected() {
        let mut rec = record();
        rec.load_balancers.push(LoadBalancerRecord::default());
        assert!(Service::decode(rec).is_err());
    }

    #[test]
    fn test_events_chronological() {
        let service = Service::decode(record()).expect("valid service");
        let events = service.events_chronological();
        assert_eq!(events[0].1, "registered 1 targets");
        assert_eq!(events[1].1, "has reached a steady state.");
    }

    #[test]
    fn test_name_falls_back_to_arn() {
        let mut rec = record();
        rec.service_name = None;
        let service = Service::decode(rec).expect("valid service");
        assert_eq!(service.display_name(), "web");
        assert!(service.has_deployment("ecs-svc/1"));
        assert!(!service.has_deployment("ecs-svc/2"));
    }
}
