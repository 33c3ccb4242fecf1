use super::{pairs, parse_timestamp, HostIndex, ServiceIndex};
use crate::provider::{WorkloadDefinitionRecord, WorkloadRecord};
use crate::{EcsInfoError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkloadStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Deprovisioning,
    Stopped,
}

impl WorkloadStatus {
    /// Desired-status filters a describe cycle lists workloads by
    pub const LISTED: [WorkloadStatus; 3] = [
        WorkloadStatus::Running,
        WorkloadStatus::Pending,
        WorkloadStatus::Stopped,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            WorkloadStatus::Provisioning => "PROVISIONING",
            WorkloadStatus::Pending => "PENDING",
            WorkloadStatus::Activating => "ACTIVATING",
            WorkloadStatus::Running => "RUNNING",
            WorkloadStatus::Deactivating => "DEACTIVATING",
            WorkloadStatus::Stopping => "STOPPING",
            WorkloadStatus::Deprovisioning => "DEPROVISIONING",
            WorkloadStatus::Stopped => "STOPPED",
        }
    }
}

impl FromStr for WorkloadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PROVISIONING" => Ok(WorkloadStatus::Provisioning),
            "PENDING" => Ok(WorkloadStatus::Pending),
            "ACTIVATING" => Ok(WorkloadStatus::Activating),
            "RUNNING" => Ok(WorkloadStatus::Running),
            "DEACTIVATING" => Ok(WorkloadStatus::Deactivating),
            "STOPPING" => Ok(WorkloadStatus::Stopping),
            "DEPROVISIONING" => Ok(WorkloadStatus::Deprovisioning),
            "STOPPED" => Ok(WorkloadStatus::Stopped),
            other => Err(format!("unknown status {}", other)),
        }
    }
}

impl std::fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    pub status: Option<String>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerOverride {
    pub name: String,
    pub environment: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: Option<String>,
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
    pub environment: Vec<(String, String)>,
}

/// A task definition, shared by every workload started from it
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadDefinition {
    pub id: String,
    pub family: Option<String>,
    pub revision: Option<i64>,
    pub containers: Vec<ContainerDefinition>,
}

impl WorkloadDefinition {
    pub fn decode(record: WorkloadDefinitionRecord) -> Result<Self> {
        if record.task_definition_arn.is_empty() {
            return Err(EcsInfoError::invalid(
                "task definition",
                "<unknown>",
                "missing taskDefinitionArn",
            ));
        }

        let containers = record
            .container_definitions
            .iter()
            .map(|def| ContainerDefinition {
                name: def.name.clone(),
                image: def.image.clone(),
                cpu: def.cpu,
                memory: def.memory,
                environment: pairs(&def.environment),
            })
            .collect();

        Ok(Self {
            id: record.task_definition_arn,
            family: record.family,
            revision: record.revision,
            containers,
        })
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// A single task, with its links into the owning snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub id: String,
    pub definition_id: String,
    pub status: WorkloadStatus,
    pub desired_status: Option<WorkloadStatus>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stopped_reason: Option<String>,
    /// Deployment id or external actor that started the task
    pub started_by: Option<String>,
    /// Container instance the task was placed on
    pub host_id: Option<String>,
    pub containers: Vec<Container>,
    pub overrides: Vec<ContainerOverride>,
    pub definition: Option<Arc<WorkloadDefinition>>,
    pub(crate) host: Option<HostIndex>,
    pub(crate) service: Option<ServiceIndex>,
}

impl Workload {
    pub fn decode(record: WorkloadRecord) -> Result<Self> {
        const KIND: &str = "task";
        let id = record.task_arn.as_str();

        if id.is_empty() {
            return Err(EcsInfoError::invalid(KIND, "<unknown>", "missing taskArn"));
        }
        if record.task_definition_arn.is_empty() {
            return Err(EcsInfoError::invalid(KIND, id, "missing taskDefinitionArn"));
        }

        let status = record
            .last_status
            .as_deref()
            .ok_or_else(|| EcsInfoError::invalid(KIND, id, "missing lastStatus"))?
            .parse::<WorkloadStatus>()
            .map_err(|e| EcsInfoError::invalid(KIND, id, e))?;

        let desired_status = record
            .desired_status
            .as_deref()
            .map(str::parse::<WorkloadStatus>)
            .transpose()
            .map_err(|e| EcsInfoError::invalid(KIND, id, e))?;

        let created_at = parse_timestamp(KIND, id, "createdAt", record.created_at.as_deref())?
            .ok_or_else(|| EcsInfoError::invalid(KIND, id, "missing createdAt"))?;
        let started_at = parse_timestamp(KIND, id, "startedAt", record.started_at.as_deref())?;
        let stopped_at = parse_timestamp(KIND, id, "stoppedAt", record.stopped_at.as_deref())?;

        let containers = record
            .containers
            .iter()
            .map(|c| Container {
                name: c.name.clone(),
                status: c.last_status.clone(),
                exit_code: c.exit_code,
                reason: c.reason.clone(),
            })
            .collect();

        let overrides = record
            .overrides
            .map(|o| {
                o.container_overrides
                    .iter()
                    .map(|c| ContainerOverride {
                        name: c.name.clone(),
                        environment: pairs(&c.environment),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: record.task_arn,
            definition_id: record.task_definition_arn,
            status,
            desired_status,
            created_at,
            started_at,
            stopped_at,
            stopped_reason: record.stopped_reason,
            started_by: record.started_by.filter(|s| !s.is_empty()),
            host_id: record.container_instance_arn.filter(|s| !s.is_empty()),
            containers,
            overrides,
            definition: None,
            host: None,
            service: None,
        })
    }

    pub fn host_index(&self) -> Option<HostIndex> {
        self.host
    }

    pub fn service_index(&self) -> Option<ServiceIndex> {
        self.service
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkloadStatus::Running
    }

    /// Time between start and stop (or `now` while still running)
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        match self.started_at {
            Some(started) => self.stopped_at.unwrap_or(now) - started,
            None => Duration::zero(),
        }
    }

    /// Time between creation and start (or `now` if not started yet)
    pub fn boot_time(&self, now: DateTime<Utc>) -> Duration {
        self.started_at.unwrap_or(now) - self.created_at
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        [self.started_at, self.stopped_at]
            .into_iter()
            .flatten()
            .fold(self.created_at, |latest, ts| latest.max(ts))
    }

    /// Environment of every container: definition values, then overrides
    pub fn container_environments(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.containers
            .iter()
            .map(|container| {
                let mut env = BTreeMap::new();

                if let Some(def) = self
                    .definition
                    .as_ref()
                    .and_then(|d| d.container(&container.name))
                {
                    env.extend(def.environment.iter().cloned());
                }

                if let Some(over) = self.overrides.iter().find(|o| o.name == container.name) {
                    env.extend(over.environment.iter().cloned());
                }

                (container.name.clone(), env)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        ContainerDefinitionRecord, ContainerOverrideRecord, ContainerRecord, KeyValueRecord,
        TaskOverrideRecord,
    };

    fn record() -> WorkloadRecord {
        WorkloadRecord {
            task_arn: "arn:aws:ecs:us-east-1:1:task/demo/t1".to_string(),
            task_definition_arn: "arn:aws:ecs:us-east-1:1:task-definition/web:3".to_string(),
            container_instance_arn: Some("ci-a".to_string()),
            last_status: Some("RUNNING".to_string()),
            desired_status: Some("RUNNING".to_string()),
            started_by: Some("ecs-svc/1".to_string()),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            started_at: Some("2024-01-01T00:00:30Z".to_string()),
            containers: vec![ContainerRecord {
                name: "web".to_string(),
                last_status: Some("RUNNING".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn kv(name: &str, value: &str) -> KeyValueRecord {
        KeyValueRecord {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_decode_running_task() {
        let workload = Workload::decode(record()).expect("valid task");
        assert_eq!(workload.status, WorkloadStatus::Running);
        assert_eq!(workload.host_id.as_deref(), Some("ci-a"));
        assert_eq!(workload.started_by.as_deref(), Some("ecs-svc/1"));
        assert!(workload.host_index().is_none());
        assert!(workload.definition.is_none());
    }

    #[test]
    fn test_decode_rejects_unknown_status() {
        let mut bad = record();
        bad.last_status = Some("EXPLODED".to_string());
        let err = Workload::decode(bad).unwrap_err();
        assert!(matches!(err, EcsInfoError::InvalidRecord { kind: "task", .. }));
    }

    #[test]
    fn test_decode_requires_created_at() {
        let mut bad = record();
        bad.created_at = None;
        assert!(Workload::decode(bad).is_err());
    }

    #[test]
    fn test_uptime_and_boot_time() {
        let mut rec = record();
        rec.stopped_at = Some("2024-01-01T00:10:30Z".to_string());
        let workload = Workload::decode(rec).expect("valid task");
        let now = Utc::now();

        assert_eq!(workload.uptime(now), Duration::minutes(10));
        assert_eq!(workload.boot_time(now), Duration::seconds(30));
        assert_eq!(
            workload.last_update_time().to_rfc3339(),
            "2024-01-01T00:10:30+00:00"
        );
    }

    #[test]
    fn test_unstarted_task_has_no_uptime() {
        let mut rec = record();
        rec.started_at = None;
        rec.last_status = Some("PENDING".to_string());
        let workload = Workload::decode(rec).expect("valid task");

        assert_eq!(workload.uptime(Utc::now()), Duration::zero());
        assert_eq!(workload.last_update_time(), workload.created_at);
    }

    #[test]
    fn test_container_environments_apply_overrides() {
        let mut rec = record();
        rec.overrides = Some(TaskOverrideRecord {
            container_overrides: vec![ContainerOverrideRecord {
                name: "web".to_string(),
                environment: vec![kv("MODE", "debug")],
            }],
        });

        let mut workload = Workload::decode(rec).expect("valid task");
        let definition = WorkloadDefinition::decode(WorkloadDefinitionRecord {
            task_definition_arn: workload.definition_id.clone(),
            container_definitions: vec![ContainerDefinitionRecord {
                name: "web".to_string(),
                environment: vec![kv("MODE", "prod"), kv("PORT", "80")],
                ..Default::default()
            }],
            ..Default::default()
        })
        .expect("valid definition");
        workload.definition = Some(Arc::new(definition));

        let envs = workload.container_environments();
        let web = &envs["web"];
        assert_eq!(web["MODE"], "debug");
        assert_eq!(web["PORT"], "80");
    }
}
