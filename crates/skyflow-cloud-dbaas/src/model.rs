//! Declared and wire shapes of a managed database service

use crate::kind::ServiceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skyflow_cloud::{DayOfWeek, MaintenanceWindow, ResourceMeta, TimeOfDay};
use std::collections::BTreeMap;

const SETTINGS_SUFFIX: &str = "-settings";

/// A managed database service as declared by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbaasService {
    pub meta: ResourceMeta,
    pub spec: DbaasServiceSpec,
}

impl DbaasService {
    pub fn new(name: impl Into<String>, spec: DbaasServiceSpec) -> Self {
        Self {
            meta: ResourceMeta::new(name),
            spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbaasServiceSpec {
    pub zone: String,

    pub plan: String,

    #[serde(default)]
    pub ip_filter: Vec<String>,

    #[serde(default)]
    pub maintenance: Option<MaintenanceWindow>,

    /// Daily backup start (PostgreSQL and MySQL only)
    #[serde(default)]
    pub backup_schedule: Option<TimeOfDay>,

    #[serde(default)]
    pub version: Option<String>,

    /// Settings documents keyed by schema name ("pg", "pgbouncer", ...)
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,

    #[serde(default)]
    pub termination_protection: bool,
}

impl DbaasServiceSpec {
    pub fn new(zone: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            plan: plan.into(),
            ..Default::default()
        }
    }
}

/// Maintenance window as the API spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMaintenance {
    pub dow: DayOfWeek,
    pub time: TimeOfDay,
}

impl From<MaintenanceWindow> for ApiMaintenance {
    fn from(window: MaintenanceWindow) -> Self {
        Self {
            dow: window.day_of_week,
            time: window.time_of_day,
        }
    }
}

impl From<ApiMaintenance> for MaintenanceWindow {
    fn from(api: ApiMaintenance) -> Self {
        Self {
            day_of_week: api.dow,
            time_of_day: api.time,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackupSchedule {
    pub backup_hour: Option<u8>,
    pub backup_minute: Option<u8>,
}

impl From<TimeOfDay> for BackupSchedule {
    fn from(time: TimeOfDay) -> Self {
        Self {
            backup_hour: Some(time.hour()),
            backup_minute: Some(time.minute()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiNodeState {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiNotification {
    pub level: String,
    pub message: String,
}

/// Service body returned by `GET /dbaas-{kind}/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceBody {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(rename = "type")]
    pub service_type: String,

    pub plan: String,

    /// Not part of the body; filled in from the zone the request went to
    #[serde(default)]
    pub zone: Option<String>,

    #[serde(default)]
    pub ip_filter: Vec<String>,

    #[serde(default)]
    pub maintenance: Option<ApiMaintenance>,

    #[serde(default)]
    pub backup_schedule: Option<BackupSchedule>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub termination_protection: bool,

    #[serde(default)]
    pub node_states: Vec<ApiNodeState>,

    #[serde(default)]
    pub notifications: Vec<ApiNotification>,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub uri_params: BTreeMap<String, Value>,

    /// Remaining fields, including the `<schema>-settings` documents
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ServiceBody {
    /// Settings documents keyed by schema name
    pub fn settings(&self) -> BTreeMap<String, Value> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                key.strip_suffix(SETTINGS_SUFFIX)
                    .map(|schema| (schema.to_string(), value.clone()))
            })
            .collect()
    }

    /// Backup start time, when both hour and minute are reported
    pub fn backup_time(&self) -> Option<TimeOfDay> {
        let schedule = self.backup_schedule?;
        TimeOfDay::new(schedule.backup_hour?, schedule.backup_minute?, 0).ok()
    }
}

/// Body of `POST`/`PUT /dbaas-{kind}/{name}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceRequest {
    #[serde(skip)]
    pub kind: ServiceKind,

    #[serde(skip)]
    pub name: String,

    #[serde(skip)]
    pub zone: String,

    pub plan: String,

    pub ip_filter: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<ApiMaintenance>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<BackupSchedule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub termination_protection: bool,

    /// `<schema>-settings` documents
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl ServiceRequest {
    pub fn settings_key(schema: &str) -> String {
        format!("{}{}", schema, SETTINGS_SUFFIX)
    }
}
