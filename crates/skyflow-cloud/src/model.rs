//! Desired and observed resource shapes shared by every resource kind

use crate::timeofday::TimeOfDay;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Annotation carrying the provider-assigned identifier between passes
pub const EXTERNAL_ID_ANNOTATION: &str = "skyflow.io/external-id";

/// Annotation carrying the zone the remote counterpart lives in
pub const ZONE_ANNOTATION: &str = "skyflow.io/zone";

/// Key/value bag the hosting layer persists alongside the declared resource
pub type Annotations = BTreeMap<String, String>;

/// Metadata of a declared resource, as handed over by the hosting layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Declared object name
    pub name: String,

    /// Persisted annotations (including [`EXTERNAL_ID_ANNOTATION`])
    #[serde(default)]
    pub annotations: Annotations,

    /// Set once the owner asked for removal
    #[serde(default)]
    pub deletion_requested: bool,
}

impl ResourceMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn marked_for_deletion(mut self) -> Self {
        self.deletion_requested = true;
        self
    }

    pub fn external_id(&self) -> Option<&str> {
        self.annotations
            .get(EXTERNAL_ID_ANNOTATION)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Zone recorded by an earlier pass
    pub fn recorded_zone(&self) -> Option<&str> {
        self.annotations
            .get(ZONE_ANNOTATION)
            .map(String::as_str)
            .filter(|zone| !zone.is_empty())
    }
}

/// How the remote API addresses one resource instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Kind label (e.g. "postgres", "bucket")
    pub kind: String,

    /// Remote name of the resource
    pub name: String,

    /// Zone the resource lives in
    pub zone: String,

    /// Provider-assigned identifier, once known
    pub external_id: Option<String>,
}

impl Identity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            zone: zone.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Full resource key (kind:zone:name)
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.kind, self.zone, self.name)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external_id {
            Some(id) => write!(f, "{} ({})", self.key(), id),
            None => write!(f, "{}", self.key()),
        }
    }
}

/// Identifier assigned by the provider on create
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
    /// Maintenance disabled
    Never,
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
            DayOfWeek::Never => "never",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub day_of_week: DayOfWeek,
    pub time_of_day: TimeOfDay,
}

impl fmt::Display for MaintenanceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day_of_week, self.time_of_day)
    }
}

/// User-declared configuration of one resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredSpec {
    pub name: String,

    pub zone: String,

    /// Sizing plan (e.g. "hobbyist-2", "business-8")
    #[serde(default)]
    pub plan: String,

    /// Allowed client CIDR ranges
    #[serde(default)]
    pub ip_filter: Vec<String>,

    #[serde(default)]
    pub maintenance: Option<MaintenanceWindow>,

    #[serde(default)]
    pub backup: Option<TimeOfDay>,

    #[serde(default)]
    pub version: Option<String>,

    /// Free-form settings documents, keyed by schema name
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub termination_protection: bool,

    /// Names a credential is scoped to (e.g. bucket names)
    #[serde(default)]
    pub access_scope: Vec<String>,
}

impl DesiredSpec {
    pub fn new(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub name: String,
    pub role: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: String,
    pub message: String,
}

/// Actual configuration of a resource as reported by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    /// Fields sharing the shape of [`DesiredSpec`]
    pub spec: DesiredSpec,

    /// Provider-assigned identifier
    pub id: Option<String>,

    #[serde(default)]
    pub node_states: Vec<NodeState>,

    #[serde(default)]
    pub notifications: Vec<Notification>,

    /// Connection endpoints (uri, host, port, ...)
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    pub observed_at: DateTime<Utc>,
}

impl ObservedState {
    pub fn new(spec: DesiredSpec) -> Self {
        Self {
            spec,
            id: None,
            node_states: Vec::new(),
            notifications: Vec::new(),
            endpoints: BTreeMap::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_endpoint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.endpoints.insert(key.into(), value.into());
        self
    }
}
