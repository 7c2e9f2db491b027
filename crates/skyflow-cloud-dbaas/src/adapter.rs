//! Resource adapter for managed database services
//!
//! One adapter per [`ServiceKind`]. The kind decides which settings documents,
//! backup schedules and versions a declaration may carry.

use crate::error::DbaasError;
use crate::kind::ServiceKind;
use crate::model::{ApiMaintenance, BackupSchedule, DbaasService, ServiceBody, ServiceRequest};
use skyflow_cloud::{
    CloudError, DesiredSpec, ImmutableField, NodeState, Notification, ObservedState,
    ResourceAdapter, ResourceMeta, Result,
};

const VERSIONED_IMMUTABLE: &[ImmutableField] = &[
    ImmutableField::Zone,
    ImmutableField::Name,
    ImmutableField::MajorVersion,
];

const UNVERSIONED_IMMUTABLE: &[ImmutableField] = &[ImmutableField::Zone, ImmutableField::Name];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbaasAdapter {
    kind: ServiceKind,
}

impl DbaasAdapter {
    pub fn new(kind: ServiceKind) -> Self {
        Self { kind }
    }

    pub fn postgres() -> Self {
        Self::new(ServiceKind::Postgres)
    }

    pub fn mysql() -> Self {
        Self::new(ServiceKind::Mysql)
    }

    pub fn redis() -> Self {
        Self::new(ServiceKind::Redis)
    }

    pub fn kafka() -> Self {
        Self::new(ServiceKind::Kafka)
    }

    pub fn opensearch() -> Self {
        Self::new(ServiceKind::Opensearch)
    }

    pub fn service_kind(&self) -> ServiceKind {
        self.kind
    }

    fn unsupported(&self, message: impl Into<String>) -> CloudError {
        DbaasError::Unsupported {
            kind: self.kind.to_string(),
            message: message.into(),
        }
        .into()
    }

    fn request(&self, desired: &DesiredSpec) -> ServiceRequest {
        ServiceRequest {
            kind: self.kind,
            name: desired.name.clone(),
            zone: desired.zone.clone(),
            plan: desired.plan.clone(),
            ip_filter: desired.ip_filter.clone(),
            maintenance: desired.maintenance.map(ApiMaintenance::from),
            backup_schedule: desired.backup.map(BackupSchedule::from),
            version: desired.version.clone().filter(|v| !v.is_empty()),
            termination_protection: desired.termination_protection,
            settings: desired
                .settings
                .iter()
                .map(|(schema, document)| (ServiceRequest::settings_key(schema), document.clone()))
                .collect(),
        }
    }
}

impl ResourceAdapter for DbaasAdapter {
    type Resource = DbaasService;
    type Remote = ServiceBody;
    type CreateRequest = ServiceRequest;
    type UpdateRequest = ServiceRequest;

    fn kind(&self) -> &'static str {
        self.kind.as_str()
    }

    fn meta<'a>(&self, resource: &'a DbaasService) -> &'a ResourceMeta {
        &resource.meta
    }

    fn to_desired_spec(&self, resource: &DbaasService) -> Result<DesiredSpec> {
        let spec = &resource.spec;

        if spec.plan.trim().is_empty() {
            return Err(CloudError::MalformedInput(format!(
                "{} service '{}' has no plan",
                self.kind, resource.meta.name
            )));
        }
        if let Some(name) = spec
            .settings
            .keys()
            .find(|name| !self.kind.settings_schemas().contains(&name.as_str()))
        {
            return Err(CloudError::UnknownSchema(format!(
                "{} (accepted by {}: {})",
                name,
                self.kind,
                self.kind.settings_schemas().join(", ")
            )));
        }
        if spec.backup_schedule.is_some() && !self.kind.supports_backup_schedule() {
            return Err(self.unsupported("backup schedules cannot be configured"));
        }
        if let Some(time) = spec.backup_schedule {
            // the API schedules backups to the minute
            if time.second() != 0 {
                return Err(CloudError::MalformedInput(format!(
                    "backup schedule of '{}' must be whole minutes, got {}",
                    resource.meta.name, time
                )));
            }
        }
        if spec.version.is_some() && !self.kind.supports_version() {
            return Err(self.unsupported("version cannot be pinned"));
        }

        Ok(DesiredSpec {
            name: resource.meta.name.clone(),
            zone: spec.zone.clone(),
            plan: spec.plan.clone(),
            ip_filter: spec.ip_filter.clone(),
            maintenance: spec.maintenance,
            backup: spec.backup_schedule,
            version: spec.version.clone(),
            settings: spec.settings.clone(),
            termination_protection: spec.termination_protection,
            access_scope: Vec::new(),
        })
    }

    fn to_observed_state(&self, remote: &ServiceBody) -> Result<ObservedState> {
        if ServiceKind::from_service_type(&remote.service_type) != Some(self.kind) {
            return Err(CloudError::MalformedInput(format!(
                "service '{}' is of type {}, expected {}",
                remote.name,
                remote.service_type,
                self.kind.service_type()
            )));
        }

        let spec = DesiredSpec {
            name: remote.name.clone(),
            zone: remote.zone.clone().unwrap_or_default(),
            plan: remote.plan.clone(),
            ip_filter: remote.ip_filter.clone(),
            maintenance: remote.maintenance.map(Into::into),
            backup: remote.backup_time(),
            version: remote.version.clone(),
            settings: remote.settings(),
            termination_protection: remote.termination_protection,
            access_scope: Vec::new(),
        };

        let mut observed = ObservedState::new(spec);
        observed.id = remote.id.clone();
        observed.node_states = remote
            .node_states
            .iter()
            .map(|node| NodeState {
                name: node.name.clone(),
                role: node.role.clone(),
                state: node.state.clone(),
            })
            .collect();
        observed.notifications = remote
            .notifications
            .iter()
            .map(|n| Notification {
                level: n.level.clone(),
                message: n.message.clone(),
            })
            .collect();

        if let Some(uri) = &remote.uri {
            observed = observed.with_endpoint("uri", uri);
        }
        for (key, value) in &remote.uri_params {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            observed = observed.with_endpoint(key, value);
        }

        Ok(observed)
    }

    fn build_create_request(&self, desired: &DesiredSpec) -> Result<ServiceRequest> {
        Ok(self.request(desired))
    }

    fn build_update_request(&self, desired: &DesiredSpec) -> Result<ServiceRequest> {
        Ok(self.request(desired))
    }

    fn schema_kind(&self) -> Option<&'static str> {
        Some(self.kind.as_str())
    }

    fn immutable_fields(&self) -> &'static [ImmutableField] {
        if self.kind.supports_version() {
            VERSIONED_IMMUTABLE
        } else {
            UNVERSIONED_IMMUTABLE
        }
    }
}
