//! Managed database service kinds

use serde::{Deserialize, Serialize};

/// Service kinds served by the DBaaS API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    #[serde(alias = "pg")]
    Postgres,
    Mysql,
    Redis,
    Kafka,
    Opensearch,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Postgres,
        ServiceKind::Mysql,
        ServiceKind::Redis,
        ServiceKind::Kafka,
        ServiceKind::Opensearch,
    ];

    /// Kind label used in API paths (`/dbaas-{kind}/...`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "postgres",
            ServiceKind::Mysql => "mysql",
            ServiceKind::Redis => "redis",
            ServiceKind::Kafka => "kafka",
            ServiceKind::Opensearch => "opensearch",
        }
    }

    /// Service type as reported in service bodies
    pub fn service_type(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "pg",
            other => other.as_str(),
        }
    }

    /// Settings documents this kind accepts
    pub fn settings_schemas(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::Postgres => &["pg", "pgbouncer", "pglookout", "timescaledb"],
            ServiceKind::Mysql => &["mysql"],
            ServiceKind::Redis => &["redis"],
            ServiceKind::Kafka => &["kafka", "kafka-rest"],
            ServiceKind::Opensearch => &["opensearch"],
        }
    }

    pub fn supports_backup_schedule(&self) -> bool {
        matches!(self, ServiceKind::Postgres | ServiceKind::Mysql)
    }

    pub fn supports_version(&self) -> bool {
        !matches!(self, ServiceKind::Redis)
    }

    pub fn from_service_type(service_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.service_type() == service_type || kind.as_str() == service_type)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
