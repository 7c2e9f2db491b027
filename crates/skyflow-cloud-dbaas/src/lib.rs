//! Managed database provider for SkyFlow
//!
//! This crate plugs managed database services into the generic
//! convergence engine of `skyflow-cloud`.
//!
//! # Features
//!
//! - PostgreSQL, MySQL, Redis, Kafka and OpenSearch services
//! - Settings documents validated per kind and defaulted from API schemas
//! - Backup schedule (PostgreSQL, MySQL) and version pinning
//!
//! # Example
//!
//! ```ignore
//! use skyflow_cloud::{ConvergenceEngine, EngineConfig};
//! use skyflow_cloud_dbaas::{DbaasAdapter, DbaasClient, HttpSchemaSource};
//!
//! let config = EngineConfig::load()?;
//! let client = DbaasClient::new(config.clone())?.with_token(token);
//! let engine = ConvergenceEngine::new(
//!     DbaasAdapter::postgres(),
//!     Arc::new(client),
//!     Arc::new(HttpSchemaSource::from_env()?),
//! )
//! .with_config(config);
//!
//! let outcome = engine.reconcile(&service, &cancel).await?;
//! ```

pub mod adapter;
pub mod client;
pub mod error;
pub mod kind;
pub mod model;
pub mod schema_source;

pub use adapter::DbaasAdapter;
pub use client::DbaasClient;
pub use error::{DbaasError, Result};
pub use kind::ServiceKind;
pub use model::{DbaasService, DbaasServiceSpec, ServiceBody, ServiceRequest};
pub use schema_source::HttpSchemaSource;

/// Engine converging one kind of managed database service
pub type DbaasEngine = skyflow_cloud::ConvergenceEngine<DbaasAdapter, DbaasClient>;
