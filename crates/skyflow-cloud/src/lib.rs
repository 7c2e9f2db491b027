//! SkyFlow Convergence Engine
//!
//! This crate converges declared managed cloud services (databases, object
//! storage buckets, access keys) against a remote provider API. Each pass
//! observes the remote counterpart, decides whether it drifted, and issues at
//! most one corrective call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Hosting layer (controller)             │
//! │     declared resources, requeue, annotations     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 skyflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          ConvergenceEngine<A, C>          │   │
//! │  │  observe → diff → create/update/delete    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────┐  │
//! │  │    Drift     │ │   Settings   │ │Deletion │  │
//! │  │  Comparator  │ │  Defaulter   │ │ Policy  │  │
//! │  └──────────────┘ └──────────────┘ └─────────┘  │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │     dbaas     │ │    storage    │
//! │   adapters    │ │   adapters    │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod admission;
pub mod deletion;
pub mod drift;
pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod schema;
pub mod settings;
pub mod state;
pub mod timeofday;
pub mod version;
pub mod zones;

// Re-exports
pub use action::{ActionType, ReconcileFailure, ReconcileOutcome, ReconcileSummary};
pub use admission::{ImmutableField, validate_recorded_zone, validate_update};
pub use deletion::{DeletionPolicy, DeletionPolicyResolver, SweepReport};
pub use drift::{DriftOptions, DriftReport, is_up_to_date};
pub use engine::{ConvergenceEngine, ResourceInstance};
pub use error::{CloudError, Result};
pub use model::{
    Annotations, DayOfWeek, DesiredSpec, EXTERNAL_ID_ANNOTATION, Identity, MaintenanceWindow,
    NodeState, Notification, ObservedState, ProviderId, ResourceMeta, ZONE_ANNOTATION,
};
pub use provider::{ObjectPage, ObjectRef, RemoteClient, ResourceAdapter, SchemaSource};
pub use schema::{SchemaProperty, SchemaSet, SchemaTree, StaticSchemaSource};
pub use settings::set_defaults;
pub use skyflow_config::EngineConfig;
pub use state::{ConvergenceState, Verdict};
pub use timeofday::TimeOfDay;
pub use version::{Version, is_compatible_version};
pub use zones::ZoneEndpoints;
