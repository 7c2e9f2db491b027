//! Seams between the engine and the outside world
//!
//! [`RemoteClient`] is the authenticated handle on the remote API,
//! [`SchemaSource`] serves settings schemas, and [`ResourceAdapter`] teaches
//! the generic engine one resource kind.

use crate::admission::ImmutableField;
use crate::deletion::DeletionPolicy;
use crate::error::{CloudError, Result};
use crate::model::{DesiredSpec, Identity, ObservedState, ProviderId, ResourceMeta};
use crate::schema::SchemaSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Converts between one resource kind's declared/remote shapes and the
/// engine's common model
pub trait ResourceAdapter: Send + Sync + 'static {
    /// Declared resource as handed over by the hosting layer
    type Resource: Send + Sync + 'static;

    /// Resource as returned by the remote API
    type Remote: Send + Sync + 'static;

    type CreateRequest: Send + Sync + 'static;

    type UpdateRequest: Send + Sync + 'static;

    /// Kind label used in identities and logs (e.g. "postgres")
    fn kind(&self) -> &'static str;

    fn meta<'a>(&self, resource: &'a Self::Resource) -> &'a ResourceMeta;

    fn to_desired_spec(&self, resource: &Self::Resource) -> Result<DesiredSpec>;

    fn to_observed_state(&self, remote: &Self::Remote) -> Result<ObservedState>;

    fn build_create_request(&self, desired: &DesiredSpec) -> Result<Self::CreateRequest>;

    fn build_update_request(&self, desired: &DesiredSpec) -> Result<Self::UpdateRequest>;

    /// Service kind passed to the [`SchemaSource`]; `None` when the kind has
    /// no settings documents
    fn schema_kind(&self) -> Option<&'static str> {
        None
    }

    fn immutable_fields(&self) -> &'static [ImmutableField] {
        &[ImmutableField::Zone, ImmutableField::Name]
    }

    /// Deletion policy for container kinds; `None` for plain resources
    fn deletion_policy(&self, _resource: &Self::Resource) -> Option<DeletionPolicy> {
        None
    }
}

/// Authenticated access to the remote API for one resource kind
///
/// Implementations report a missing resource as [`CloudError::NotFound`], a
/// duplicate create as [`CloudError::AlreadyExists`] and network or auth
/// failures as [`CloudError::Transport`]. They never retry.
#[async_trait]
pub trait RemoteClient<A: ResourceAdapter>: Send + Sync {
    async fn get(&self, identity: &Identity) -> Result<A::Remote>;

    async fn create(&self, request: &A::CreateRequest) -> Result<ProviderId>;

    async fn update(&self, identity: &Identity, request: &A::UpdateRequest) -> Result<()>;

    async fn delete(&self, identity: &Identity) -> Result<()>;

    /// One page of the objects held by a container. Passing `None` restarts
    /// the listing from the beginning.
    async fn list_contained_objects(
        &self,
        _identity: &Identity,
        _continuation: Option<String>,
    ) -> Result<ObjectPage> {
        Ok(ObjectPage::default())
    }

    async fn remove_contained_object(
        &self,
        identity: &Identity,
        object: &ObjectRef,
        _bypass_lock: bool,
    ) -> Result<()> {
        Err(CloudError::InvalidConfig(format!(
            "{} cannot hold objects (asked to remove {})",
            identity, object.key
        )))
    }

    /// Whether a protective retention lock is active. `NoLockConfigured`
    /// means the container has none.
    async fn get_lock_state(&self, identity: &Identity) -> Result<bool> {
        Err(CloudError::NoLockConfigured(identity.to_string()))
    }
}

/// Settings schemas per service kind, fetched fresh on every call
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self, service_kind: &str) -> Result<SchemaSet>;
}

/// Reference to an object inside a container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }

    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// One page of a container listing. Entries that could not be read are
/// reported individually so the rest of the page stays usable.
#[derive(Debug, Default)]
pub struct ObjectPage {
    pub entries: Vec<Result<ObjectRef>>,
    pub next: Option<String>,
}

impl ObjectPage {
    pub fn new(entries: Vec<Result<ObjectRef>>) -> Self {
        Self {
            entries,
            next: None,
        }
    }

    pub fn with_next(mut self, continuation: impl Into<String>) -> Self {
        self.next = Some(continuation.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
