use async_trait::async_trait;
use serde_json::json;
use skyflow_cloud::{
    CloudError, DeletionPolicy, DesiredSpec, ImmutableField, Identity, ObjectPage, ObjectRef,
    ObservedState, ProviderId, RemoteClient, ResourceAdapter, ResourceMeta, Result, SchemaProperty,
    SchemaSet, SchemaTree, StaticSchemaSource,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

const PAGE_SIZE: usize = 2;

/// Declared resource used by the engine tests
#[derive(Debug, Clone)]
pub struct Widget {
    pub meta: ResourceMeta,
    pub spec: DesiredSpec,
    pub policy: Option<DeletionPolicy>,
}

impl Widget {
    pub fn new(name: &str, zone: &str) -> Self {
        let mut spec = DesiredSpec::new(name, zone);
        spec.plan = "startup-4".into();
        Self {
            meta: ResourceMeta::new(name),
            spec,
            policy: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_policy(mut self, policy: DeletionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[allow(dead_code)]
    pub fn marked_for_deletion(mut self) -> Self {
        self.meta = self.meta.marked_for_deletion();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RemoteWidget {
    pub id: String,
    pub spec: DesiredSpec,
}

pub struct WidgetAdapter {
    pub schema_kind: Option<&'static str>,
}

impl WidgetAdapter {
    pub fn new() -> Self {
        Self { schema_kind: None }
    }

    #[allow(dead_code)]
    pub fn with_settings() -> Self {
        Self {
            schema_kind: Some("widget"),
        }
    }
}

impl ResourceAdapter for WidgetAdapter {
    type Resource = Widget;
    type Remote = RemoteWidget;
    type CreateRequest = DesiredSpec;
    type UpdateRequest = DesiredSpec;

    fn kind(&self) -> &'static str {
        "widget"
    }

    fn meta<'a>(&self, resource: &'a Widget) -> &'a ResourceMeta {
        &resource.meta
    }

    fn to_desired_spec(&self, resource: &Widget) -> Result<DesiredSpec> {
        Ok(resource.spec.clone())
    }

    fn to_observed_state(&self, remote: &RemoteWidget) -> Result<ObservedState> {
        Ok(ObservedState::new(remote.spec.clone()).with_id(&remote.id))
    }

    fn build_create_request(&self, desired: &DesiredSpec) -> Result<DesiredSpec> {
        Ok(desired.clone())
    }

    fn build_update_request(&self, desired: &DesiredSpec) -> Result<DesiredSpec> {
        Ok(desired.clone())
    }

    fn schema_kind(&self) -> Option<&'static str> {
        self.schema_kind
    }

    fn immutable_fields(&self) -> &'static [ImmutableField] {
        &[
            ImmutableField::Zone,
            ImmutableField::Name,
            ImmutableField::MajorVersion,
        ]
    }

    fn deletion_policy(&self, resource: &Widget) -> Option<DeletionPolicy> {
        resource.policy
    }
}

#[derive(Default)]
struct Inner {
    remotes: BTreeMap<String, RemoteWidget>,
    calls: Vec<String>,
    objects: Vec<String>,
    unreadable: usize,
    removed: HashSet<String>,
    failing: HashSet<String>,
    lock: Option<bool>,
    next_id: u32,
    transport_failure: bool,
    get_delay: Option<Duration>,
    zone_routed: bool,
    leading_empty_page: bool,
}

impl Inner {
    /// Zone-routed APIs only see resources of the zone they are called in
    fn key(&self, name: &str, zone: &str) -> String {
        if self.zone_routed {
            format!("{}/{}", zone, name)
        } else {
            name.to_string()
        }
    }
}

/// In-memory remote API that records every call
#[derive(Default)]
pub struct FakeClient {
    inner: Mutex<Inner>,
}

#[allow(dead_code)]
impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(self, spec: DesiredSpec) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = format!("id-{}", inner.next_id);
            let key = inner.key(&spec.name, &spec.zone);
            inner.remotes.insert(key, RemoteWidget { id, spec });
        }
        self
    }

    pub fn with_objects(self, keys: &[&str]) -> Self {
        self.inner
            .lock()
            .unwrap()
            .objects
            .extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_unreadable_entries(self, count: usize) -> Self {
        self.inner.lock().unwrap().unreadable = count;
        self
    }

    pub fn with_failing_object(self, key: &str) -> Self {
        self.inner.lock().unwrap().failing.insert(key.to_string());
        self
    }

    pub fn with_lock(self, locked: bool) -> Self {
        self.inner.lock().unwrap().lock = Some(locked);
        self
    }

    pub fn with_transport_failure(self) -> Self {
        self.inner.lock().unwrap().transport_failure = true;
        self
    }

    /// Route every call by zone, like an API with one endpoint per zone.
    /// Must be set before any remote is added.
    pub fn zone_routed(self) -> Self {
        self.inner.lock().unwrap().zone_routed = true;
        self
    }

    /// First listing page is empty but points at the real pages
    pub fn with_leading_empty_page(self) -> Self {
        self.inner.lock().unwrap().leading_empty_page = true;
        self
    }

    pub fn with_get_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().get_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn remote(&self, name: &str) -> Option<RemoteWidget> {
        self.inner.lock().unwrap().remotes.get(name).cloned()
    }

    pub fn remote_count(&self) -> usize {
        self.inner.lock().unwrap().remotes.len()
    }

    pub fn removed(&self) -> HashSet<String> {
        self.inner.lock().unwrap().removed.clone()
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl RemoteClient<WidgetAdapter> for FakeClient {
    async fn get(&self, identity: &Identity) -> Result<RemoteWidget> {
        self.record(format!("get:{}", identity.name));
        let (delay, failure) = {
            let inner = self.inner.lock().unwrap();
            (inner.get_delay, inner.transport_failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failure {
            return Err(CloudError::transport("connection reset by peer"));
        }
        let inner = self.inner.lock().unwrap();
        inner
            .remotes
            .get(&inner.key(&identity.name, &identity.zone))
            .cloned()
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))
    }

    async fn create(&self, request: &DesiredSpec) -> Result<ProviderId> {
        self.record(format!("create:{}", request.name));
        let mut inner = self.inner.lock().unwrap();
        let key = inner.key(&request.name, &request.zone);
        if inner.remotes.contains_key(&key) {
            return Err(CloudError::AlreadyExists(request.name.clone()));
        }
        inner.next_id += 1;
        let id = format!("id-{}", inner.next_id);
        inner.remotes.insert(
            key,
            RemoteWidget {
                id: id.clone(),
                spec: request.clone(),
            },
        );
        Ok(ProviderId::new(id))
    }

    async fn update(&self, identity: &Identity, request: &DesiredSpec) -> Result<()> {
        self.record(format!("update:{}", identity.name));
        let mut inner = self.inner.lock().unwrap();
        let key = inner.key(&identity.name, &identity.zone);
        let remote = inner
            .remotes
            .get_mut(&key)
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))?;
        remote.spec = request.clone();
        Ok(())
    }

    async fn delete(&self, identity: &Identity) -> Result<()> {
        self.record(format!("delete:{}", identity.name));
        let mut inner = self.inner.lock().unwrap();
        let key = inner.key(&identity.name, &identity.zone);
        inner
            .remotes
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))
    }

    async fn list_contained_objects(
        &self,
        identity: &Identity,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        self.record(format!(
            "list:{}:{}",
            identity.name,
            continuation.as_deref().unwrap_or("start")
        ));
        let inner = self.inner.lock().unwrap();
        if !inner.remotes.contains_key(&inner.key(&identity.name, &identity.zone)) {
            return Err(CloudError::NotFound(identity.name.clone()));
        }
        if inner.leading_empty_page && continuation.is_none() {
            return Ok(ObjectPage::new(Vec::new()).with_next("0"));
        }

        let start: usize = continuation
            .as_deref()
            .map(|token| token.parse().unwrap())
            .unwrap_or(0);
        let end = (start + PAGE_SIZE).min(inner.objects.len());

        let mut entries: Vec<Result<ObjectRef>> = inner.objects[start..end]
            .iter()
            .filter(|key| !inner.removed.contains(*key))
            .map(|key| Ok(ObjectRef::new(key)))
            .collect();
        if start == 0 {
            for n in 0..inner.unreadable {
                entries.push(Err(CloudError::MalformedInput(format!("entry {}", n))));
            }
        }

        let page = ObjectPage::new(entries);
        if end < inner.objects.len() {
            Ok(page.with_next(end.to_string()))
        } else {
            Ok(page)
        }
    }

    async fn remove_contained_object(
        &self,
        identity: &Identity,
        object: &ObjectRef,
        bypass_lock: bool,
    ) -> Result<()> {
        self.record(format!("remove:{}:{}", identity.name, object.key));
        let mut inner = self.inner.lock().unwrap();
        if inner.lock == Some(true) && !bypass_lock {
            return Err(CloudError::transport(format!("{} is locked", object.key)));
        }
        if inner.failing.contains(&object.key) {
            return Err(CloudError::transport(format!("cannot remove {}", object.key)));
        }
        inner.removed.insert(object.key.clone());
        Ok(())
    }

    async fn get_lock_state(&self, identity: &Identity) -> Result<bool> {
        self.record(format!("lock:{}", identity.name));
        self.inner
            .lock()
            .unwrap()
            .lock
            .ok_or_else(|| CloudError::NoLockConfigured(identity.name.clone()))
    }
}

/// Schemas for the "widget" service kind: one "core" document with defaults
#[allow(dead_code)]
pub fn widget_schemas() -> StaticSchemaSource {
    let core = SchemaTree::new()
        .with_property("max_connections", SchemaProperty::leaf(Some(json!(100))))
        .with_property("log_level", SchemaProperty::leaf(Some(json!("info"))))
        .with_property("jit", SchemaProperty::leaf(None))
        .with_property(
            "pool",
            SchemaProperty::object(
                SchemaTree::new().with_property("size", SchemaProperty::leaf(Some(json!(10)))),
            ),
        );
    StaticSchemaSource::new().with_kind("widget", SchemaSet::new().with_schema("core", core))
}

/// Route engine logs to the test harness output
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("skyflow_cloud=debug")
        .with_test_writer()
        .try_init();
}
