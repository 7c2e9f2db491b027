use async_trait::async_trait;
use skyflow_cloud::{
    CloudError, Identity, ObjectPage, ObjectRef, ProviderId, RemoteClient, Result,
};
use skyflow_cloud_storage::{BucketAdapter, BucketCreateRequest, BucketInfo};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
struct StoredBucket {
    zone: String,
    /// key -> version ids
    objects: BTreeMap<String, Vec<String>>,
    locked: Option<bool>,
}

/// In-memory object store with versioned objects and optional retention lock
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: Mutex<BTreeMap<String, StoredBucket>>,
    page_size: usize,
    removals: Mutex<Vec<String>>,
    fail_keys: BTreeSet<String>,
}

#[allow(dead_code)]
impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            page_size: 3,
            ..Default::default()
        }
    }

    pub fn with_bucket(self, name: &str, zone: &str) -> Self {
        self.buckets.lock().unwrap().insert(
            name.to_string(),
            StoredBucket {
                zone: zone.to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, versions: &[&str]) -> Self {
        self.buckets
            .lock()
            .unwrap()
            .get_mut(bucket)
            .unwrap()
            .objects
            .insert(
                key.to_string(),
                versions.iter().map(|v| v.to_string()).collect(),
            );
        self
    }

    pub fn with_lock(self, bucket: &str, locked: bool) -> Self {
        self.buckets.lock().unwrap().get_mut(bucket).unwrap().locked = Some(locked);
        self
    }

    pub fn with_failing_key(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.buckets.lock().unwrap().contains_key(name)
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|b| b.objects.len())
            .unwrap_or(0)
    }

    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteClient<BucketAdapter> for MemoryObjectStore {
    async fn get(&self, identity: &Identity) -> Result<BucketInfo> {
        self.buckets
            .lock()
            .unwrap()
            .get(&identity.name)
            .map(|bucket| BucketInfo {
                name: identity.name.clone(),
                zone: bucket.zone.clone(),
                created_at: None,
            })
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))
    }

    async fn create(&self, request: &BucketCreateRequest) -> Result<ProviderId> {
        let mut buckets = self.buckets.lock().unwrap();
        if buckets.contains_key(&request.name) {
            return Err(CloudError::AlreadyExists(request.name.clone()));
        }
        buckets.insert(
            request.name.clone(),
            StoredBucket {
                zone: request.zone.clone(),
                ..Default::default()
            },
        );
        Ok(ProviderId::new(&request.name))
    }

    async fn update(&self, identity: &Identity, _request: &BucketCreateRequest) -> Result<()> {
        Err(CloudError::InvalidConfig(format!("{} cannot be updated", identity)))
    }

    async fn delete(&self, identity: &Identity) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get(&identity.name) {
            None => Err(CloudError::NotFound(identity.name.clone())),
            Some(bucket) if !bucket.objects.is_empty() => {
                Err(CloudError::transport("BucketNotEmpty"))
            }
            Some(_) => {
                buckets.remove(&identity.name);
                Ok(())
            }
        }
    }

    async fn list_contained_objects(
        &self,
        identity: &Identity,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        let buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .get(&identity.name)
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))?;

        // one entry per object version, resuming after the continuation key
        let mut entries = Vec::new();
        let mut last_key = None;
        for (key, versions) in bucket
            .objects
            .iter()
            .filter(|(key, _)| continuation.as_ref().is_none_or(|after| *key > after))
            .take(self.page_size)
        {
            if versions.is_empty() {
                entries.push(Ok(ObjectRef::new(key)));
            }
            for version in versions {
                entries.push(Ok(ObjectRef::new(key).with_version(version)));
            }
            last_key = Some(key.clone());
        }

        let page = ObjectPage::new(entries);
        match last_key {
            Some(key) if bucket.objects.keys().any(|k| *k > key) => Ok(page.with_next(key)),
            _ => Ok(page),
        }
    }

    async fn remove_contained_object(
        &self,
        identity: &Identity,
        object: &ObjectRef,
        bypass_lock: bool,
    ) -> Result<()> {
        let label = match &object.version_id {
            Some(version) => format!("{}@{}", object.key, version),
            None => object.key.clone(),
        };
        self.removals.lock().unwrap().push(label.clone());

        if self.fail_keys.contains(&object.key) {
            return Err(CloudError::transport(format!("AccessDenied: {}", label)));
        }

        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .get_mut(&identity.name)
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))?;
        if bucket.locked == Some(true) && !bypass_lock {
            return Err(CloudError::transport(format!("ObjectLocked: {}", label)));
        }

        if let Some(versions) = bucket.objects.get_mut(&object.key) {
            versions.retain(|v| Some(v) != object.version_id.as_ref());
            if versions.is_empty() {
                bucket.objects.remove(&object.key);
            }
        }
        Ok(())
    }

    async fn get_lock_state(&self, identity: &Identity) -> Result<bool> {
        let buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .get(&identity.name)
            .ok_or_else(|| CloudError::NotFound(identity.name.clone()))?;
        bucket
            .locked
            .ok_or_else(|| CloudError::NoLockConfigured(identity.name.clone()))
    }
}

/// Route engine logs to the test harness output
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("skyflow_cloud=debug")
        .with_test_writer()
        .try_init();
}
