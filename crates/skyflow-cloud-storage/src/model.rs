//! Declared and remote shapes of buckets and access keys

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyflow_cloud::{DeletionPolicy, ResourceMeta};

/// An object-storage bucket as declared by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub meta: ResourceMeta,
    pub spec: BucketSpec,
}

impl Bucket {
    pub fn new(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::new(name),
            spec: BucketSpec {
                zone: zone.into(),
                deletion_policy: DeletionPolicy::default(),
            },
        }
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.spec.deletion_policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub zone: String,

    /// What to do with contained objects when the bucket is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Bucket as reported by the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub zone: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCreateRequest {
    pub name: String,
    pub zone: String,
}

/// A storage access key as declared by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKey {
    pub meta: ResourceMeta,
    pub spec: AccessKeySpec,
}

impl AccessKey {
    pub fn new(name: impl Into<String>, zone: impl Into<String>, buckets: Vec<String>) -> Self {
        Self {
            meta: ResourceMeta::new(name),
            spec: AccessKeySpec {
                zone: zone.into(),
                buckets,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeySpec {
    pub zone: String,

    /// Buckets the key grants access to
    #[serde(default)]
    pub buckets: Vec<String>,
}

/// Resource an access key is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyResource {
    pub domain: String,
    pub resource_type: String,
    pub resource_name: String,
}

impl KeyResource {
    pub fn bucket(name: impl Into<String>) -> Self {
        Self {
            domain: "sos".to_string(),
            resource_type: "bucket".to_string(),
            resource_name: name.into(),
        }
    }

    pub fn is_bucket(&self) -> bool {
        self.domain == "sos" && self.resource_type == "bucket"
    }
}

/// Access key body returned by `GET /access-key/{key}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccessKeyInfo {
    /// Public key identifier
    pub key: String,

    pub name: String,

    /// Only present in the create response
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    #[serde(default)]
    pub resources: Vec<KeyResource>,

    #[serde(default)]
    pub operations: Vec<String>,

    /// Not part of the body; filled in from the zone the request went to
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccessKeyRequest {
    pub name: String,

    #[serde(skip)]
    pub zone: String,

    pub resources: Vec<KeyResource>,
}
