//! S3 client for buckets and their contents
//!
//! Each zone has its own object-storage endpoint, so one SDK client is built
//! per zone on first use and kept for later calls. Listings walk every object
//! version and delete marker, which is what a versioned bucket needs removed
//! before it can be deleted.

use crate::bucket::BucketAdapter;
use crate::error::{Result, StorageError};
use crate::model::{BucketCreateRequest, BucketInfo};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectLockEnabled};
use serde::{Deserialize, Serialize};
use skyflow_cloud::{
    CloudError, EngineConfig, Identity, ObjectPage, ObjectRef, ProviderId, RemoteClient, zones,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Position in a version listing, carried between pages as the continuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VersionCursor {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl VersionCursor {
    fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn decode(token: &str) -> Result<Self> {
        serde_json::from_str(token)
            .map_err(|e| StorageError::InvalidResponse(format!("bad listing cursor: {}", e)))
    }
}

/// Bucket client over the S3 protocol
pub struct BucketClient {
    sdk_config: SdkConfig,
    credentials: Option<Credentials>,
    config: EngineConfig,
    clients: Mutex<HashMap<String, aws_sdk_s3::Client>>,
}

impl BucketClient {
    /// Client with a fixed access key, e.g. one minted by [`crate::AccessKeyClient`]
    pub fn new(
        config: EngineConfig,
        access_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let sdk_config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .build();
        let credentials = Credentials::new(access_key, secret, None, None, "skyflow");
        Self::with_sdk_config(sdk_config, Some(credentials), config)
    }

    /// Client using the standard AWS credential chain (`AWS_ACCESS_KEY_ID`, profiles, ...)
    pub async fn from_env(config: EngineConfig) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::with_sdk_config(sdk_config, None, config)
    }

    fn with_sdk_config(
        sdk_config: SdkConfig,
        credentials: Option<Credentials>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sdk_config,
            credentials,
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn s3(&self, zone: &str) -> Result<aws_sdk_s3::Client> {
        if let Some(client) = self.clients.lock().ok().and_then(|c| c.get(zone).cloned()) {
            return Ok(client);
        }

        let endpoints = zones::resolve(zone, &self.config)?;
        if endpoints.object_storage.is_empty() {
            return Err(StorageError::InvalidConfig(format!(
                "zone {} has no object storage endpoint",
                zone
            )));
        }
        tracing::debug!("Using object storage endpoint {} for {}", endpoints.object_storage, zone);

        let mut builder = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .region(Region::new(zone.to_string()))
            .endpoint_url(&endpoints.object_storage)
            .force_path_style(true)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(self.config.operation_timeout())
                    .build(),
            );
        if let Some(credentials) = &self.credentials {
            builder = builder.credentials_provider(credentials.clone());
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(zone.to_string(), client.clone());
        }
        Ok(client)
    }

    pub async fn get_bucket(&self, identity: &Identity) -> Result<BucketInfo> {
        let location = self
            .s3(&identity.zone)?
            .get_bucket_location()
            .bucket(&identity.name)
            .send()
            .await
            .map_err(|e| classify("GetBucketLocation", &identity.name, e))?;

        // an empty constraint means the bucket lives in the endpoint's own zone
        let zone = location
            .location_constraint()
            .map(|constraint| constraint.as_str())
            .filter(|zone| !zone.is_empty())
            .unwrap_or(identity.zone.as_str());

        Ok(BucketInfo {
            name: identity.name.clone(),
            zone: zone.to_string(),
            created_at: None,
        })
    }

    pub async fn create_bucket(&self, request: &BucketCreateRequest) -> Result<ProviderId> {
        let configuration = CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(request.zone.as_str()))
            .build();

        let created = self
            .s3(&request.zone)?
            .create_bucket()
            .bucket(&request.name)
            .create_bucket_configuration(configuration)
            .send()
            .await;

        match created {
            Ok(_) => {
                tracing::info!("Created bucket {} in {}", request.name, request.zone);
                Ok(ProviderId::new(&request.name))
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                Err(StorageError::BucketExists(request.name.clone()))
            }
            Err(err) => Err(classify("CreateBucket", &request.name, err)),
        }
    }

    pub async fn delete_bucket(&self, identity: &Identity) -> Result<()> {
        self.s3(&identity.zone)?
            .delete_bucket()
            .bucket(&identity.name)
            .send()
            .await
            .map_err(|e| classify("DeleteBucket", &identity.name, e))?;
        Ok(())
    }

    /// One page of object versions and delete markers
    pub async fn list_versions(
        &self,
        identity: &Identity,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        let cursor = continuation.as_deref().map(VersionCursor::decode).transpose()?;

        let output = self
            .s3(&identity.zone)?
            .list_object_versions()
            .bucket(&identity.name)
            .set_key_marker(cursor.as_ref().map(|c| c.key.clone()))
            .set_version_id_marker(cursor.and_then(|c| c.version))
            .send()
            .await
            .map_err(|e| classify("ListObjectVersions", &identity.name, e))?;

        let versions = output
            .versions()
            .iter()
            .map(|v| (v.key(), v.version_id()));
        let markers = output
            .delete_markers()
            .iter()
            .map(|m| (m.key(), m.version_id()));

        let entries = versions
            .chain(markers)
            .map(|(key, version)| match key {
                Some(key) => {
                    let object = ObjectRef::new(key);
                    Ok(match version {
                        Some(version) => object.with_version(version),
                        None => object,
                    })
                }
                None => Err(CloudError::MalformedInput(format!(
                    "listing of {} returned an entry without a key",
                    identity.name
                ))),
            })
            .collect();
        let page = ObjectPage::new(entries);

        if !output.is_truncated().unwrap_or(false) {
            return Ok(page);
        }
        match output.next_key_marker() {
            Some(key) => {
                let cursor = VersionCursor {
                    key: key.to_string(),
                    version: output.next_version_id_marker().map(str::to_string),
                };
                Ok(page.with_next(cursor.encode()?))
            }
            None => Err(StorageError::InvalidResponse(format!(
                "truncated listing of {} has no next key marker",
                identity.name
            ))),
        }
    }

    pub async fn delete_object(
        &self,
        identity: &Identity,
        object: &ObjectRef,
        bypass_lock: bool,
    ) -> Result<()> {
        let deleted = self
            .s3(&identity.zone)?
            .delete_object()
            .bucket(&identity.name)
            .key(&object.key)
            .set_version_id(object.version_id.clone())
            .set_bypass_governance_retention(bypass_lock.then_some(true))
            .send()
            .await;

        match deleted {
            Ok(_) => Ok(()),
            Err(err) if matches!(err.code(), Some("NoSuchKey" | "NoSuchVersion")) => Ok(()),
            Err(err) => Err(classify("DeleteObject", &identity.name, err)),
        }
    }

    /// Whether object lock is enabled on the bucket
    pub async fn object_lock_enabled(&self, identity: &Identity) -> Result<bool> {
        let output = self
            .s3(&identity.zone)?
            .get_object_lock_configuration()
            .bucket(&identity.name)
            .send()
            .await
            .map_err(|e| classify("GetObjectLockConfiguration", &identity.name, e))?;

        Ok(output
            .object_lock_configuration()
            .and_then(|lock| lock.object_lock_enabled())
            .is_some_and(|enabled| *enabled == ObjectLockEnabled::Enabled))
    }
}

/// Map an SDK failure onto the storage error it stands for
fn classify<E>(operation: &'static str, bucket: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    match err.code() {
        Some("NoSuchBucket") => StorageError::BucketNotFound(bucket.to_string()),
        Some("ObjectLockConfigurationNotFoundError") => {
            StorageError::NoObjectLock(bucket.to_string())
        }
        None if status == Some(404) => StorageError::BucketNotFound(bucket.to_string()),
        code => StorageError::S3 {
            operation,
            code: code.unwrap_or("Unknown").to_string(),
            message: err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string()),
        },
    }
}

#[async_trait]
impl RemoteClient<BucketAdapter> for BucketClient {
    async fn get(&self, identity: &Identity) -> skyflow_cloud::Result<BucketInfo> {
        Ok(self.get_bucket(identity).await?)
    }

    async fn create(&self, request: &BucketCreateRequest) -> skyflow_cloud::Result<ProviderId> {
        Ok(self.create_bucket(request).await?)
    }

    async fn update(
        &self,
        identity: &Identity,
        _request: &BucketCreateRequest,
    ) -> skyflow_cloud::Result<()> {
        Err(CloudError::InvalidConfig(format!("{} cannot be updated", identity)))
    }

    async fn delete(&self, identity: &Identity) -> skyflow_cloud::Result<()> {
        Ok(self.delete_bucket(identity).await?)
    }

    async fn list_contained_objects(
        &self,
        identity: &Identity,
        continuation: Option<String>,
    ) -> skyflow_cloud::Result<ObjectPage> {
        Ok(self.list_versions(identity, continuation).await?)
    }

    async fn remove_contained_object(
        &self,
        identity: &Identity,
        object: &ObjectRef,
        bypass_lock: bool,
    ) -> skyflow_cloud::Result<()> {
        Ok(self.delete_object(identity, object, bypass_lock).await?)
    }

    async fn get_lock_state(&self, identity: &Identity) -> skyflow_cloud::Result<bool> {
        Ok(self.object_lock_enabled(identity).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_keeps_awkward_keys() {
        let cursor = VersionCursor {
            key: "logs/2024\n01.txt".into(),
            version: Some("3HL4kqtJlcpXroDTDmJ+rmSpXd3dIbrHY".into()),
        };
        let token = cursor.encode().unwrap();
        assert_eq!(VersionCursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!(
            VersionCursor::decode("not-a-cursor"),
            Err(StorageError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_zone_without_storage_endpoint() {
        let mut config = EngineConfig::default();
        config
            .zone_endpoints
            .insert("lab-1".into(), "http://lab.internal/v2".into());
        let client = BucketClient::new(config, "EXO1", "secret");

        assert!(matches!(client.s3("lab-1"), Err(StorageError::InvalidConfig(_))));
        assert!(client.s3("ch-gva-2").is_ok());
    }
}
