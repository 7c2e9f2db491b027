//! Storage access keys
//!
//! A key is scoped to a set of buckets. Name, zone and bucket scope are all
//! fixed at creation, so any drift is reported and rejected rather than
//! updated in place.

use crate::error::{Result, StorageError};
use crate::model::{AccessKey, AccessKeyInfo, AccessKeyRequest, KeyResource};
use async_trait::async_trait;
use serde::Deserialize;
use skyflow_cloud::{
    CloudError, DesiredSpec, EngineConfig, Identity, ImmutableField, ObservedState, ProviderId,
    RemoteClient, ResourceAdapter, ResourceMeta, zones,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessKeyAdapter;

impl ResourceAdapter for AccessKeyAdapter {
    type Resource = AccessKey;
    type Remote = AccessKeyInfo;
    type CreateRequest = AccessKeyRequest;
    type UpdateRequest = AccessKeyRequest;

    fn kind(&self) -> &'static str {
        "access-key"
    }

    fn meta<'a>(&self, resource: &'a AccessKey) -> &'a ResourceMeta {
        &resource.meta
    }

    fn to_desired_spec(&self, resource: &AccessKey) -> skyflow_cloud::Result<DesiredSpec> {
        if resource.spec.buckets.is_empty() {
            return Err(CloudError::MalformedInput(format!(
                "access key '{}' must be scoped to at least one bucket",
                resource.meta.name
            )));
        }
        for bucket in &resource.spec.buckets {
            crate::bucket::validate_bucket_name(bucket)?;
        }

        let mut spec = DesiredSpec::new(&resource.meta.name, &resource.spec.zone);
        spec.access_scope = resource.spec.buckets.clone();
        Ok(spec)
    }

    fn to_observed_state(&self, remote: &AccessKeyInfo) -> skyflow_cloud::Result<ObservedState> {
        let mut spec = DesiredSpec::new(&remote.name, remote.zone.clone().unwrap_or_default());
        spec.access_scope = remote
            .resources
            .iter()
            .filter(|resource| resource.is_bucket())
            .map(|resource| resource.resource_name.clone())
            .collect();
        Ok(ObservedState::new(spec).with_id(&remote.key))
    }

    fn build_create_request(&self, desired: &DesiredSpec) -> skyflow_cloud::Result<AccessKeyRequest> {
        Ok(AccessKeyRequest {
            name: desired.name.clone(),
            zone: desired.zone.clone(),
            resources: desired.access_scope.iter().map(KeyResource::bucket).collect(),
        })
    }

    fn build_update_request(&self, desired: &DesiredSpec) -> skyflow_cloud::Result<AccessKeyRequest> {
        Err(CloudError::InvalidConfig(format!(
            "access key {} cannot be modified, recreate it instead",
            desired.name
        )))
    }

    fn immutable_fields(&self) -> &'static [ImmutableField] {
        &[
            ImmutableField::Zone,
            ImmutableField::Name,
            ImmutableField::AccessScope,
        ]
    }
}

#[derive(Debug, Deserialize)]
struct AccessKeyList {
    #[serde(default, rename = "access-keys")]
    access_keys: Vec<AccessKeyInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Access key API client
///
/// Secrets only appear in create responses. They are held until the hosting
/// layer collects them with [`AccessKeyClient::take_secret`].
pub struct AccessKeyClient {
    client: reqwest::Client,
    api_token: Option<String>,
    config: EngineConfig,
    secrets: Mutex<HashMap<String, String>>,
}

impl AccessKeyClient {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.operation_timeout())
            .build()?;
        Ok(Self {
            client,
            api_token: None,
            config,
            secrets: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Secret of a freshly created key, handed out once
    pub fn take_secret(&self, key_name: &str) -> Option<String> {
        self.secrets
            .lock()
            .ok()
            .and_then(|mut secrets| secrets.remove(key_name))
    }

    fn url(&self, zone: &str, path: &str) -> Result<String> {
        let endpoints = zones::resolve(zone, &self.config)?;
        Ok(format!("{}/{}", endpoints.api.trim_end_matches('/'), path))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, name: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            404 => Err(StorageError::AccessKeyNotFound(name.to_string())),
            409 => Err(StorageError::AccessKeyExists(name.to_string())),
            code => {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&text)
                    .ok()
                    .and_then(|body| body.message)
                    .unwrap_or(text);
                Err(StorageError::Api {
                    status: code,
                    message,
                })
            }
        }
    }

    /// Look a key up by its public identifier, or by name when none is known yet
    pub async fn get_key(&self, identity: &Identity) -> Result<AccessKeyInfo> {
        let mut info = match &identity.external_id {
            Some(key) => {
                let url = self.url(&identity.zone, &format!("access-key/{}", key))?;
                tracing::debug!("GET {}", url);
                let response = self.authorize(self.client.get(&url)).send().await?;
                let response = Self::check(response, &identity.name).await?;
                response
                    .json::<AccessKeyInfo>()
                    .await
                    .map_err(|e| StorageError::InvalidResponse(e.to_string()))?
            }
            None => {
                let url = self.url(&identity.zone, "access-key")?;
                tracing::debug!("GET {}", url);
                let response = self.authorize(self.client.get(&url)).send().await?;
                let response = Self::check(response, &identity.name).await?;
                let list = response
                    .json::<AccessKeyList>()
                    .await
                    .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
                list.access_keys
                    .into_iter()
                    .find(|key| key.name == identity.name)
                    .ok_or_else(|| StorageError::AccessKeyNotFound(identity.name.clone()))?
            }
        };
        info.zone = Some(identity.zone.clone());
        Ok(info)
    }

    pub async fn create_key(&self, request: &AccessKeyRequest) -> Result<ProviderId> {
        let url = self.url(&request.zone, "access-key")?;
        tracing::debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response, &request.name).await?;
        let created = response
            .json::<AccessKeyInfo>()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if let Some(secret) = created.secret {
            if let Ok(mut secrets) = self.secrets.lock() {
                secrets.insert(request.name.clone(), secret);
            }
        }
        Ok(ProviderId::new(created.key))
    }

    pub async fn delete_key(&self, identity: &Identity) -> Result<()> {
        let key = match &identity.external_id {
            Some(key) => key.clone(),
            None => self.get_key(identity).await?.key,
        };
        let url = self.url(&identity.zone, &format!("access-key/{}", key))?;
        tracing::debug!("DELETE {}", url);

        let response = self.authorize(self.client.delete(&url)).send().await?;
        Self::check(response, &identity.name).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteClient<AccessKeyAdapter> for AccessKeyClient {
    async fn get(&self, identity: &Identity) -> skyflow_cloud::Result<AccessKeyInfo> {
        Ok(self.get_key(identity).await?)
    }

    async fn create(&self, request: &AccessKeyRequest) -> skyflow_cloud::Result<ProviderId> {
        Ok(self.create_key(request).await?)
    }

    async fn update(
        &self,
        identity: &Identity,
        _request: &AccessKeyRequest,
    ) -> skyflow_cloud::Result<()> {
        Err(CloudError::InvalidConfig(format!(
            "access key {} cannot be modified",
            identity
        )))
    }

    async fn delete(&self, identity: &Identity) -> skyflow_cloud::Result<()> {
        Ok(self.delete_key(identity).await?)
    }
}
