//! DBaaS API client
//!
//! Direct API implementation with Bearer token authentication. The zone of
//! each request picks the API endpoint.

use crate::adapter::DbaasAdapter;
use crate::error::{DbaasError, Result};
use crate::model::{ServiceBody, ServiceRequest};
use async_trait::async_trait;
use serde::Deserialize;
use skyflow_cloud::zones;
use skyflow_cloud::{EngineConfig, Identity, ProviderId, RemoteClient};

/// Authenticated DBaaS API client
pub struct DbaasClient {
    client: reqwest::Client,
    api_token: Option<String>,
    config: EngineConfig,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationBody {
    #[serde(default)]
    reference: Option<OperationReference>,
}

#[derive(Debug, Deserialize)]
struct OperationReference {
    id: String,
}

impl DbaasClient {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.operation_timeout())
            .build()?;
        Ok(Self {
            client,
            api_token: None,
            config,
        })
    }

    pub fn with_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    fn service_url(&self, zone: &str, kind: &str, name: &str) -> Result<String> {
        let endpoints = zones::resolve(zone, &self.config)?;
        Ok(format!("{}/dbaas-{}/{}", endpoints.api.trim_end_matches('/'), kind, name))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-success statuses onto provider errors
    async fn check(response: reqwest::Response, name: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            404 => Err(DbaasError::ServiceNotFound(name.to_string())),
            409 => Err(DbaasError::ServiceExists(name.to_string())),
            code => {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&text)
                    .ok()
                    .and_then(|body| body.message)
                    .unwrap_or(text);
                Err(DbaasError::Api {
                    status: code,
                    message,
                })
            }
        }
    }

    pub async fn get_service(&self, identity: &Identity) -> Result<ServiceBody> {
        let url = self.service_url(&identity.zone, &identity.kind, &identity.name)?;
        tracing::debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check(response, &identity.name).await?;

        let mut body: ServiceBody = response
            .json()
            .await
            .map_err(|e| DbaasError::InvalidResponse(e.to_string()))?;
        body.zone = Some(identity.zone.clone());
        Ok(body)
    }

    pub async fn create_service(&self, request: &ServiceRequest) -> Result<ProviderId> {
        let url = self.service_url(&request.zone, request.kind.as_str(), &request.name)?;
        tracing::debug!("POST {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response, &request.name).await?;

        // services are addressed by name; the operation may also carry an id
        let id = response
            .json::<OperationBody>()
            .await
            .ok()
            .and_then(|op| op.reference)
            .map(|reference| reference.id)
            .unwrap_or_else(|| request.name.clone());
        Ok(ProviderId::new(id))
    }

    pub async fn update_service(&self, identity: &Identity, request: &ServiceRequest) -> Result<()> {
        let url = self.service_url(&identity.zone, &identity.kind, &identity.name)?;
        tracing::debug!("PUT {}", url);

        let response = self
            .authorize(self.client.put(&url))
            .json(request)
            .send()
            .await?;
        Self::check(response, &identity.name).await?;
        Ok(())
    }

    pub async fn delete_service(&self, identity: &Identity) -> Result<()> {
        let url = self.service_url(&identity.zone, "service", &identity.name)?;
        tracing::debug!("DELETE {}", url);

        let response = self.authorize(self.client.delete(&url)).send().await?;
        Self::check(response, &identity.name).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteClient<DbaasAdapter> for DbaasClient {
    async fn get(&self, identity: &Identity) -> skyflow_cloud::Result<ServiceBody> {
        Ok(self.get_service(identity).await?)
    }

    async fn create(&self, request: &ServiceRequest) -> skyflow_cloud::Result<ProviderId> {
        Ok(self.create_service(request).await?)
    }

    async fn update(&self, identity: &Identity, request: &ServiceRequest) -> skyflow_cloud::Result<()> {
        Ok(self.update_service(identity, request).await?)
    }

    async fn delete(&self, identity: &Identity) -> skyflow_cloud::Result<()> {
        Ok(self.delete_service(identity).await?)
    }
}
