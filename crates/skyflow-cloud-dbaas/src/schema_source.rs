//! Settings schemas served by the DBaaS API

use crate::error::DbaasError;
use async_trait::async_trait;
use serde_json::Value;
use skyflow_cloud::{CloudError, SchemaSet, SchemaSource};
use skyflow_config::SchemaSourceConfig;

/// Fetches `GET {endpoint}/dbaas-settings-{kind}` on every call
pub struct HttpSchemaSource {
    client: reqwest::Client,
    config: SchemaSourceConfig,
}

impl HttpSchemaSource {
    pub fn new(config: SchemaSourceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create from `SKYFLOW_API_ENDPOINT` / `SKYFLOW_API_TOKEN`
    pub fn from_env() -> skyflow_cloud::Result<Self> {
        Ok(Self::new(SchemaSourceConfig::from_env()?))
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn fetch(&self, service_kind: &str) -> crate::Result<Value> {
        let url = format!(
            "{}/dbaas-settings-{}",
            self.config.endpoint.trim_end_matches('/'),
            service_kind
        );
        tracing::debug!("Fetching settings schemas: {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CloudError::UnknownSchema(service_kind.to_string()).into());
        }
        if !status.is_success() {
            return Err(DbaasError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| DbaasError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    async fn fetch_schema(&self, service_kind: &str) -> skyflow_cloud::Result<SchemaSet> {
        let document = self.fetch(service_kind).await?;
        // schemas are nested under "settings" in API responses
        let schemas = document.get("settings").unwrap_or(&document);
        SchemaSet::from_json(schemas)
    }
}
