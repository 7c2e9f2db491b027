//! DBaaS provider error types

use skyflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbaasError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Service already exists: {0}")]
    ServiceExists(String),

    #[error("Unsupported for {kind}: {message}")]
    Unsupported { kind: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, DbaasError>;

impl From<DbaasError> for CloudError {
    fn from(err: DbaasError) -> Self {
        match err {
            DbaasError::ServiceNotFound(name) => CloudError::NotFound(name),
            DbaasError::ServiceExists(name) => CloudError::AlreadyExists(name),
            DbaasError::Http(e) => CloudError::transport(e.to_string()),
            e @ DbaasError::Api { .. } => CloudError::transport(e.to_string()),
            e @ DbaasError::Unsupported { .. } => CloudError::MalformedInput(e.to_string()),
            DbaasError::InvalidResponse(message) => CloudError::MalformedInput(message),
            DbaasError::JsonError(e) => CloudError::Json(e),
            DbaasError::CloudError(e) => e,
        }
    }
}
