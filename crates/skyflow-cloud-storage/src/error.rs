//! Object-storage provider error types

use skyflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    #[error("Access key already exists: {0}")]
    AccessKeyExists(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket already exists: {0}")]
    BucketExists(String),

    #[error("No object lock configured on bucket {0}")]
    NoObjectLock(String),

    #[error("S3 {operation} failed ({code}): {message}")]
    S3 {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("Invalid bucket name '{name}': {reason}")]
    InvalidBucketName { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for CloudError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AccessKeyNotFound(name) => CloudError::NotFound(name),
            StorageError::AccessKeyExists(name) => CloudError::AlreadyExists(name),
            StorageError::BucketNotFound(name) => CloudError::NotFound(name),
            StorageError::BucketExists(name) => CloudError::AlreadyExists(name),
            StorageError::NoObjectLock(name) => CloudError::NoLockConfigured(name),
            e @ StorageError::S3 { .. } => CloudError::transport(e.to_string()),
            StorageError::Http(e) => CloudError::transport(e.to_string()),
            e @ StorageError::Api { .. } => CloudError::transport(e.to_string()),
            e @ StorageError::InvalidBucketName { .. } => CloudError::MalformedInput(e.to_string()),
            StorageError::InvalidConfig(message) => CloudError::InvalidConfig(message),
            StorageError::InvalidResponse(message) => CloudError::MalformedInput(message),
            StorageError::JsonError(e) => CloudError::Json(e),
            StorageError::CloudError(e) => e,
        }
    }
}
