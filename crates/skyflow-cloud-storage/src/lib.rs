//! Object-storage provider for SkyFlow
//!
//! # Features
//!
//! - Buckets with an `EmptyOnly` or `Recursive` deletion policy
//! - Access keys scoped to a set of buckets, via the API
//!
//! Buckets and their contents are reached through the S3 protocol at each
//! zone's object-storage endpoint ([`BucketClient`]). Access keys go through
//! the zone's API endpoint ([`AccessKeyClient`]).

pub mod access_key;
pub mod bucket;
pub mod bucket_client;
pub mod error;
pub mod model;

pub use access_key::{AccessKeyAdapter, AccessKeyClient};
pub use bucket::{BucketAdapter, validate_bucket_name};
pub use bucket_client::BucketClient;
pub use error::{Result, StorageError};
pub use model::{
    AccessKey, AccessKeyInfo, AccessKeyRequest, AccessKeySpec, Bucket, BucketCreateRequest,
    BucketInfo, BucketSpec, KeyResource,
};
