//! Resource adapter for object-storage buckets

use crate::error::StorageError;
use crate::model::{Bucket, BucketCreateRequest, BucketInfo};
use skyflow_cloud::{
    CloudError, DeletionPolicy, DesiredSpec, ObservedState, ResourceAdapter, ResourceMeta, Result,
};

/// Buckets are created and deleted, never updated; name and zone are fixed
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketAdapter;

/// Check a bucket name against the S3 naming rules
pub fn validate_bucket_name(name: &str) -> std::result::Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be 3 to 63 characters long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid("only lowercase letters, digits, '-' and '.' are allowed"));
    }
    let edges_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edges_ok(name.chars().next()) || !edges_ok(name.chars().last()) {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain consecutive dots"));
    }
    Ok(())
}

impl ResourceAdapter for BucketAdapter {
    type Resource = Bucket;
    type Remote = BucketInfo;
    type CreateRequest = BucketCreateRequest;
    type UpdateRequest = BucketCreateRequest;

    fn kind(&self) -> &'static str {
        "bucket"
    }

    fn meta<'a>(&self, resource: &'a Bucket) -> &'a ResourceMeta {
        &resource.meta
    }

    fn to_desired_spec(&self, resource: &Bucket) -> Result<DesiredSpec> {
        validate_bucket_name(&resource.meta.name)?;
        Ok(DesiredSpec::new(&resource.meta.name, &resource.spec.zone))
    }

    fn to_observed_state(&self, remote: &BucketInfo) -> Result<ObservedState> {
        Ok(ObservedState::new(DesiredSpec::new(&remote.name, &remote.zone)))
    }

    fn build_create_request(&self, desired: &DesiredSpec) -> Result<BucketCreateRequest> {
        Ok(BucketCreateRequest {
            name: desired.name.clone(),
            zone: desired.zone.clone(),
        })
    }

    fn build_update_request(&self, desired: &DesiredSpec) -> Result<BucketCreateRequest> {
        Err(CloudError::InvalidConfig(format!(
            "bucket {} has no mutable fields",
            desired.name
        )))
    }

    fn deletion_policy(&self, resource: &Bucket) -> Option<DeletionPolicy> {
        Some(resource.spec.deletion_policy)
    }
}
