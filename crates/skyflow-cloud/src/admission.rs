//! Immutable-field validation
//!
//! Some fields can never change once a resource exists. The hosting layer
//! calls [`validate_update`] when a declared resource is edited, and the
//! engine runs the same check against the observed state before every
//! update, so a forbidden change never reaches the remote API.
//!
//! Zone edits need more than that: a client routed by zone looks the
//! resource up in the new zone, finds nothing and would create a second one.
//! The engine therefore also checks the zone recorded in the resource's
//! annotations before it issues any call, see [`validate_recorded_zone`].

use crate::error::{CloudError, Result};
use crate::model::DesiredSpec;
use crate::version::Version;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmutableField {
    Zone,
    /// Remote name (bucket name, key name)
    Name,
    /// Major version may only move forward
    MajorVersion,
    AccessScope,
}

impl ImmutableField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImmutableField::Zone => "zone",
            ImmutableField::Name => "name",
            ImmutableField::MajorVersion => "version",
            ImmutableField::AccessScope => "accessScope",
        }
    }
}

/// Reject a change from `current` to `requested` touching any of `fields`
pub fn validate_update(
    current: &DesiredSpec,
    requested: &DesiredSpec,
    fields: &[ImmutableField],
) -> Result<()> {
    for field in fields {
        match field {
            ImmutableField::Zone => ensure_unchanged(*field, &current.zone, &requested.zone)?,
            ImmutableField::Name => ensure_unchanged(*field, &current.name, &requested.name)?,
            ImmutableField::MajorVersion => ensure_no_downgrade(current, requested)?,
            ImmutableField::AccessScope => {
                let before: BTreeSet<&str> =
                    current.access_scope.iter().map(String::as_str).collect();
                let after: BTreeSet<&str> =
                    requested.access_scope.iter().map(String::as_str).collect();
                if before != after {
                    return Err(changed(*field, format!("{:?}", before), format!("{:?}", after)));
                }
            }
        }
    }
    Ok(())
}

/// Reject a declared zone that differs from the zone recorded by an earlier pass
pub fn validate_recorded_zone(recorded: Option<&str>, requested: &str) -> Result<()> {
    match recorded {
        Some(recorded) => ensure_unchanged(ImmutableField::Zone, recorded, requested),
        None => Ok(()),
    }
}

fn ensure_unchanged(field: ImmutableField, current: &str, requested: &str) -> Result<()> {
    if current != requested {
        return Err(changed(field, current, requested));
    }
    Ok(())
}

fn ensure_no_downgrade(current: &DesiredSpec, requested: &DesiredSpec) -> Result<()> {
    let (Some(before), Some(after)) = (
        current.version.as_deref().filter(|v| !v.is_empty()),
        requested.version.as_deref().filter(|v| !v.is_empty()),
    ) else {
        return Ok(());
    };

    let before_version = Version::parse(before)?;
    let after_version = Version::parse(after)?;
    if after_version.major() < before_version.major() {
        return Err(changed(ImmutableField::MajorVersion, before, after));
    }
    Ok(())
}

fn changed(field: ImmutableField, from: impl Into<String>, to: impl Into<String>) -> CloudError {
    CloudError::ImmutableFieldChanged {
        field: field.as_str().to_string(),
        from: from.into(),
        to: to.into(),
    }
}
