//! Drift detection
//!
//! Each field kind has its own notion of equality. The predicates below are
//! kept small and independent; [`is_up_to_date`] runs all of them over a
//! desired spec and the matching part of an observed state and folds the
//! results into one [`Verdict`].

use crate::model::{DesiredSpec, MaintenanceWindow};
use crate::state::Verdict;
use crate::timeofday::TimeOfDay;
use crate::version::is_compatible_version;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftOptions {
    /// Leave zone out of the verdict
    pub ignore_zone: bool,
}

/// Equal as sets: order and duplicates are irrelevant, empty equals absent
pub fn is_same_string_set<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let left: BTreeSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let right: BTreeSet<&str> = b.iter().map(AsRef::as_ref).collect();
    left == right
}

pub fn is_same_string(a: &str, b: &str) -> bool {
    a == b
}

pub fn is_same_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Day and canonical time must match. An undeclared window accepts whatever
/// the provider picked.
pub fn is_same_maintenance(
    desired: Option<&MaintenanceWindow>,
    observed: Option<&MaintenanceWindow>,
) -> bool {
    match desired {
        None => true,
        Some(want) => observed.is_some_and(|have| {
            want.day_of_week == have.day_of_week
                && want.time_of_day.to_string() == have.time_of_day.to_string()
        }),
    }
}

/// Canonical backup time must match; an undeclared time accepts any
pub fn is_same_backup(desired: Option<&TimeOfDay>, observed: Option<&TimeOfDay>) -> bool {
    match desired {
        None => true,
        Some(want) => observed.is_some_and(|have| want.to_string() == have.to_string()),
    }
}

/// Compare two settings documents as maps
///
/// Keys must match one to one. Values are compared one level deep: scalars
/// and arrays with `==`, nested objects only by their key sets. A change deep
/// inside a nested object is therefore not detected.
pub fn is_same_settings(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| shallow_value_eq(value, other))
                })
        }
        _ => a == b,
    }
}

fn shallow_value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len() && left.keys().all(|k| right.contains_key(k))
        }
        _ => a == b,
    }
}

/// Collects named check results into a verdict
#[derive(Debug, Default)]
pub struct DriftReport {
    failures: Vec<String>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check; on failure the desired and observed values land in the diff
    pub fn check<D: Debug, O: Debug>(&mut self, name: &str, ok: bool, desired: D, observed: O) {
        if !ok {
            self.failures.push(format!(
                "{}: desired {:?}, observed {:?}",
                name, desired, observed
            ));
        }
    }

    /// Record a check that could not be evaluated
    pub fn degraded(&mut self, name: &str, reason: impl std::fmt::Display) {
        tracing::warn!("Drift check '{}' could not be evaluated: {}", name, reason);
        self.failures.push(format!("{}: {}", name, reason));
    }

    pub fn into_verdict(self) -> Verdict {
        Verdict {
            exists: true,
            up_to_date: self.failures.is_empty(),
            diff: if self.failures.is_empty() {
                "up to date".to_string()
            } else {
                self.failures.join("\n")
            },
        }
    }
}

/// Run every check over `desired` and the spec part of an observed state
pub fn is_up_to_date(desired: &DesiredSpec, observed: &DesiredSpec, options: DriftOptions) -> Verdict {
    let mut report = DriftReport::new();

    if !options.ignore_zone {
        report.check(
            "zone",
            is_same_string(&desired.zone, &observed.zone),
            &desired.zone,
            &observed.zone,
        );
    }

    report.check(
        "name",
        is_same_string(&desired.name, &observed.name),
        &desired.name,
        &observed.name,
    );

    report.check(
        "ipFilter",
        is_same_string_set(&desired.ip_filter, &observed.ip_filter),
        &desired.ip_filter,
        &observed.ip_filter,
    );

    report.check(
        "plan",
        is_same_ignore_case(&desired.plan, &observed.plan),
        &desired.plan,
        &observed.plan,
    );

    report.check(
        "maintenance",
        is_same_maintenance(desired.maintenance.as_ref(), observed.maintenance.as_ref()),
        desired.maintenance.map(|m| m.to_string()),
        observed.maintenance.map(|m| m.to_string()),
    );

    report.check(
        "backup",
        is_same_backup(desired.backup.as_ref(), observed.backup.as_ref()),
        desired.backup.map(|t| t.to_string()),
        observed.backup.map(|t| t.to_string()),
    );

    if let Some(want) = desired.version.as_deref().filter(|v| !v.is_empty()) {
        match observed.version.as_deref() {
            None => report.check("version", false, want, Option::<&str>::None),
            Some(have) => match is_compatible_version(want, have) {
                Ok(ok) => report.check("version", ok, want, have),
                Err(e) => report.degraded("version", e),
            },
        }
    }

    report.check(
        "terminationProtection",
        desired.termination_protection == observed.termination_protection,
        desired.termination_protection,
        observed.termination_protection,
    );

    report.check(
        "accessScope",
        is_same_string_set(&desired.access_scope, &observed.access_scope),
        &desired.access_scope,
        &observed.access_scope,
    );

    let empty = Value::Object(Default::default());
    for (name, want) in &desired.settings {
        let have = observed.settings.get(name).unwrap_or(&empty);
        report.check(
            &format!("settings.{}", name),
            is_same_settings(want, have),
            want,
            have,
        );
    }

    report.into_verdict()
}
