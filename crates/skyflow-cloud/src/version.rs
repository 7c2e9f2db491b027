//! Dotted service versions (`14`, `14.5`, `v1.2.3`, `8.0.30-beta`)

use crate::error::{CloudError, Result};
use std::fmt;

/// Numeric components of a dotted version; the `v` prefix and any
/// pre-release suffix are dropped
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let unprefixed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let core = unprefixed.split('-').next().unwrap_or_default();

        if core.is_empty() {
            return Err(CloudError::MalformedVersion(input.to_string()));
        }

        let components = core
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(CloudError::MalformedVersion(input.to_string()));
                }
                part.parse::<u64>()
                    .map_err(|_| CloudError::MalformedVersion(input.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    pub fn major(&self) -> u64 {
        self.components.first().copied().unwrap_or_default()
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// `self` names a prefix of `other` (`14` of `14.5`, `14.5` of `14.5.2`)
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        other.components.starts_with(&self.components)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Whether an observed version satisfies the desired one: same major, or the
/// desired version is a dotted prefix of the observed one
pub fn is_compatible_version(desired: &str, observed: &str) -> Result<bool> {
    let desired = Version::parse(desired)?;
    let observed = Version::parse(observed)?;
    Ok(desired.major() == observed.major() || desired.is_prefix_of(&observed))
}
