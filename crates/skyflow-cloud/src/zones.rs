//! Zone name → endpoint lookup

use crate::error::{CloudError, Result};
use skyflow_config::EngineConfig;

/// Endpoints serving one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEndpoints {
    pub api: String,
    pub object_storage: String,
}

const ZONES: &[(&str, &str, &str)] = &[
    ("at-vie-1", "https://api-at-vie-1.exoscale.com/v2", "https://sos-at-vie-1.exo.io"),
    ("at-vie-2", "https://api-at-vie-2.exoscale.com/v2", "https://sos-at-vie-2.exo.io"),
    ("bg-sof-1", "https://api-bg-sof-1.exoscale.com/v2", "https://sos-bg-sof-1.exo.io"),
    ("ch-dk-2", "https://api-ch-dk-2.exoscale.com/v2", "https://sos-ch-dk-2.exo.io"),
    ("ch-gva-2", "https://api-ch-gva-2.exoscale.com/v2", "https://sos-ch-gva-2.exo.io"),
    ("de-fra-1", "https://api-de-fra-1.exoscale.com/v2", "https://sos-de-fra-1.exo.io"),
    ("de-muc-1", "https://api-de-muc-1.exoscale.com/v2", "https://sos-de-muc-1.exo.io"),
];

fn known_zones() -> impl Iterator<Item = &'static str> {
    ZONES.iter().map(|(zone, _, _)| *zone)
}

/// Endpoints for a built-in zone
pub fn lookup(zone: &str) -> Result<ZoneEndpoints> {
    ZONES
        .iter()
        .find(|(name, _, _)| *name == zone)
        .map(|(_, api, object_storage)| ZoneEndpoints {
            api: api.to_string(),
            object_storage: object_storage.to_string(),
        })
        .ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "Unknown zone: {} (known: {})",
                zone,
                known_zones().collect::<Vec<_>>().join(", ")
            ))
        })
}

/// Endpoints for a zone, honoring API and object-storage overrides from the
/// engine config. A zone missing from the built-in table resolves as long as
/// at least one override names it; the other endpoint is then left empty.
pub fn resolve(zone: &str, config: &EngineConfig) -> Result<ZoneEndpoints> {
    let api = config.zone_endpoints.get(zone);
    let object_storage = config.storage_endpoints.get(zone);

    let mut endpoints = match lookup(zone) {
        Ok(endpoints) => endpoints,
        Err(_) if api.is_some() || object_storage.is_some() => ZoneEndpoints {
            api: String::new(),
            object_storage: String::new(),
        },
        Err(e) => return Err(e),
    };
    if let Some(api) = api {
        endpoints.api = api.clone();
    }
    if let Some(object_storage) = object_storage {
        endpoints.object_storage = object_storage.clone();
    }
    Ok(endpoints)
}
