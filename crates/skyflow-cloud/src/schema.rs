//! Settings schemas
//!
//! The remote API describes each settings document with a JSON schema. Only
//! the parts that matter for defaulting are kept: per property, an optional
//! `default` and, for sub-objects, the nested `properties`.

use crate::error::{CloudError, Result};
use crate::provider::SchemaSource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One property of a settings schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaProperty {
    pub default: Option<Value>,
    pub children: Option<SchemaTree>,
}

impl SchemaProperty {
    pub fn leaf(default: Option<Value>) -> Self {
        Self {
            default,
            children: None,
        }
    }

    pub fn object(children: SchemaTree) -> Self {
        Self {
            default: None,
            children: Some(children),
        }
    }
}

/// Property name → property definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTree {
    pub properties: BTreeMap<String, SchemaProperty>,
}

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, property: SchemaProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Build from a JSON schema object (`{"properties": {...}}`)
    pub fn from_json_schema(schema: &Value) -> Result<Self> {
        let raw: RawSchema = serde_json::from_value(schema.clone())
            .map_err(|e| CloudError::MalformedInput(format!("invalid settings schema: {}", e)))?;
        Ok(raw.into_tree())
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(default)]
    properties: BTreeMap<String, RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    properties: Option<BTreeMap<String, RawProperty>>,
}

impl RawSchema {
    fn into_tree(self) -> SchemaTree {
        convert_properties(self.properties)
    }
}

fn convert_properties(properties: BTreeMap<String, RawProperty>) -> SchemaTree {
    SchemaTree {
        properties: properties
            .into_iter()
            .map(|(name, raw)| {
                let property = SchemaProperty {
                    default: raw.default,
                    children: raw.properties.map(convert_properties),
                };
                (name, property)
            })
            .collect(),
    }
}

/// Schemas available for one service kind, keyed by schema name ("pg", "pgbouncer", ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    schemas: BTreeMap<String, SchemaTree>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tree: SchemaTree) {
        self.schemas.insert(name.into(), tree);
    }

    pub fn with_schema(mut self, name: impl Into<String>, tree: SchemaTree) -> Self {
        self.insert(name, tree);
        self
    }

    pub fn get(&self, name: &str) -> Result<&SchemaTree> {
        self.schemas
            .get(name)
            .ok_or_else(|| CloudError::UnknownSchema(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Build from `{"<schema name>": <json schema>, ...}`
    pub fn from_json(document: &Value) -> Result<Self> {
        let entries = document.as_object().ok_or_else(|| {
            CloudError::MalformedInput("settings schema set must be an object".to_string())
        })?;

        let mut set = Self::new();
        for (name, schema) in entries {
            set.insert(name.clone(), SchemaTree::from_json_schema(schema)?);
        }
        Ok(set)
    }
}

/// Schema source serving fixed schema sets, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    kinds: HashMap<String, SchemaSet>,
}

impl StaticSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, service_kind: impl Into<String>, schemas: SchemaSet) -> Self {
        self.kinds.insert(service_kind.into(), schemas);
        self
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn fetch_schema(&self, service_kind: &str) -> Result<SchemaSet> {
        self.kinds
            .get(service_kind)
            .cloned()
            .ok_or_else(|| CloudError::UnknownSchema(service_kind.to_string()))
    }
}
