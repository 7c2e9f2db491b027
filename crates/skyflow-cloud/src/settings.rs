//! Schema-driven defaulting of sparse settings documents
//!
//! Users declare only the settings they care about, while the remote API
//! reports every setting. Filling schema defaults into both sides before
//! comparing keeps an omitted-but-defaulted key from looking like drift.
//!
//! Defaulting is additive only: keys present in the input are never altered,
//! whatever their type.

use crate::error::{CloudError, Result};
use crate::schema::{SchemaSet, SchemaTree};
use serde_json::{Map, Value};

/// Return a copy of `document` with every absent, defaulted property of
/// schema `schema_name` filled in
pub fn set_defaults(schemas: &SchemaSet, schema_name: &str, document: &Value) -> Result<Value> {
    let tree = schemas.get(schema_name)?;

    let Value::Object(input) = document else {
        return Err(CloudError::MalformedInput(format!(
            "settings for '{}' must be an object, got {}",
            schema_name,
            type_name(document)
        )));
    };

    let mut output = input.clone();
    apply_defaults(tree, &mut output);
    Ok(Value::Object(output))
}

/// Fill defaults into `target`; returns whether anything was added
fn apply_defaults(tree: &SchemaTree, target: &mut Map<String, Value>) -> bool {
    let mut added = false;

    for (name, property) in &tree.properties {
        if let Some(children) = &property.children {
            match target.get_mut(name) {
                Some(Value::Object(existing)) => {
                    added |= apply_defaults(children, existing);
                }
                // present but not an object: left untouched
                Some(_) => {}
                None => {
                    let mut subtree = Map::new();
                    if apply_defaults(children, &mut subtree) {
                        target.insert(name.clone(), Value::Object(subtree));
                        added = true;
                    }
                }
            }
            continue;
        }

        if target.contains_key(name) {
            continue;
        }
        if let Some(default) = &property.default {
            target.insert(name.clone(), default.clone());
            added = true;
        }
    }

    added
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
