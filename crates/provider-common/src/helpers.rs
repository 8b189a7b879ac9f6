//! Shared utility functions used by the Solapi nodes.
//!
//! Pure functions for pulling typed values out of loosely typed JSON
//! (node parameters and node configuration).

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{NodeHost, ProviderError};

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ---------------------------------------------------------------------------
// Node parameters
// ---------------------------------------------------------------------------

/// String parameter for one item; numbers are rendered as text, blanks are `None`.
pub fn param_string<H: NodeHost + ?Sized>(
    host: &H,
    name: &str,
    item_index: usize,
) -> Option<String> {
    match host.node_parameter(name, item_index)? {
        Value::String(text) => non_empty(&text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Required string parameter; absence is a validation error naming the field.
pub fn required_param<H: NodeHost + ?Sized>(
    host: &H,
    name: &str,
    item_index: usize,
) -> Result<String, ProviderError> {
    param_string(host, name, item_index)
        .ok_or_else(|| ProviderError::validation(format!("parameter `{name}` is required")))
}

/// Boolean parameter with a default; accepts `true`/`false` and their string forms.
pub fn param_bool<H: NodeHost + ?Sized>(
    host: &H,
    name: &str,
    item_index: usize,
    default: bool,
) -> bool {
    match host.node_parameter(name, item_index) {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}

// ---------------------------------------------------------------------------
// Config loader
// ---------------------------------------------------------------------------

/// Load a config from input JSON.
///
/// Tries `input["config"]` first, then falls back to extracting top-level
/// fields listed in `keys`. An input with neither yields `T` from an empty
/// object, so all-default configs are valid.
pub fn load_config_generic<T: DeserializeOwned>(
    input: &Value,
    keys: &[&str],
) -> Result<T, ProviderError> {
    if let Some(cfg) = input.get("config") {
        return serde_json::from_value::<T>(cfg.clone())
            .map_err(|e| ProviderError::config(e.to_string()));
    }
    let mut partial = serde_json::Map::new();
    for key in keys {
        if let Some(v) = input.get(*key).filter(|v| !v.is_null()) {
            partial.insert((*key).to_string(), v.clone());
        }
    }
    serde_json::from_value::<T>(Value::Object(partial))
        .map_err(|e| ProviderError::config(e.to_string()))
}
