use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http_mock::HttpMode;

/// Values file driving one CLI run.
///
/// `config` holds node-level settings (`authentication`, `apiBaseUrl`),
/// `secrets` maps credential type names to their documents, `params` are the
/// node parameters shared by every item.
#[derive(Debug, Deserialize, Clone, Default, Serialize)]
pub struct Values {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub secrets: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub http: Option<String>,
    /// Mock replies keyed by `"METHOD /path"`.
    #[serde(default)]
    pub mock_responses: Map<String, Value>,
}

impl Values {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read values file {}", path.as_ref().display()))?;
        let values: Values = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.as_ref().display()))?;
        Ok(values)
    }

    pub fn http_mode(&self) -> HttpMode {
        match self
            .http
            .as_deref()
            .unwrap_or("mock")
            .to_ascii_lowercase()
            .as_str()
        {
            "real" => HttpMode::Real,
            _ => HttpMode::Mock,
        }
    }
}

/// Per-item parameter overrides from `--item-params`: a JSON object or an
/// array of objects, one per input item.
pub fn parse_item_params(raw: &str) -> Result<Vec<Map<String, Value>>> {
    let parsed: Value = serde_json::from_str(raw).context("--item-params is not valid json")?;
    let entries = match parsed {
        Value::Object(map) => return Ok(vec![map]),
        Value::Array(entries) => entries,
        _ => bail!("--item-params must be an object or an array of objects"),
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(map) => Ok(map),
            _ => bail!("--item-params entry {index} is not an object"),
        })
        .collect()
}

/// Static data persisted between `webhook` invocations. A missing file is an
/// empty state.
pub fn load_state(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let bytes =
        fs::read(path).with_context(|| format!("failed to read state file {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save_state(path: &Path, state: &Map<String, Value>) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(state)?;
    fs::write(path, bytes).with_context(|| format!("failed to write state file {}", path.display()))
}
