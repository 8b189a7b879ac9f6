use provider_common::helpers::load_config_generic;
use provider_common::{NodeHost, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{API_KEY_CREDENTIAL, DEFAULT_API_BASE, OAUTH2_CREDENTIAL};

const CONFIG_KEYS: &[&str] = &["authentication", "apiBaseUrl"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    #[default]
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "oAuth2")]
    OAuth2,
}

impl AuthMode {
    pub fn credential_name(&self) -> &'static str {
        match self {
            AuthMode::ApiKey => API_KEY_CREDENTIAL,
            AuthMode::OAuth2 => OAUTH2_CREDENTIAL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub authentication: AuthMode,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl NodeConfig {
    /// Read the node-level parameters (resolved for the first item) and validate them.
    pub fn from_host<H: NodeHost + ?Sized>(host: &H) -> Result<Self, ProviderError> {
        let mut params = Map::new();
        for key in CONFIG_KEYS {
            if let Some(value) = host.node_parameter(key, 0) {
                params.insert((*key).to_string(), value);
            }
        }
        Self::from_value(&Value::Object(params))
    }

    pub fn from_value(input: &Value) -> Result<Self, ProviderError> {
        let cfg: NodeConfig = load_config_generic(input, CONFIG_KEYS)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if let Some(base) = self.api_base_url.as_deref() {
            let base = base.trim();
            if base.is_empty() {
                return Err(ProviderError::config("apiBaseUrl cannot be empty"));
            }
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ProviderError::config("apiBaseUrl must be an absolute URL"));
            }
        }
        Ok(())
    }

    pub fn api_base(&self) -> String {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_api_key_and_public_base() {
        let cfg = NodeConfig::from_value(&json!({})).unwrap();
        assert_eq!(cfg.authentication, AuthMode::ApiKey);
        assert_eq!(cfg.api_base(), "https://api.solapi.com");
    }

    #[test]
    fn parses_oauth2_and_trims_base() {
        let cfg = NodeConfig::from_value(&json!({
            "authentication": "oAuth2",
            "apiBaseUrl": "https://sandbox.solapi.test/ "
        }))
        .unwrap();
        assert_eq!(cfg.authentication, AuthMode::OAuth2);
        assert_eq!(cfg.authentication.credential_name(), "solapiOAuth2Api");
        assert_eq!(cfg.api_base(), "https://sandbox.solapi.test");
    }

    #[test]
    fn rejects_relative_base_url() {
        let err = NodeConfig::from_value(&json!({"apiBaseUrl": "api.solapi.com"})).unwrap_err();
        assert_eq!(
            err,
            ProviderError::config("apiBaseUrl must be an absolute URL")
        );
    }

    #[test]
    fn rejects_unknown_fields_in_nested_config() {
        let err = NodeConfig::from_value(&json!({"config": {"token": "x"}})).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_unknown_auth_mode() {
        let err = NodeConfig::from_value(&json!({"authentication": "basic"})).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }
}
