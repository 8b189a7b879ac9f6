//! Request authentication for the Solapi REST API.
//!
//! API-key credentials are signed locally with HMAC-SHA256 over `date + salt`;
//! OAuth2 requests are handed to the host, which injects the bearer token.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use provider_common::{HttpRequest, NodeHost, ProviderError};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::config::AuthMode;
use crate::OAUTH2_CREDENTIAL;

type HmacSha256 = Hmac<Sha256>;

/// `{apiKey, apiSecret}` as stored by the host. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl ApiKeyCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Lenient read of a credential document; non-string fields become empty.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            api_key: field("apiKey"),
            api_secret: field("apiSecret"),
        }
    }
}

/// Hex HMAC-SHA256 of `date || salt` keyed with the API secret.
pub fn sign(api_secret: &str, date: &str, salt: &str) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|_| ProviderError::config("invalid signing secret"))?;
    mac.update(date.as_bytes());
    mac.update(salt.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Authorization header value for a given instant and salt.
pub fn authorization_header_at(
    credentials: &ApiKeyCredentials,
    date: DateTime<Utc>,
    salt: [u8; 16],
) -> Result<String, ProviderError> {
    let date = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    let salt = hex::encode(salt);
    let signature = sign(&credentials.api_secret, &date, &salt)?;
    Ok(format!(
        "HMAC-SHA256 apiKey={}, date={date}, salt={salt}, signature={signature}",
        credentials.api_key
    ))
}

/// Authorization header with the current time and 16 fresh random bytes of salt.
pub fn authorization_header(credentials: &ApiKeyCredentials) -> Result<String, ProviderError> {
    authorization_header_at(credentials, Utc::now(), rand::random::<[u8; 16]>())
}

/// Credential variant resolved for one node run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    ApiKey(ApiKeyCredentials),
    OAuth2,
}

impl Auth {
    pub fn from_host<H: NodeHost + ?Sized>(host: &H, mode: AuthMode) -> Result<Self, ProviderError> {
        match mode {
            AuthMode::ApiKey => {
                let doc = host.credentials(mode.credential_name())?;
                Ok(Auth::ApiKey(ApiKeyCredentials::from_value(&doc)))
            }
            AuthMode::OAuth2 => Ok(Auth::OAuth2),
        }
    }

    /// Attach authentication to `request`. Returns the credential type the host
    /// must inject itself, if any.
    pub fn apply(
        &self,
        request: HttpRequest,
    ) -> Result<(HttpRequest, Option<&'static str>), ProviderError> {
        match self {
            Auth::ApiKey(credentials) => Ok((
                request.with_header("Authorization", authorization_header(credentials)?),
                None,
            )),
            Auth::OAuth2 => Ok((request, Some(OAUTH2_CREDENTIAL))),
        }
    }
}
