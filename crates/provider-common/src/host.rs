//! The surface a workflow host exposes to a node.
//!
//! Nodes never reach for ambient globals: credentials, parameters, the
//! per-instance static data, the HTTP helper and the webhook address all come
//! through [`NodeHost`]. Test harnesses and the CLI provide their own hosts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Outbound request handed to [`NodeHost::http_request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn with_query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path of the request URL without scheme, host or query.
    pub fn path(&self) -> &str {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        match without_scheme.find('/') {
            Some(index) => &without_scheme[index..],
            None => "/",
        }
    }

    /// URL with the query pairs appended, percent-encoded.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect();
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.url, pairs.join("&"))
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            Some(body) => serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec()),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: serde_json::to_vec(body).unwrap_or_default(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON; an empty body decodes to `null`.
    pub fn json(&self) -> Result<Value, ProviderError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|err| ProviderError::transport(format!("invalid json: {err}")))
    }

    /// Best description of a failed response: Solapi's `errorCode`/`errorMessage`
    /// pair when present, the raw body otherwise.
    pub fn error_message(&self) -> String {
        let parsed: Option<Value> = serde_json::from_slice(&self.body).ok();
        if let Some(value) = parsed {
            let code = value.get("errorCode").and_then(Value::as_str);
            let message = value.get("errorMessage").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => return format!("{code}: {message}"),
                (Some(code), None) => return code.to_string(),
                (None, Some(message)) => return message.to_string(),
                (None, None) => {}
            }
        }
        let text = String::from_utf8_lossy(&self.body).trim().to_string();
        if text.is_empty() {
            "empty response".to_string()
        } else {
            text
        }
    }

    /// Turn a non-2xx response into [`ProviderError::Remote`].
    pub fn into_result(self) -> Result<Self, ProviderError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProviderError::remote(self.status, self.error_message()))
        }
    }
}

/// How the host is running the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One-shot test run started by hand; webhooks registered here are temporary.
    Manual,
    #[default]
    Active,
}

impl ExecutionMode {
    pub fn is_temporary(&self) -> bool {
        matches!(self, ExecutionMode::Manual)
    }
}

/// One entry of a node's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct NodeItem {
    pub json: Value,
}

impl NodeItem {
    pub fn new(json: Value) -> Self {
        Self { json }
    }
}

/// One choice of a dynamically populated dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Host callbacks a node may use.
pub trait NodeHost {
    /// Stored credential document for the given credential type name.
    fn credentials(&self, name: &str) -> Result<Value, ProviderError>;

    /// Parameter value resolved for one input item.
    fn node_parameter(&self, name: &str, item_index: usize) -> Option<Value>;

    /// Scratch space persisted across activations of this node instance.
    fn workflow_static_data(&mut self) -> &mut Map<String, Value>;

    /// Perform a request. With `auth` set, the host attaches that credential
    /// type itself (OAuth2 bearer injection). Any HTTP status is a response;
    /// only transport failures are errors.
    fn http_request(
        &self,
        request: &HttpRequest,
        auth: Option<&str>,
    ) -> Result<HttpResponse, ProviderError>;

    /// Externally reachable callback URL of the named webhook of this node.
    fn node_webhook_url(&self, name: &str) -> Option<String>;

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Active
    }

    /// Number of input items the node runs for.
    fn input_len(&self) -> usize {
        1
    }
}
