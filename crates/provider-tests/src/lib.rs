//! Scripted [`NodeHost`] for exercising the Solapi nodes without a network.
//!
//! Routes answer by method and longest matching path prefix; anything
//! unmatched gets a Solapi-style 404. Every request is recorded.

use std::cell::RefCell;
use std::collections::BTreeMap;

use provider_common::{
    ExecutionMode, HttpMethod, HttpRequest, HttpResponse, NodeHost, ProviderError,
};
use serde_json::{Map, Value, json};

pub const TEST_API_KEY: &str = "NCSTESTKEY";
pub const TEST_API_SECRET: &str = "test-secret";
pub const TEST_WEBHOOK_URL: &str = "https://workflows.test/webhook/solapi-node";

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    TransportError(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: HttpMethod,
    path: String,
    reply: Reply,
}

/// One request the node made, with the credential type it asked the host to inject.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub request: HttpRequest,
    pub auth: Option<String>,
}

impl RecordedCall {
    pub fn method(&self) -> HttpMethod {
        self.request.method
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn body(&self) -> Value {
        self.request.body.clone().unwrap_or(Value::Null)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.request
            .query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
pub struct MockHost {
    params: Map<String, Value>,
    item_params: BTreeMap<usize, Map<String, Value>>,
    credentials: BTreeMap<String, Value>,
    static_data: Map<String, Value>,
    webhook_url: Option<String>,
    mode: ExecutionMode,
    input_len: usize,
    routes: Vec<Route>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// Host with API-key credentials, one input item and a callback URL.
    pub fn new() -> Self {
        let mut credentials = BTreeMap::new();
        credentials.insert(
            "solapiApi".to_string(),
            json!({"apiKey": TEST_API_KEY, "apiSecret": TEST_API_SECRET}),
        );
        Self {
            params: Map::new(),
            item_params: BTreeMap::new(),
            credentials,
            static_data: Map::new(),
            webhook_url: Some(TEST_WEBHOOK_URL.to_string()),
            mode: ExecutionMode::Active,
            input_len: 1,
            routes: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Parameter shared by every item.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Parameter overriding the shared one for a single item.
    pub fn item_param(mut self, item: usize, name: &str, value: impl Into<Value>) -> Self {
        self.item_params
            .entry(item)
            .or_default()
            .insert(name.to_string(), value.into());
        self.input_len = self.input_len.max(item + 1);
        self
    }

    pub fn credential(mut self, name: &str, value: Value) -> Self {
        self.credentials.insert(name.to_string(), value);
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials.clear();
        self
    }

    pub fn webhook_url(mut self, url: Option<&str>) -> Self {
        self.webhook_url = url.map(str::to_string);
        self
    }

    pub fn manual(mut self) -> Self {
        self.mode = ExecutionMode::Manual;
        self
    }

    pub fn static_entry(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.static_data.insert(key.to_string(), value.into());
        self
    }

    pub fn respond(mut self, method: HttpMethod, path: &str, status: u16, body: Value) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            reply: Reply::Response(HttpResponse::json_body(status, &body)),
        });
        self
    }

    /// Answer with an empty body, the way Solapi acknowledges deletes.
    pub fn respond_empty(mut self, method: HttpMethod, path: &str, status: u16) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            reply: Reply::Response(HttpResponse {
                status,
                headers: Vec::new(),
                body: Vec::new(),
            }),
        });
        self
    }

    pub fn fail_transport(mut self, method: HttpMethod, path: &str) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            reply: Reply::TransportError(format!("connection refused: {path}")),
        });
        self
    }

    pub fn static_data(&self) -> &Map<String, Value> {
        &self.static_data
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, method: HttpMethod, path: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.method() == method && call.path() == path)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn route_for(&self, request: &HttpRequest) -> Option<&Route> {
        let path = request.path();
        self.routes
            .iter()
            .filter(|route| route.method == request.method && path.starts_with(&route.path))
            .max_by_key(|route| route.path.len())
    }
}

impl NodeHost for MockHost {
    fn credentials(&self, name: &str) -> Result<Value, ProviderError> {
        self.credentials
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::missing_secret(name))
    }

    fn node_parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.item_params
            .get(&item_index)
            .and_then(|params| params.get(name))
            .or_else(|| self.params.get(name))
            .cloned()
    }

    fn workflow_static_data(&mut self) -> &mut Map<String, Value> {
        &mut self.static_data
    }

    fn http_request(
        &self,
        request: &HttpRequest,
        auth: Option<&str>,
    ) -> Result<HttpResponse, ProviderError> {
        self.calls.borrow_mut().push(RecordedCall {
            request: request.clone(),
            auth: auth.map(str::to_string),
        });
        match self.route_for(request).map(|route| &route.reply) {
            Some(Reply::Response(response)) => Ok(response.clone()),
            Some(Reply::TransportError(message)) => Err(ProviderError::transport(message.clone())),
            None => Ok(HttpResponse::json_body(
                404,
                &json!({"errorCode": "NotFound", "errorMessage": "no route"}),
            )),
        }
    }

    fn node_webhook_url(&self, _name: &str) -> Option<String> {
        self.webhook_url.clone()
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn input_len(&self) -> usize {
        self.input_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let host = MockHost::new()
            .respond(HttpMethod::Get, "/commerce/v1/hooks", 200, json!({"list": []}))
            .respond(HttpMethod::Get, "/commerce/v1/hooks/H1", 200, json!({"hookId": "H1"}));
        let response = host
            .http_request(&HttpRequest::get("https://api.solapi.com/commerce/v1/hooks/H1"), None)
            .unwrap();
        assert_eq!(response.json().unwrap()["hookId"], "H1");
    }

    #[test]
    fn unmatched_requests_get_404_and_are_recorded() {
        let host = MockHost::new();
        let response = host
            .http_request(&HttpRequest::delete("https://api.solapi.com/x"), Some("oauth"))
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(host.calls()[0].auth.as_deref(), Some("oauth"));
    }

    #[test]
    fn item_params_override_shared_ones() {
        let host = MockHost::new().param("to", "010").item_param(1, "to", "011");
        assert_eq!(host.node_parameter("to", 0), Some(json!("010")));
        assert_eq!(host.node_parameter("to", 1), Some(json!("011")));
        assert_eq!(host.input_len(), 2);
    }
}
