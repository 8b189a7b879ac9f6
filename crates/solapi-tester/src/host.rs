use provider_common::{
    ExecutionMode, HttpRequest, HttpResponse, NodeHost, ProviderError,
};
use serde_json::{Map, Value};

use crate::http_mock::{HttpHistory, HttpMode, mock_response, record, send_real_request};
use crate::values::Values;

/// [`NodeHost`] backed by a values file, with mock or real HTTP.
pub struct CliHost {
    values: Values,
    item_params: Vec<Map<String, Value>>,
    static_data: Map<String, Value>,
    public_base_url: Option<String>,
    mode: ExecutionMode,
    history: HttpHistory,
}

impl CliHost {
    pub fn new(values: Values, history: HttpHistory) -> Self {
        Self {
            values,
            item_params: Vec::new(),
            static_data: Map::new(),
            public_base_url: None,
            mode: ExecutionMode::Active,
            history,
        }
    }

    pub fn with_item_params(mut self, item_params: Vec<Map<String, Value>>) -> Self {
        self.item_params = item_params;
        self
    }

    pub fn with_static_data(mut self, static_data: Map<String, Value>) -> Self {
        self.static_data = static_data;
        self
    }

    pub fn with_public_base_url(mut self, url: &str) -> Self {
        self.public_base_url = Some(url.trim().trim_end_matches('/').to_string());
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn set_param(&mut self, name: &str, value: Value) {
        self.values.params.insert(name.to_string(), value);
    }

    pub fn static_data(&self) -> &Map<String, Value> {
        &self.static_data
    }

    /// Bearer header for a credential type the node asked the host to inject.
    fn bearer_for(&self, credential: &str) -> Result<String, ProviderError> {
        let doc = self.credentials(credential)?;
        doc.get("accessToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {token}"))
            .ok_or_else(|| ProviderError::missing_secret(format!("{credential}.accessToken")))
    }
}

impl NodeHost for CliHost {
    fn credentials(&self, name: &str) -> Result<Value, ProviderError> {
        self.values
            .secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::missing_secret(name))
    }

    fn node_parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.item_params
            .get(item_index)
            .and_then(|params| params.get(name))
            .or_else(|| self.values.params.get(name))
            .or_else(|| self.values.config.get(name))
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
        let result = match self.values.http_mode() {
            HttpMode::Mock => Ok(mock_response(request, &self.values.mock_responses)),
            HttpMode::Real => match auth {
                Some(credential) => self
                    .bearer_for(credential)
                    .and_then(|bearer| {
                        send_real_request(&request.clone().with_header("Authorization", bearer))
                    }),
                None => send_real_request(request),
            },
        };
        record(&self.history, request, auth, &result);
        result
    }

    fn node_webhook_url(&self, name: &str) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/webhook/solapi/{name}"))
    }

    fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    fn input_len(&self) -> usize {
        self.item_params.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_mock::{history_json, new_history};
    use serde_json::json;

    fn values() -> Values {
        let mut values = Values::default();
        values.config.insert("authentication".into(), json!("apiKey"));
        values.params.insert("to".into(), json!("01000000000"));
        values
    }

    #[test]
    fn item_params_shadow_shared_params_and_config() {
        let mut item = Map::new();
        item.insert("to".into(), json!("01099999999"));
        let host = CliHost::new(values(), new_history()).with_item_params(vec![Map::new(), item]);
        assert_eq!(host.input_len(), 2);
        assert_eq!(host.node_parameter("to", 0), Some(json!("01000000000")));
        assert_eq!(host.node_parameter("to", 1), Some(json!("01099999999")));
        assert_eq!(host.node_parameter("authentication", 1), Some(json!("apiKey")));
    }

    #[test]
    fn webhook_url_joins_public_base() {
        let host = CliHost::new(values(), new_history()).with_public_base_url("https://tunnel.test/ ");
        assert_eq!(
            host.node_webhook_url("default").as_deref(),
            Some("https://tunnel.test/webhook/solapi/default")
        );
        assert_eq!(CliHost::new(values(), new_history()).node_webhook_url("default"), None);
    }

    #[test]
    fn mock_requests_are_recorded() {
        let history = new_history();
        let host = CliHost::new(values(), history.clone());
        let resp = host
            .http_request(&HttpRequest::get("https://api.solapi.com/x"), None)
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(history_json(&history)[0]["request"]["url"], "https://api.solapi.com/x");
    }
}
