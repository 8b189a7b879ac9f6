use std::io::Read;
use std::sync::{Arc, Mutex};

use base64::{Engine, engine::general_purpose::STANDARD};
use http::{Request, Response as RawResponse};
use provider_common::{HttpRequest, HttpResponse, ProviderError};
use serde::Serialize;
use serde_json::{Map, Value};
use ureq::{Agent, Body};

pub type HttpHistory = Arc<Mutex<Vec<HttpCall>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMode {
    #[default]
    Mock,
    Real,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpCall {
    pub request: HttpRequestRecord,
    pub response: Option<HttpResponseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpRequestRecord {
    pub method: String,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpResponseRecord {
    pub status: u16,
    pub body_b64: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl HttpRequestRecord {
    pub fn from_request(req: &HttpRequest, auth: Option<&str>) -> Self {
        let headers = req
            .headers
            .iter()
            .map(|(name, value)| Header {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        Self {
            method: req.method.as_str().to_string(),
            url: req.full_url(),
            headers,
            body: req.body.clone(),
            auth: auth.map(str::to_string),
        }
    }
}

impl HttpResponseRecord {
    pub fn from_response(resp: &HttpResponse) -> Self {
        let body_b64 = (!resp.body.is_empty()).then(|| STANDARD.encode(&resp.body));
        Self {
            status: resp.status,
            body_b64,
        }
    }
}

pub fn new_history() -> HttpHistory {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(
    history: &HttpHistory,
    req: &HttpRequest,
    auth: Option<&str>,
    result: &Result<HttpResponse, ProviderError>,
) {
    let call = HttpCall {
        request: HttpRequestRecord::from_request(req, auth),
        response: result.as_ref().ok().map(HttpResponseRecord::from_response),
        error: result.as_ref().err().map(ToString::to_string),
    };
    if let Ok(mut calls) = history.lock() {
        calls.push(call);
    }
}

pub fn history_json(history: &HttpHistory) -> Value {
    history
        .lock()
        .map(|calls| serde_json::to_value(&*calls).unwrap_or_default())
        .unwrap_or_default()
}

/// Covers the fields every Solapi call reads, so any flow runs to completion.
const MOCK_RESPONSE_BODY: &str = r#"{"webhookId":"MOCK-WEBHOOK","fileId":"MOCK-FILE","groupInfo":{"groupId":"MOCK-GROUP","count":{"total":0}},"failedMessageList":[],"list":[]}"#;

/// Canned reply; a `"METHOD /path"` entry in `overrides` replaces the default body.
pub fn mock_response(req: &HttpRequest, overrides: &Map<String, Value>) -> HttpResponse {
    let key = format!("{} {}", req.method.as_str(), req.path());
    match overrides.get(&key) {
        Some(body) => HttpResponse::json_body(200, body),
        None => HttpResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: MOCK_RESPONSE_BODY.as_bytes().to_vec(),
        },
    }
}

pub fn send_real_request(req: &HttpRequest) -> Result<HttpResponse, ProviderError> {
    let agent: Agent = Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    let mut builder = Request::builder()
        .method(req.method.as_str())
        .uri(req.full_url());
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if req.body.is_some() {
        builder = builder.header("Content-Type", "application/json");
    }
    tracing::debug!(method = req.method.as_str(), url = %req.full_url(), "real http request");
    let request = builder
        .body(req.body_bytes())
        .map_err(|err| ProviderError::transport(format!("http_request_build: {err}")))?;
    match agent.run(request) {
        Ok(resp) => build_response(resp),
        Err(err) => Err(ProviderError::transport(err.to_string())),
    }
}

fn build_response(resp: RawResponse<Body>) -> Result<HttpResponse, ProviderError> {
    let status = resp.status();
    let headers = resp
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let mut reader = resp.into_body().into_reader();
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|err| ProviderError::transport(format!("http_read_error: {err}")))?;
    Ok(HttpResponse {
        status: status.as_u16(),
        headers,
        body,
    })
}
