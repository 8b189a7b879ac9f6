//! Typed calls against the fixed Solapi REST endpoints.

use provider_common::{HttpRequest, HttpResponse, NodeHost, ProviderError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::WEBHOOK_NAME;
use crate::auth::Auth;
use crate::config::NodeConfig;

const OUTGOING_WEBHOOKS_PATH: &str = "/webhook/v1/outgoing";
const COMMERCE_HOOKS_PATH: &str = "/commerce/v1/hooks";
const SEND_MANY_PATH: &str = "/messages/v4/send-many/detail";
const STORAGE_FILES_PATH: &str = "/storage/v1/files";
const KAKAO_CHANNELS_PATH: &str = "/kakao/v2/channels";
const KAKAO_TEMPLATES_PATH: &str = "/kakao/v2/templates";
const SENDER_NUMBERS_PATH: &str = "/senderid/v1/numbers/active";

pub const OUTGOING_LIST_LIMIT: u32 = 200;
pub const COMMERCE_LIST_LIMIT: u32 = 500;
pub const KAKAO_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingWebhook {
    pub webhook_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookWebhook {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceHook {
    #[serde(default)]
    pub hook_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook: Option<HookWebhook>,
}

impl CommerceHook {
    /// URL the hook currently delivers to; a non-blank `webhookUrl` wins over
    /// `webhook.url`.
    pub fn callback_url(&self) -> Option<&str> {
        let present = |url: &&str| !url.trim().is_empty();
        self.webhook_url.as_deref().filter(present).or_else(|| {
            self.webhook
                .as_ref()
                .and_then(|hook| hook.url.as_deref())
                .filter(present)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoChannel {
    pub channel_id: String,
    #[serde(default)]
    pub search_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoTemplate {
    pub template_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Storage bucket a file is uploaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    Mms,
    Kakao,
}

/// Remote operations the webhook lifecycle depends on.
pub trait WebhookRemote {
    fn list_outgoing_webhooks(&self) -> Result<Vec<OutgoingWebhook>, ProviderError>;
    fn create_outgoing_webhook(
        &self,
        event_id: &str,
        url: &str,
        is_temporary: bool,
    ) -> Result<String, ProviderError>;
    fn delete_outgoing_webhook(&self, webhook_id: &str) -> Result<(), ProviderError>;
    fn get_commerce_hook(&self, hook_id: &str) -> Result<CommerceHook, ProviderError>;
    fn list_commerce_hooks(&self) -> Result<Vec<CommerceHook>, ProviderError>;
    fn connect_commerce_hook(
        &self,
        hook_id: &str,
        webhook_url: &str,
        is_temporary: bool,
    ) -> Result<(), ProviderError>;
    fn disconnect_commerce_hook(&self, hook_id: &str) -> Result<(), ProviderError>;
}

/// Solapi API client issuing every call through the host HTTP helper.
pub struct SolapiClient<'h, H: NodeHost + ?Sized> {
    host: &'h H,
    auth: Auth,
    api_base: String,
}

impl<'h, H: NodeHost + ?Sized> SolapiClient<'h, H> {
    pub fn new(host: &'h H, auth: Auth, api_base: impl Into<String>) -> Self {
        Self {
            host,
            auth,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client configured from the node parameters and attached credentials.
    pub fn from_host(host: &'h H) -> Result<Self, ProviderError> {
        let config = NodeConfig::from_host(host)?;
        let auth = Auth::from_host(host, config.authentication)?;
        Ok(Self::new(host, auth, config.api_base()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Sign and send a request; non-2xx statuses become [`ProviderError::Remote`].
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        let (request, credential) = self.auth.apply(request)?;
        debug!(method = request.method.as_str(), path = request.path(), "solapi request");
        self.host.http_request(&request, credential)?.into_result()
    }

    pub fn call(&self, request: HttpRequest) -> Result<Value, ProviderError> {
        self.execute(request)?.json()
    }

    pub fn send_many(&self, body: &Value) -> Result<Value, ProviderError> {
        self.call(HttpRequest::post(self.url(SEND_MANY_PATH)).with_json(body.clone()))
    }

    /// Upload a base64 encoded file and return its `fileId`.
    pub fn upload_file(
        &self,
        file_base64: &str,
        kind: FileKind,
        name: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => json!({ "file": file_base64, "type": kind, "name": name }),
            None => json!({ "file": file_base64, "type": kind }),
        };
        let response = self.call(HttpRequest::post(self.url(STORAGE_FILES_PATH)).with_json(body))?;
        string_field(&response, "fileId")
    }

    pub fn list_kakao_channels(&self) -> Result<Vec<KakaoChannel>, ProviderError> {
        let request =
            HttpRequest::get(self.url(KAKAO_CHANNELS_PATH)).with_query("limit", KAKAO_LIST_LIMIT);
        let response = self.call(request)?;
        Ok(parse_list(&response, &["channelList", "list"]))
    }

    /// Approved templates of one channel.
    pub fn list_kakao_templates(&self, channel_id: &str) -> Result<Vec<KakaoTemplate>, ProviderError> {
        let request = HttpRequest::get(self.url(KAKAO_TEMPLATES_PATH))
            .with_query("channelId", channel_id)
            .with_query("status", "APPROVED")
            .with_query("limit", KAKAO_LIST_LIMIT);
        let response = self.call(request)?;
        Ok(parse_list(&response, &["templateList", "list"]))
    }

    pub fn list_sender_numbers(&self) -> Result<Vec<String>, ProviderError> {
        let response = self.call(HttpRequest::get(self.url(SENDER_NUMBERS_PATH)))?;
        let entries = match &response {
            Value::Array(entries) => entries.as_slice(),
            other => other
                .get("list")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        Ok(entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(number) => Some(number.clone()),
                other => other
                    .get("phoneNumber")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }
}

impl<H: NodeHost + ?Sized> WebhookRemote for SolapiClient<'_, H> {
    fn list_outgoing_webhooks(&self) -> Result<Vec<OutgoingWebhook>, ProviderError> {
        let request = HttpRequest::get(self.url(OUTGOING_WEBHOOKS_PATH))
            .with_query("limit", OUTGOING_LIST_LIMIT);
        let response = self.call(request)?;
        Ok(parse_list(&response, &["list"]))
    }

    fn create_outgoing_webhook(
        &self,
        event_id: &str,
        url: &str,
        is_temporary: bool,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "eventId": event_id,
            "url": url,
            "name": WEBHOOK_NAME,
            "isTemporary": is_temporary,
        });
        let response =
            self.call(HttpRequest::post(self.url(OUTGOING_WEBHOOKS_PATH)).with_json(body))?;
        string_field(&response, "webhookId")
    }

    fn delete_outgoing_webhook(&self, webhook_id: &str) -> Result<(), ProviderError> {
        let path = format!("{OUTGOING_WEBHOOKS_PATH}/{}", urlencoding::encode(webhook_id));
        self.execute(HttpRequest::delete(self.url(&path)))?;
        Ok(())
    }

    fn get_commerce_hook(&self, hook_id: &str) -> Result<CommerceHook, ProviderError> {
        let path = format!("{COMMERCE_HOOKS_PATH}/{}", urlencoding::encode(hook_id));
        let response = self.call(HttpRequest::get(self.url(&path)))?;
        let mut hook: CommerceHook = serde_json::from_value(response)
            .map_err(|err| ProviderError::transport(format!("invalid commerce hook: {err}")))?;
        if hook.hook_id.is_empty() {
            hook.hook_id = hook_id.to_string();
        }
        Ok(hook)
    }

    fn list_commerce_hooks(&self) -> Result<Vec<CommerceHook>, ProviderError> {
        let request = HttpRequest::get(self.url(COMMERCE_HOOKS_PATH))
            .with_query("limit", COMMERCE_LIST_LIMIT);
        let response = self.call(request)?;
        Ok(parse_list(&response, &["list"]))
    }

    fn connect_commerce_hook(
        &self,
        hook_id: &str,
        webhook_url: &str,
        is_temporary: bool,
    ) -> Result<(), ProviderError> {
        let path = format!(
            "{COMMERCE_HOOKS_PATH}/{}/connect-webhook",
            urlencoding::encode(hook_id)
        );
        let body = json!({
            "name": WEBHOOK_NAME,
            "webhookUrl": webhook_url,
            "isTemporary": is_temporary,
        });
        self.execute(HttpRequest::post(self.url(&path)).with_json(body))?;
        Ok(())
    }

    fn disconnect_commerce_hook(&self, hook_id: &str) -> Result<(), ProviderError> {
        let path = format!(
            "{COMMERCE_HOOKS_PATH}/{}/disconnect-webhook",
            urlencoding::encode(hook_id)
        );
        self.execute(HttpRequest::post(self.url(&path)))?;
        Ok(())
    }
}

/// Entries of the first array found under `keys` (or the body itself when it
/// is an array). Entries that do not match `T` are skipped.
fn parse_list<T: DeserializeOwned>(body: &Value, keys: &[&str]) -> Vec<T> {
    let entries = match body {
        Value::Array(entries) => Some(entries),
        other => keys
            .iter()
            .find_map(|key| other.get(*key).and_then(Value::as_array)),
    };
    entries
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(body: &Value, key: &str) -> Result<String, ProviderError> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::transport(format!("response missing `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_malformed_entries() {
        let body = json!({"list": [
            {"webhookId": "WH1", "url": "https://cb.test/1", "eventId": "SINGLE-REPORT"},
            {"url": "https://cb.test/no-id"},
            {"webhookId": "WH2"}
        ]});
        let hooks: Vec<OutgoingWebhook> = parse_list(&body, &["list"]);
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].event_id.as_deref(), Some("SINGLE-REPORT"));
        assert_eq!(hooks[1].url, None);
    }

    #[test]
    fn parse_list_accepts_bare_arrays_and_fallback_keys() {
        let bare = json!([{"channelId": "KA01"}]);
        let channels: Vec<KakaoChannel> = parse_list(&bare, &["channelList"]);
        assert_eq!(channels[0].channel_id, "KA01");

        let keyed = json!({"list": [{"channelId": "KA02", "searchId": "@shop"}]});
        let channels: Vec<KakaoChannel> = parse_list(&keyed, &["channelList", "list"]);
        assert_eq!(channels[0].search_id.as_deref(), Some("@shop"));

        let none: Vec<KakaoChannel> = parse_list(&json!({"other": []}), &["channelList"]);
        assert!(none.is_empty());
    }

    #[test]
    fn commerce_hook_prefers_flat_webhook_url() {
        let hook: CommerceHook = serde_json::from_value(json!({
            "hookId": "H1",
            "webhookUrl": "https://cb.test/flat",
            "webhook": {"url": "https://cb.test/nested"}
        }))
        .unwrap();
        assert_eq!(hook.callback_url(), Some("https://cb.test/flat"));

        let nested: CommerceHook =
            serde_json::from_value(json!({"webhook": {"url": "https://cb.test/nested"}})).unwrap();
        assert_eq!(nested.callback_url(), Some("https://cb.test/nested"));

        let empty: CommerceHook = serde_json::from_value(json!({"webhookUrl": " "})).unwrap();
        assert_eq!(empty.callback_url(), None);
    }

    #[test]
    fn blank_flat_url_falls_through_to_nested() {
        let hook: CommerceHook = serde_json::from_value(json!({
            "hookId": "H1",
            "webhookUrl": "",
            "webhook": {"url": "https://cb.test/nested"}
        }))
        .unwrap();
        assert_eq!(hook.callback_url(), Some("https://cb.test/nested"));
    }

    #[test]
    fn string_field_requires_non_empty_value() {
        assert_eq!(string_field(&json!({"fileId": "F1"}), "fileId").unwrap(), "F1");
        let err = string_field(&json!({"fileId": ""}), "fileId").unwrap_err();
        assert_eq!(err, ProviderError::transport("response missing `fileId`"));
    }

    #[test]
    fn file_kind_serializes_uppercase() {
        assert_eq!(serde_json::to_value(FileKind::Mms).unwrap(), json!("MMS"));
        assert_eq!(serde_json::to_value(FileKind::Kakao).unwrap(), json!("KAKAO"));
    }
}
