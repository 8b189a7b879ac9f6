use base64::{Engine, engine::general_purpose::STANDARD};
use provider_common::helpers::{param_bool, param_string, required_param};
use provider_common::{NodeHost, NodeItem, OptionEntry, ProviderError};
use serde_json::Value;
use tracing::info;

use crate::assemble::{KakaoOptions, MessageDraft, build_send_many};
use crate::client::{FileKind, SolapiClient, WebhookRemote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SendSms,
    SendLms,
    SendMms,
    SendAlimtalk,
    SendFriendtalk,
}

impl Operation {
    pub fn from_params(resource: &str, operation: &str) -> Result<Self, ProviderError> {
        match (resource, operation) {
            ("message", "sendSms") => Ok(Operation::SendSms),
            ("message", "sendLms") => Ok(Operation::SendLms),
            ("message", "sendMms") => Ok(Operation::SendMms),
            ("kakao", "sendAlimtalk") => Ok(Operation::SendAlimtalk),
            ("kakao", "sendFriendtalk") => Ok(Operation::SendFriendtalk),
            (resource, operation) => Err(ProviderError::validation(format!(
                "unsupported operation `{operation}` for resource `{resource}`"
            ))),
        }
    }

    pub fn for_item<H: NodeHost + ?Sized>(host: &H, item: usize) -> Result<Self, ProviderError> {
        let resource = param_string(host, "resource", item).unwrap_or_else(|| "message".into());
        let operation = param_string(host, "operation", item).unwrap_or_else(|| "sendSms".into());
        Self::from_params(&resource, &operation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SendSms => "sendSms",
            Operation::SendLms => "sendLms",
            Operation::SendMms => "sendMms",
            Operation::SendAlimtalk => "sendAlimtalk",
            Operation::SendFriendtalk => "sendFriendtalk",
        }
    }
}

/// The action node: message sending plus dropdown lookups.
pub struct SolapiNode;

impl SolapiNode {
    /// Send one request per input item; each response becomes an output item.
    pub fn execute<H: NodeHost + ?Sized>(host: &H) -> Result<Vec<NodeItem>, ProviderError> {
        let client = SolapiClient::from_host(host)?;
        let mut items = Vec::new();
        for item in 0..host.input_len().max(1) {
            let operation = Operation::for_item(host, item)?;
            let draft = draft_for(&client, host, operation, item)?;
            let to = required_param(host, "to", item)?;
            let body = build_send_many(&draft, &to)?;
            let response = client.send_many(&body)?;
            info!(
                operation = operation.as_str(),
                item,
                recipients = body["messages"].as_array().map_or(0, Vec::len),
                "sent messages"
            );
            items.push(NodeItem::new(response));
        }
        Ok(items)
    }

    /// Options for a dynamic dropdown by loader name.
    pub fn load_options<H: NodeHost + ?Sized>(
        host: &H,
        method: &str,
    ) -> Result<Vec<OptionEntry>, ProviderError> {
        match method {
            "getSenderNumbers" => Self::load_sender_numbers(host),
            "getKakaoChannels" => Self::load_kakao_channels(host),
            "getKakaoTemplates" => Self::load_kakao_templates(host),
            "getCommerceHooks" => Self::load_commerce_hooks(host),
            other => Err(ProviderError::validation(format!(
                "unknown options loader `{other}`"
            ))),
        }
    }

    pub fn load_sender_numbers<H: NodeHost + ?Sized>(
        host: &H,
    ) -> Result<Vec<OptionEntry>, ProviderError> {
        let client = SolapiClient::from_host(host)?;
        Ok(client
            .list_sender_numbers()?
            .into_iter()
            .map(|number| OptionEntry::new(number.clone(), number))
            .collect())
    }

    pub fn load_kakao_channels<H: NodeHost + ?Sized>(
        host: &H,
    ) -> Result<Vec<OptionEntry>, ProviderError> {
        let client = SolapiClient::from_host(host)?;
        Ok(client
            .list_kakao_channels()?
            .into_iter()
            .map(|channel| {
                let name = channel
                    .search_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| channel.channel_id.clone());
                OptionEntry::new(name, channel.channel_id)
            })
            .collect())
    }

    /// Approved templates of the channel selected in `pfId`. Empty without one.
    pub fn load_kakao_templates<H: NodeHost + ?Sized>(
        host: &H,
    ) -> Result<Vec<OptionEntry>, ProviderError> {
        let Some(channel_id) = param_string(host, "pfId", 0) else {
            return Ok(Vec::new());
        };
        let client = SolapiClient::from_host(host)?;
        Ok(client
            .list_kakao_templates(&channel_id)?
            .into_iter()
            .filter(|template| {
                template
                    .status
                    .as_deref()
                    .is_none_or(|status| status.eq_ignore_ascii_case("APPROVED"))
            })
            .map(|template| {
                let name = template
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| template.template_id.clone());
                OptionEntry::new(name, template.template_id)
            })
            .collect())
    }

    pub fn load_commerce_hooks<H: NodeHost + ?Sized>(
        host: &H,
    ) -> Result<Vec<OptionEntry>, ProviderError> {
        let client = SolapiClient::from_host(host)?;
        Ok(client
            .list_commerce_hooks()?
            .into_iter()
            .filter(|hook| !hook.hook_id.is_empty())
            .map(|hook| {
                let name = hook
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| hook.hook_id.clone());
                OptionEntry::new(name, hook.hook_id)
            })
            .collect())
    }
}

fn draft_for<H: NodeHost + ?Sized>(
    client: &SolapiClient<'_, H>,
    host: &H,
    operation: Operation,
    item: usize,
) -> Result<MessageDraft, ProviderError> {
    let from = required_param(host, "from", item)?;
    let text = param_string(host, "text", item);
    let subject = param_string(host, "subject", item);
    let draft = match operation {
        Operation::SendSms => MessageDraft::sms(&from, required_text(text)?),
        Operation::SendLms => MessageDraft::lms(&from, required_text(text)?, subject),
        Operation::SendMms => {
            let image_id = image_for(client, host, item, FileKind::Mms)?
                .ok_or_else(|| ProviderError::validation("MMS requires `imageId` or `imageBase64`"))?;
            MessageDraft::mms(&from, required_text(text)?, subject, image_id)
        }
        Operation::SendAlimtalk => {
            let kakao = KakaoOptions::new(required_param(host, "pfId", item)?)
                .with_template(required_param(host, "templateId", item)?)
                .with_variables(&host.node_parameter("variables", item).unwrap_or(Value::Null))?
                .with_disable_sms(param_bool(host, "disableSms", item, false));
            MessageDraft::alimtalk(&from, kakao, text)
        }
        Operation::SendFriendtalk => {
            let mut kakao = KakaoOptions::new(required_param(host, "pfId", item)?)
                .with_disable_sms(param_bool(host, "disableSms", item, false));
            if let Some(image_id) = image_for(client, host, item, FileKind::Kakao)? {
                kakao = kakao.with_image(image_id);
            }
            MessageDraft::friendtalk(&from, required_text(text)?, kakao)
        }
    };
    Ok(draft)
}

fn required_text(text: Option<String>) -> Result<String, ProviderError> {
    text.ok_or_else(|| ProviderError::validation("parameter `text` is required"))
}

/// `imageId` when given, otherwise an upload of `imageBase64`.
fn image_for<H: NodeHost + ?Sized>(
    client: &SolapiClient<'_, H>,
    host: &H,
    item: usize,
    kind: FileKind,
) -> Result<Option<String>, ProviderError> {
    if let Some(image_id) = param_string(host, "imageId", item) {
        return Ok(Some(image_id));
    }
    let Some(raw) = param_string(host, "imageBase64", item) else {
        return Ok(None);
    };
    let encoded = strip_data_url(&raw);
    STANDARD
        .decode(encoded)
        .map_err(|err| ProviderError::validation(format!("imageBase64 is not valid base64: {err}")))?;
    let name = param_string(host, "imageName", item);
    let file_id = client.upload_file(encoded, kind, name.as_deref())?;
    info!(%file_id, "uploaded image");
    Ok(Some(file_id))
}

/// Payload of a `data:` URL, or the input unchanged.
fn strip_data_url(raw: &str) -> &str {
    match raw.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => raw,
    }
}
