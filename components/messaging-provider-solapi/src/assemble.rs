//! Shapes user fields into the `send-many/detail` request body.

use std::collections::BTreeMap;

use provider_common::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Sms,
    Lms,
    Mms,
    /// Kakao AlimTalk.
    Ata,
    /// Kakao FriendTalk, text only.
    Cta,
    /// Kakao FriendTalk with an image.
    Cti,
}

impl MessageType {
    pub fn is_kakao(&self) -> bool {
        matches!(self, MessageType::Ata | MessageType::Cta | MessageType::Cti)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoOptions {
    pub pf_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub disable_sms: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl KakaoOptions {
    pub fn new(pf_id: impl Into<String>) -> Self {
        Self {
            pf_id: pf_id.into(),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Template variables from a JSON object. Keys are wrapped as `#{key}`
    /// unless already wrapped; non-string values are rendered as text.
    pub fn with_variables(mut self, variables: &Value) -> Result<Self, ProviderError> {
        let map = match variables {
            Value::Null => return Ok(self),
            Value::Object(map) => map,
            _ => return Err(ProviderError::validation("variables must be an object")),
        };
        for (key, value) in map {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let key = if key.starts_with("#{") && key.ends_with('}') {
                key.to_string()
            } else {
                format!("#{{{key}}}")
            };
            let value = match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            self.variables.insert(key, value);
        }
        Ok(self)
    }

    pub fn with_disable_sms(mut self, disable_sms: bool) -> Self {
        self.disable_sms = disable_sms;
        self
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }
}

/// One entry of the `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub to: String,
    pub from: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kakao_options: Option<KakaoOptions>,
}

/// Everything about a message except its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub message_type: MessageType,
    pub from: String,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub image_id: Option<String>,
    pub kakao: Option<KakaoOptions>,
}

impl MessageDraft {
    fn new(message_type: MessageType, from: &str) -> Self {
        Self {
            message_type,
            from: normalize_number(from),
            text: None,
            subject: None,
            image_id: None,
            kakao: None,
        }
    }

    pub fn sms(from: &str, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(MessageType::Sms, from)
        }
    }

    pub fn lms(from: &str, text: impl Into<String>, subject: Option<String>) -> Self {
        Self {
            text: Some(text.into()),
            subject,
            ..Self::new(MessageType::Lms, from)
        }
    }

    pub fn mms(
        from: &str,
        text: impl Into<String>,
        subject: Option<String>,
        image_id: impl Into<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            subject,
            image_id: Some(image_id.into()),
            ..Self::new(MessageType::Mms, from)
        }
    }

    /// AlimTalk; `text` is the SMS fallback body, if any.
    pub fn alimtalk(from: &str, kakao: KakaoOptions, text: Option<String>) -> Self {
        Self {
            text,
            kakao: Some(kakao),
            ..Self::new(MessageType::Ata, from)
        }
    }

    /// FriendTalk; an image on `kakao` makes it a `CTI` message.
    pub fn friendtalk(from: &str, text: impl Into<String>, kakao: KakaoOptions) -> Self {
        let message_type = if kakao.image_id.is_some() {
            MessageType::Cti
        } else {
            MessageType::Cta
        };
        Self {
            text: Some(text.into()),
            kakao: Some(kakao),
            ..Self::new(message_type, from)
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.from.is_empty() {
            return Err(ProviderError::validation("sender number is required"));
        }
        let has_text = self.text.as_deref().is_some_and(|text| !text.trim().is_empty());
        if self.message_type != MessageType::Ata && !has_text {
            return Err(ProviderError::validation("message text is required"));
        }
        if self.message_type == MessageType::Mms && self.image_id.is_none() {
            return Err(ProviderError::validation("MMS requires an image"));
        }
        if self.message_type.is_kakao() {
            let kakao = self
                .kakao
                .as_ref()
                .ok_or_else(|| ProviderError::validation("kakao options are required"))?;
            if kakao.pf_id.trim().is_empty() {
                return Err(ProviderError::validation("kakao channel (pfId) is required"));
            }
            if self.message_type == MessageType::Ata
                && kakao.template_id.as_deref().is_none_or(|id| id.trim().is_empty())
            {
                return Err(ProviderError::validation("AlimTalk requires a template id"));
            }
            if self.message_type == MessageType::Cti && kakao.image_id.is_none() {
                return Err(ProviderError::validation("FriendTalk image id is missing"));
            }
        }
        Ok(())
    }

    pub fn to_message(&self, to: impl Into<String>) -> OutboundMessage {
        OutboundMessage {
            to: to.into(),
            from: self.from.clone(),
            message_type: self.message_type,
            text: self.text.clone(),
            subject: self.subject.clone().filter(|subject| !subject.trim().is_empty()),
            image_id: self.image_id.clone(),
            kakao_options: self.kakao.clone(),
        }
    }
}

/// Strip the separators people type into phone numbers.
pub fn normalize_number(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !(ch.is_whitespace() || matches!(ch, '-' | '.' | '(' | ')')))
        .collect()
}

/// Split a recipient field on commas, semicolons and line breaks. Entries are
/// normalized, empties dropped and duplicates removed keeping first-seen order.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for entry in raw.split([',', ';', '\n', '\r']) {
        let number = normalize_number(entry);
        if !number.is_empty() && !recipients.contains(&number) {
            recipients.push(number);
        }
    }
    recipients
}

/// `{"messages": [...]}` with one message per recipient in `to`.
pub fn build_send_many(draft: &MessageDraft, to: &str) -> Result<Value, ProviderError> {
    draft.validate()?;
    let recipients = parse_recipients(to);
    if recipients.is_empty() {
        return Err(ProviderError::validation("at least one recipient is required"));
    }
    let messages: Vec<OutboundMessage> = recipients
        .into_iter()
        .map(|recipient| draft.to_message(recipient))
        .collect();
    Ok(json!({ "messages": messages }))
}
