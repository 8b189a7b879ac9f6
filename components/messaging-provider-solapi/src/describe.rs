use provider_common::{NodeItem, OptionEntry};
use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use crate::config::AuthMode;
use crate::lifecycle::EventKind;
use crate::ops::Operation;
use crate::{DEFAULT_API_BASE, PROVIDER_ID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDescriptor {
    pub resource: &'static str,
    pub operation: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescriptor {
    pub name: &'static str,
    pub authentication: AuthMode,
    /// Credential fields that must never be logged.
    pub secret_fields: Vec<&'static str>,
}

/// Static description of both nodes, for host registration and tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    pub provider: &'static str,
    pub default_api_base: &'static str,
    pub credentials: Vec<CredentialDescriptor>,
    pub operations: Vec<OperationDescriptor>,
    pub options_loaders: Vec<&'static str>,
    pub trigger_events: Vec<&'static str>,
    /// JSON schema of one output item.
    pub item_schema: Value,
    /// JSON schema of one dropdown option.
    pub option_schema: Value,
}

const OPERATIONS: &[(&str, Operation, &str)] = &[
    ("message", Operation::SendSms, "Send an SMS (up to 90 bytes)"),
    ("message", Operation::SendLms, "Send an LMS with optional subject"),
    ("message", Operation::SendMms, "Send an MMS with an image"),
    ("kakao", Operation::SendAlimtalk, "Send a Kakao AlimTalk template message"),
    ("kakao", Operation::SendFriendtalk, "Send a Kakao FriendTalk message"),
];

pub fn describe() -> NodeDescription {
    NodeDescription {
        provider: PROVIDER_ID,
        default_api_base: DEFAULT_API_BASE,
        credentials: [AuthMode::ApiKey, AuthMode::OAuth2]
            .into_iter()
            .map(|mode| CredentialDescriptor {
                name: mode.credential_name(),
                authentication: mode,
                secret_fields: match mode {
                    AuthMode::ApiKey => vec!["apiSecret"],
                    AuthMode::OAuth2 => vec!["accessToken", "refreshToken", "clientSecret"],
                },
            })
            .collect(),
        operations: OPERATIONS
            .iter()
            .map(|&(resource, operation, description)| OperationDescriptor {
                resource,
                operation: operation.as_str(),
                description,
            })
            .collect(),
        options_loaders: vec![
            "getSenderNumbers",
            "getKakaoChannels",
            "getKakaoTemplates",
            "getCommerceHooks",
        ],
        trigger_events: [
            EventKind::SingleReport,
            EventKind::GroupReport,
            EventKind::CommerceHook,
        ]
        .iter()
        .map(EventKind::as_str)
        .collect(),
        item_schema: serde_json::to_value(schema_for!(NodeItem)).unwrap_or_default(),
        option_schema: serde_json::to_value(schema_for!(OptionEntry)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn described_operations_resolve() {
        let description = describe();
        assert_eq!(description.operations.len(), 5);
        for op in &description.operations {
            assert!(Operation::from_params(op.resource, op.operation).is_ok());
        }
    }

    #[test]
    fn described_events_parse() {
        for event in describe().trigger_events {
            assert_eq!(EventKind::from_param(event).unwrap().as_str(), event);
        }
    }

    #[test]
    fn serializes_credentials_camel_case() {
        let value = serde_json::to_value(describe()).unwrap();
        assert_eq!(value["credentials"][0]["name"], "solapiApi");
        assert_eq!(value["credentials"][1]["authentication"], "oAuth2");
        assert_eq!(value["defaultApiBase"], "https://api.solapi.com");
    }

    #[test]
    fn schemas_name_item_fields() {
        let description = describe();
        assert!(description.item_schema["properties"].get("json").is_some());
        assert!(description.option_schema["properties"].get("value").is_some());
    }
}
