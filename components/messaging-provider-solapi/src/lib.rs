//! Solapi messaging node for a workflow-automation host.
//!
//! [`SolapiNode`] sends SMS/LMS/MMS and Kakao AlimTalk/FriendTalk messages and
//! populates dynamic dropdowns. [`SolapiTrigger`] keeps one outgoing webhook
//! (delivery reports or a commerce hook binding) registered with Solapi while
//! the workflow is active and turns inbound callbacks into items.

mod assemble;
mod auth;
mod client;
mod config;
mod describe;
mod ingress;
mod lifecycle;
mod ops;
mod trigger;

pub use assemble::{
    KakaoOptions, MessageDraft, MessageType, OutboundMessage, build_send_many, normalize_number,
    parse_recipients,
};
pub use auth::{ApiKeyCredentials, Auth, authorization_header, authorization_header_at, sign};
pub use client::{
    CommerceHook, FileKind, HookWebhook, KakaoChannel, KakaoTemplate, OutgoingWebhook, SolapiClient,
    WebhookRemote,
};
pub use config::{AuthMode, NodeConfig};
pub use describe::{CredentialDescriptor, NodeDescription, OperationDescriptor, describe};
pub use ingress::{items_from_body, items_from_value};
pub use lifecycle::{EventKind, RegistrationState, Subscription, TeardownReport, WebhookLifecycle};
pub use ops::{Operation, SolapiNode};
pub use trigger::{DEFAULT_WEBHOOK, SolapiTrigger};

pub const PROVIDER_ID: &str = "solapi";
pub const DEFAULT_API_BASE: &str = "https://api.solapi.com";
pub const API_KEY_CREDENTIAL: &str = "solapiApi";
pub const OAUTH2_CREDENTIAL: &str = "solapiOAuth2Api";
/// Name attached to every registration this node makes.
pub const WEBHOOK_NAME: &str = "n8n";
