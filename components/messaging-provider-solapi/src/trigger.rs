//! The trigger node: webhook registration hooks plus inbound delivery.

use provider_common::helpers::param_string;
use provider_common::{NodeHost, NodeItem, ProviderError};
use tracing::warn;

use crate::client::SolapiClient;
use crate::ingress::items_from_body;
use crate::lifecycle::{EventKind, RegistrationState, Subscription, TeardownReport, WebhookLifecycle};

/// Name of the webhook the host exposes for this node.
pub const DEFAULT_WEBHOOK: &str = "default";

pub struct SolapiTrigger;

impl SolapiTrigger {
    /// What the node parameters ask to be registered at the current callback URL.
    pub fn subscription<H: NodeHost + ?Sized>(host: &H) -> Result<Subscription, ProviderError> {
        let event = param_string(host, "event", 0).unwrap_or_else(|| "singleReport".into());
        let kind = EventKind::from_param(&event)?;
        let callback_url = host
            .node_webhook_url(DEFAULT_WEBHOOK)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ProviderError::config("the host did not provide a webhook url"))?;
        Ok(match kind {
            EventKind::CommerceHook => {
                Subscription::commerce(callback_url, param_string(host, "hookId", 0))
            }
            report => Subscription::report(report, callback_url),
        })
    }

    pub fn check_exists<H: NodeHost + ?Sized>(host: &mut H) -> Result<bool, ProviderError> {
        let mut state = RegistrationState::load(host.workflow_static_data());
        let exists = {
            let host: &H = host;
            let subscription = Self::subscription(host)?;
            let client = SolapiClient::from_host(host)?;
            WebhookLifecycle::new(&client).exists(&subscription, &mut state)
        };
        state.store(host.workflow_static_data());
        Ok(exists)
    }

    /// Register the subscription. Temporary when the host runs a manual test.
    pub fn create<H: NodeHost + ?Sized>(host: &mut H) -> Result<bool, ProviderError> {
        let mut state = RegistrationState::load(host.workflow_static_data());
        {
            let host: &H = host;
            let subscription = Self::subscription(host)?;
            let client = SolapiClient::from_host(host)?;
            let is_temporary = host.execution_mode().is_temporary();
            WebhookLifecycle::new(&client).create(&subscription, is_temporary, &mut state)?;
        }
        state.store(host.workflow_static_data());
        Ok(true)
    }

    /// Best-effort removal of the cached registrations. Never fails.
    pub fn delete<H: NodeHost + ?Sized>(host: &mut H) -> TeardownReport {
        let state = RegistrationState::load(host.workflow_static_data());
        let host: &H = host;
        match SolapiClient::from_host(host) {
            Ok(client) => WebhookLifecycle::new(&client).teardown(&state),
            Err(err) => {
                warn!(error = %err, "skipping webhook teardown");
                TeardownReport {
                    failures: vec![err.to_string()],
                    ..TeardownReport::default()
                }
            }
        }
    }

    pub fn webhook(body: &[u8]) -> Vec<NodeItem> {
        items_from_body(body)
    }
}
