//! Registration of outgoing webhooks with Solapi.
//!
//! The cached [`RegistrationState`] is only trusted when its URL equals the
//! callback URL computed right now; anything else is reconciled against the
//! remote listing. Verification and teardown never fail, creation does.

use provider_common::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::client::WebhookRemote;

const STATE_KEYS: [&str; 3] = ["webhookId", "webhookUrl", "commerceHookId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    SingleReport,
    GroupReport,
    CommerceHook,
}

impl EventKind {
    /// Remote `eventId` of report subscriptions; commerce bindings have none.
    pub fn event_id(&self) -> Option<&'static str> {
        match self {
            EventKind::SingleReport => Some("SINGLE-REPORT"),
            EventKind::GroupReport => Some("GROUP-REPORT"),
            EventKind::CommerceHook => None,
        }
    }

    pub fn from_param(value: &str) -> Result<Self, ProviderError> {
        match value.trim() {
            "singleReport" | "SINGLE-REPORT" => Ok(EventKind::SingleReport),
            "groupReport" | "GROUP-REPORT" => Ok(EventKind::GroupReport),
            "commerceHook" => Ok(EventKind::CommerceHook),
            other => Err(ProviderError::config(format!("unsupported event `{other}`"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SingleReport => "singleReport",
            EventKind::GroupReport => "groupReport",
            EventKind::CommerceHook => "commerceHook",
        }
    }
}

/// Locally cached view of what this node instance registered remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commerce_hook_id: Option<String>,
}

impl RegistrationState {
    /// Read the state out of node static data. Non-string entries are ignored.
    pub fn load(data: &Map<String, Value>) -> Self {
        let field = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            webhook_id: field("webhookId"),
            webhook_url: field("webhookUrl"),
            commerce_hook_id: field("commerceHookId"),
        }
    }

    /// Write the state back, removing keys whose field is unset.
    pub fn store(&self, data: &mut Map<String, Value>) {
        let values = [&self.webhook_id, &self.webhook_url, &self.commerce_hook_id];
        for (key, value) in STATE_KEYS.into_iter().zip(values) {
            match value {
                Some(value) => {
                    data.insert(key.to_string(), Value::String(value.clone()));
                }
                None => {
                    data.remove(key);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.webhook_id.is_none() && self.webhook_url.is_none() && self.commerce_hook_id.is_none()
    }

    fn url_is(&self, callback_url: &str) -> bool {
        self.webhook_url.as_deref() == Some(callback_url)
    }
}

/// What the node wants registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub kind: EventKind,
    pub callback_url: String,
    /// Configured commerce hook; only meaningful for [`EventKind::CommerceHook`].
    pub hook_id: Option<String>,
}

impl Subscription {
    pub fn report(kind: EventKind, callback_url: impl Into<String>) -> Self {
        Self {
            kind,
            callback_url: callback_url.into(),
            hook_id: None,
        }
    }

    pub fn commerce(callback_url: impl Into<String>, hook_id: Option<String>) -> Self {
        Self {
            kind: EventKind::CommerceHook,
            callback_url: callback_url.into(),
            hook_id,
        }
    }

    fn hook_id(&self) -> Option<&str> {
        self.hook_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Outcome of the best-effort teardown calls. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownReport {
    pub commerce_hook_disconnected: bool,
    pub webhook_deleted: bool,
    pub failures: Vec<String>,
}

pub struct WebhookLifecycle<'r, R: WebhookRemote + ?Sized> {
    remote: &'r R,
}

impl<'r, R: WebhookRemote + ?Sized> WebhookLifecycle<'r, R> {
    pub fn new(remote: &'r R) -> Self {
        Self { remote }
    }

    /// Whether a registration for `subscription` is live. Adopts a matching
    /// remote registration into `state`. Remote failures read as "not found".
    pub fn exists(&self, subscription: &Subscription, state: &mut RegistrationState) -> bool {
        match subscription.kind {
            EventKind::CommerceHook => self.commerce_exists(subscription, state),
            EventKind::SingleReport | EventKind::GroupReport => {
                self.report_exists(subscription, state)
            }
        }
    }

    fn report_exists(&self, subscription: &Subscription, state: &mut RegistrationState) -> bool {
        let callback_url = subscription.callback_url.as_str();
        if state.webhook_id.is_some() && state.url_is(callback_url) {
            debug!(event = subscription.kind.as_str(), "cached webhook matches callback url");
            return true;
        }
        let webhooks = match self.remote.list_outgoing_webhooks() {
            Ok(webhooks) => webhooks,
            Err(err) => {
                debug!(error = %err, "listing outgoing webhooks failed");
                return false;
            }
        };
        let event_id = subscription.kind.event_id();
        let found = webhooks.into_iter().find(|webhook| {
            let listed_event = webhook
                .event_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty());
            webhook.url.as_deref() == Some(callback_url)
                && (listed_event.is_none() || listed_event == event_id)
        });
        match found {
            Some(webhook) => {
                debug!(webhook_id = %webhook.webhook_id, "adopting remote webhook");
                state.webhook_id = Some(webhook.webhook_id);
                state.webhook_url = Some(callback_url.to_string());
                true
            }
            None => false,
        }
    }

    fn commerce_exists(&self, subscription: &Subscription, state: &mut RegistrationState) -> bool {
        let Some(hook_id) = subscription.hook_id() else {
            return false;
        };
        let callback_url = subscription.callback_url.as_str();
        if state.commerce_hook_id.as_deref() == Some(hook_id) && state.url_is(callback_url) {
            debug!(hook_id, "cached commerce hook binding matches callback url");
            return true;
        }

        let bound = match self.remote.get_commerce_hook(hook_id) {
            Ok(hook) => hook.callback_url() == Some(callback_url),
            Err(err) => {
                debug!(hook_id, error = %err, "commerce hook lookup failed");
                false
            }
        };
        let bound = bound
            || match self.remote.list_commerce_hooks() {
                Ok(hooks) => hooks
                    .iter()
                    .any(|hook| hook.hook_id == hook_id && hook.callback_url() == Some(callback_url)),
                Err(err) => {
                    debug!(error = %err, "listing commerce hooks failed");
                    false
                }
            };
        if bound {
            debug!(hook_id, "adopting commerce hook binding");
            state.commerce_hook_id = Some(hook_id.to_string());
            state.webhook_url = Some(callback_url.to_string());
        }
        bound
    }

    /// Register `subscription` and cache what was created. Returns the id of
    /// the remote registration (the hook id for commerce bindings).
    pub fn create(
        &self,
        subscription: &Subscription,
        is_temporary: bool,
        state: &mut RegistrationState,
    ) -> Result<String, ProviderError> {
        let callback_url = subscription.callback_url.as_str();
        match subscription.kind.event_id() {
            Some(event_id) => {
                let webhook_id = self
                    .remote
                    .create_outgoing_webhook(event_id, callback_url, is_temporary)
                    .map_err(|err| {
                        ProviderError::activation(format!(
                            "could not register {event_id} webhook: {err}"
                        ))
                    })?;
                info!(%webhook_id, event_id, is_temporary, "registered outgoing webhook");
                state.webhook_id = Some(webhook_id.clone());
                state.webhook_url = Some(callback_url.to_string());
                Ok(webhook_id)
            }
            None => {
                let hook_id = subscription.hook_id().ok_or_else(|| {
                    ProviderError::config("a commerce hook id is required for commerce events")
                })?;
                self.remote
                    .connect_commerce_hook(hook_id, callback_url, is_temporary)
                    .map_err(|err| {
                        ProviderError::activation(format!(
                            "could not connect commerce hook {hook_id}: {err}"
                        ))
                    })?;
                info!(hook_id, is_temporary, "connected commerce hook");
                state.commerce_hook_id = Some(hook_id.to_string());
                state.webhook_url = Some(callback_url.to_string());
                Ok(hook_id.to_string())
            }
        }
    }

    /// Best-effort removal of everything cached in `state`. Both calls are
    /// attempted; failures are logged and reported, never returned.
    ///
    /// The cached ids are left in place.
    pub fn teardown(&self, state: &RegistrationState) -> TeardownReport {
        let mut report = TeardownReport::default();
        if let Some(hook_id) = state.commerce_hook_id.as_deref() {
            match self.remote.disconnect_commerce_hook(hook_id) {
                Ok(()) => report.commerce_hook_disconnected = true,
                Err(err) => {
                    warn!(hook_id, error = %err, "failed to disconnect commerce hook");
                    report.failures.push(format!("disconnect {hook_id}: {err}"));
                }
            }
        }
        if let Some(webhook_id) = state.webhook_id.as_deref() {
            match self.remote.delete_outgoing_webhook(webhook_id) {
                Ok(()) => report.webhook_deleted = true,
                Err(err) => {
                    warn!(webhook_id, error = %err, "failed to delete outgoing webhook");
                    report.failures.push(format!("delete {webhook_id}: {err}"));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CommerceHook, HookWebhook, OutgoingWebhook};
    use serde_json::json;
    use std::cell::RefCell;

    const CALLBACK: &str = "https://host.test/webhook/abc";

    #[derive(Default)]
    struct FakeRemote {
        webhooks: Vec<OutgoingWebhook>,
        hooks: Vec<CommerceHook>,
        fail: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeRemote {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> Result<(), ProviderError> {
            self.calls.borrow_mut().push(call);
            if self.fail {
                Err(ProviderError::remote(500, "boom"))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl WebhookRemote for FakeRemote {
        fn list_outgoing_webhooks(&self) -> Result<Vec<OutgoingWebhook>, ProviderError> {
            self.record("list_webhooks".into())?;
            Ok(self.webhooks.clone())
        }

        fn create_outgoing_webhook(
            &self,
            event_id: &str,
            _url: &str,
            is_temporary: bool,
        ) -> Result<String, ProviderError> {
            self.record(format!("create {event_id} {is_temporary}"))?;
            Ok("WH-NEW".into())
        }

        fn delete_outgoing_webhook(&self, webhook_id: &str) -> Result<(), ProviderError> {
            self.record(format!("delete {webhook_id}"))
        }

        fn get_commerce_hook(&self, hook_id: &str) -> Result<CommerceHook, ProviderError> {
            self.record(format!("get {hook_id}"))?;
            self.hooks
                .iter()
                .find(|hook| hook.hook_id == hook_id)
                .cloned()
                .ok_or_else(|| ProviderError::remote(404, "not found"))
        }

        fn list_commerce_hooks(&self) -> Result<Vec<CommerceHook>, ProviderError> {
            self.record("list_hooks".into())?;
            Ok(self.hooks.clone())
        }

        fn connect_commerce_hook(
            &self,
            hook_id: &str,
            _webhook_url: &str,
            is_temporary: bool,
        ) -> Result<(), ProviderError> {
            self.record(format!("connect {hook_id} {is_temporary}"))
        }

        fn disconnect_commerce_hook(&self, hook_id: &str) -> Result<(), ProviderError> {
            self.record(format!("disconnect {hook_id}"))
        }
    }

    fn webhook(id: &str, url: &str, event_id: Option<&str>) -> OutgoingWebhook {
        OutgoingWebhook {
            webhook_id: id.into(),
            url: Some(url.into()),
            event_id: event_id.map(str::to_string),
            name: None,
        }
    }

    fn hook(id: &str, url: &str) -> CommerceHook {
        CommerceHook {
            hook_id: id.into(),
            webhook: Some(HookWebhook {
                url: Some(url.into()),
            }),
            ..CommerceHook::default()
        }
    }

    fn cached(webhook_id: &str, url: &str) -> RegistrationState {
        RegistrationState {
            webhook_id: Some(webhook_id.into()),
            webhook_url: Some(url.into()),
            commerce_hook_id: None,
        }
    }

    #[test]
    fn cached_report_registration_skips_remote() {
        let remote = FakeRemote::failing();
        let mut state = cached("WH1", CALLBACK);
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn stale_url_reconciles_against_listing() {
        let remote = FakeRemote {
            webhooks: vec![
                webhook("WH-OTHER", "https://host.test/other", Some("SINGLE-REPORT")),
                webhook("WH-GROUP", CALLBACK, Some("GROUP-REPORT")),
                webhook("WH-MATCH", CALLBACK, Some("SINGLE-REPORT")),
            ],
            ..FakeRemote::default()
        };
        let mut state = cached("WH-OLD", "https://old.test/webhook/abc");
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["list_webhooks"]);
        assert_eq!(state, cached("WH-MATCH", CALLBACK));
    }

    #[test]
    fn listing_entry_without_event_id_matches_any_report_kind() {
        let remote = FakeRemote {
            webhooks: vec![webhook("WH-ANY", CALLBACK, None)],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::GroupReport, CALLBACK);
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(state.webhook_id.as_deref(), Some("WH-ANY"));
    }

    #[test]
    fn blank_listing_event_id_counts_as_absent() {
        let remote = FakeRemote {
            webhooks: vec![webhook("WH-BLANK", CALLBACK, Some(" "))],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(state.webhook_id.as_deref(), Some("WH-BLANK"));
    }

    #[test]
    fn url_must_match_exactly() {
        let remote = FakeRemote {
            webhooks: vec![webhook("WH1", "https://host.test/webhook/abc/", None)],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        assert!(!WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert!(state.is_empty());
    }

    #[test]
    fn listing_failure_reads_as_missing() {
        let remote = FakeRemote::failing();
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        assert!(!WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["list_webhooks"]);
    }

    #[test]
    fn create_then_exists_uses_fast_path() {
        let remote = FakeRemote::default();
        let lifecycle = WebhookLifecycle::new(&remote);
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::GroupReport, CALLBACK);
        let id = lifecycle.create(&sub, true, &mut state).unwrap();
        assert_eq!(id, "WH-NEW");
        assert!(lifecycle.exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["create GROUP-REPORT true"]);
    }

    #[test]
    fn create_failure_is_an_activation_error() {
        let remote = FakeRemote::failing();
        let mut state = RegistrationState::default();
        let sub = Subscription::report(EventKind::SingleReport, CALLBACK);
        let err = WebhookLifecycle::new(&remote)
            .create(&sub, false, &mut state)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Activation(_)));
        assert!(err.to_string().contains("remote returned status 500: boom"));
        assert!(state.is_empty());
    }

    #[test]
    fn commerce_without_hook_id_never_calls_remote() {
        let remote = FakeRemote::default();
        let lifecycle = WebhookLifecycle::new(&remote);
        let mut state = RegistrationState::default();
        let sub = Subscription::commerce(CALLBACK, Some("  ".into()));
        assert!(!lifecycle.exists(&sub, &mut state));
        let err = lifecycle.create(&sub, false, &mut state).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn commerce_direct_lookup_adopts_binding() {
        let remote = FakeRemote {
            hooks: vec![hook("H1", CALLBACK)],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState::default();
        let sub = Subscription::commerce(CALLBACK, Some("H1".into()));
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["get H1"]);
        assert_eq!(state.commerce_hook_id.as_deref(), Some("H1"));
        assert_eq!(state.webhook_url.as_deref(), Some(CALLBACK));
    }

    #[test]
    fn commerce_mismatch_falls_back_to_listing() {
        let remote = FakeRemote {
            hooks: vec![hook("H1", "https://host.test/elsewhere")],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState::default();
        let sub = Subscription::commerce(CALLBACK, Some("H1".into()));
        assert!(!WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["get H1", "list_hooks"]);
    }

    #[test]
    fn commerce_listing_match_by_flat_url() {
        let remote = FakeRemote {
            hooks: vec![CommerceHook {
                hook_id: "H2".into(),
                webhook_url: Some(CALLBACK.into()),
                ..CommerceHook::default()
            }],
            ..FakeRemote::default()
        };
        let mut state = RegistrationState {
            commerce_hook_id: Some("H2".into()),
            webhook_url: Some("https://old.test".into()),
            webhook_id: None,
        };
        let sub = Subscription::commerce(CALLBACK, Some("H2".into()));
        assert!(WebhookLifecycle::new(&remote).exists(&sub, &mut state));
        assert_eq!(state.webhook_url.as_deref(), Some(CALLBACK));
    }

    #[test]
    fn commerce_create_connects_and_caches() {
        let remote = FakeRemote::default();
        let lifecycle = WebhookLifecycle::new(&remote);
        let mut state = RegistrationState::default();
        let sub = Subscription::commerce(CALLBACK, Some("H9".into()));
        assert_eq!(lifecycle.create(&sub, false, &mut state).unwrap(), "H9");
        assert!(lifecycle.exists(&sub, &mut state));
        assert_eq!(remote.calls(), vec!["connect H9 false"]);
    }

    #[test]
    fn teardown_attempts_both_calls_despite_failures() {
        let remote = FakeRemote::failing();
        let state = RegistrationState {
            webhook_id: Some("WH1".into()),
            webhook_url: Some(CALLBACK.into()),
            commerce_hook_id: Some("H1".into()),
        };
        let report = WebhookLifecycle::new(&remote).teardown(&state);
        assert_eq!(remote.calls(), vec!["disconnect H1", "delete WH1"]);
        assert!(!report.webhook_deleted);
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn teardown_of_empty_state_is_a_no_op() {
        let remote = FakeRemote::default();
        let report = WebhookLifecycle::new(&remote).teardown(&RegistrationState::default());
        assert_eq!(report, TeardownReport::default());
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn state_round_trips_through_static_data() {
        let mut data = Map::new();
        data.insert("unrelated".into(), json!(1));
        let state = cached("WH1", CALLBACK);
        state.store(&mut data);
        assert_eq!(RegistrationState::load(&data), state);

        RegistrationState::default().store(&mut data);
        assert!(!data.contains_key("webhookId"));
        assert_eq!(data.get("unrelated"), Some(&json!(1)));
    }

    #[test]
    fn parses_event_parameter() {
        assert_eq!(EventKind::from_param("groupReport").unwrap(), EventKind::GroupReport);
        assert_eq!(EventKind::from_param("commerceHook").unwrap().event_id(), None);
        assert!(EventKind::from_param("nope").is_err());
    }
}
