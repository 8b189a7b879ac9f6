use messaging_provider_solapi::SolapiNode;
use provider_common::{HttpMethod, OptionEntry, ProviderError};
use provider_tests::MockHost;
use serde_json::json;

#[test]
fn sender_numbers_accept_plain_arrays() {
    let host = MockHost::new().respond(
        HttpMethod::Get,
        "/senderid/v1/numbers/active",
        200,
        json!(["0212345678", "01098765432"]),
    );
    let options = SolapiNode::load_options(&host, "getSenderNumbers").unwrap();
    assert_eq!(
        options,
        vec![
            OptionEntry::new("0212345678", "0212345678"),
            OptionEntry::new("01098765432", "01098765432"),
        ]
    );
}

#[test]
fn kakao_channels_prefer_search_id_for_labels() {
    let host = MockHost::new().respond(
        HttpMethod::Get,
        "/kakao/v2/channels",
        200,
        json!({"channelList": [
            {"channelId": "KA01PF1", "searchId": "@shop"},
            {"channelId": "KA01PF2"}
        ]}),
    );
    let options = SolapiNode::load_kakao_channels(&host).unwrap();
    assert_eq!(
        options,
        vec![
            OptionEntry::new("@shop", "KA01PF1"),
            OptionEntry::new("KA01PF2", "KA01PF2"),
        ]
    );
}

#[test]
fn templates_are_filtered_to_approved_for_the_channel() {
    let host = MockHost::new()
        .param("pfId", "KA01PF1")
        .respond(
            HttpMethod::Get,
            "/kakao/v2/templates",
            200,
            json!({"templateList": [
                {"templateId": "TP1", "name": "Order shipped", "status": "APPROVED"},
                {"templateId": "TP2", "name": "Draft", "status": "PENDING"},
                {"templateId": "TP3"}
            ]}),
        );
    let options = SolapiNode::load_options(&host, "getKakaoTemplates").unwrap();
    assert_eq!(
        options,
        vec![
            OptionEntry::new("Order shipped", "TP1"),
            OptionEntry::new("TP3", "TP3"),
        ]
    );
    let call = &host.calls()[0];
    assert_eq!(call.query("channelId"), Some("KA01PF1"));
    assert_eq!(call.query("status"), Some("APPROVED"));
}

#[test]
fn templates_without_channel_are_empty() {
    let host = MockHost::new();
    assert!(SolapiNode::load_kakao_templates(&host).unwrap().is_empty());
    assert!(host.calls().is_empty());
}

#[test]
fn commerce_hooks_are_listed_by_name() {
    let host = MockHost::new().respond(
        HttpMethod::Get,
        "/commerce/v1/hooks",
        200,
        json!({"list": [
            {"hookId": "HOOK1", "name": "Orders"},
            {"hookId": "HOOK2"}
        ]}),
    );
    let options = SolapiNode::load_commerce_hooks(&host).unwrap();
    assert_eq!(
        options,
        vec![
            OptionEntry::new("Orders", "HOOK1"),
            OptionEntry::new("HOOK2", "HOOK2"),
        ]
    );
}

#[test]
fn lookup_errors_propagate() {
    let host = MockHost::new().fail_transport(HttpMethod::Get, "/kakao/v2/channels");
    let err = SolapiNode::load_kakao_channels(&host).unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[test]
fn unknown_loader_is_rejected() {
    let err = SolapiNode::load_options(&MockHost::new(), "getEverything").unwrap_err();
    assert_eq!(err, ProviderError::validation("unknown options loader `getEverything`"));
}
