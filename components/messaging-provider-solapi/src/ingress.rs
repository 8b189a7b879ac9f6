use provider_common::NodeItem;
use serde_json::Value;

/// Items for an inbound webhook body: one per array element, one for an
/// object, none for anything else.
pub fn items_from_value(body: Value) -> Vec<NodeItem> {
    match body {
        Value::Array(entries) => entries.into_iter().map(NodeItem::new).collect(),
        Value::Object(map) => vec![NodeItem::new(Value::Object(map))],
        _ => Vec::new(),
    }
}

/// Raw request body variant; bytes that are not JSON yield no items.
pub fn items_from_body(body: &[u8]) -> Vec<NodeItem> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => items_from_value(value),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring non-json webhook body");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_yields_one_item_per_element() {
        let items = items_from_value(json!([{"a": 1}, {"b": 2}]));
        assert_eq!(
            items,
            vec![NodeItem::new(json!({"a": 1})), NodeItem::new(json!({"b": 2}))]
        );
    }

    #[test]
    fn object_yields_single_item() {
        assert_eq!(items_from_value(json!({"a": 1})), vec![NodeItem::new(json!({"a": 1}))]);
        assert_eq!(items_from_value(json!({})).len(), 1);
    }

    #[test]
    fn other_shapes_yield_nothing() {
        assert!(items_from_value(Value::Null).is_empty());
        assert!(items_from_value(json!("text")).is_empty());
        assert!(items_from_value(json!(42)).is_empty());
        assert!(items_from_value(json!([])).is_empty());
    }

    #[test]
    fn raw_bodies_are_parsed_leniently() {
        assert_eq!(items_from_body(br#"[{"messageId":"M1"}]"#).len(), 1);
        assert!(items_from_body(b"").is_empty());
        assert!(items_from_body(b"not json").is_empty());
    }
}
