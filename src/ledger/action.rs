//! Tagged actions accepted by a ledger.

use crate::error::{Result, StoreError};
use crate::types::ItemId;
use serde::{Deserialize, Serialize};

/// Tags accepted on the wire, aliases included.
const KNOWN_TAGS: &[&str] = &["LOAD", "GET", "ADD", "REMOVE", "FLUSH", "UPLOAD"];

/// One of the four ledger operations.
///
/// Encoded as `{"type": "ADD", "value": {"productId": 1, "quantity": 2}}`.
/// `GET` and `UPLOAD` are accepted as older names for `LOAD` and `FLUSH`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Read the persisted copy (once).
    #[serde(alias = "GET")]
    Load,

    /// Add `quantity` units of an item.
    Add {
        #[serde(rename = "productId")]
        item_id: ItemId,
        quantity: u32,
    },

    /// Take one unit of an item away.
    Remove {
        #[serde(rename = "productId")]
        item_id: ItemId,
    },

    /// Persist pending changes.
    #[serde(alias = "UPLOAD")]
    Flush,
}

impl Action {
    pub fn add(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Action::Add {
            item_id: item_id.into(),
            quantity,
        }
    }

    pub fn remove(item_id: impl Into<ItemId>) -> Self {
        Action::Remove {
            item_id: item_id.into(),
        }
    }

    /// Wire name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Load => "LOAD",
            Action::Add { .. } => "ADD",
            Action::Remove { .. } => "REMOVE",
            Action::Flush => "FLUSH",
        }
    }

    /// Decode a tagged action value.
    ///
    /// An unrecognised `type` is [`StoreError::UnknownAction`]; a known type
    /// with a bad or missing payload is [`StoreError::InvalidAction`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| StoreError::InvalidAction(e.to_string()))?;

        let tag = match value.get("type") {
            Some(serde_json::Value::String(tag)) => tag.clone(),
            Some(other) => return Err(StoreError::UnknownAction(other.to_string())),
            None => return Err(StoreError::InvalidAction("missing \"type\"".into())),
        };

        if !KNOWN_TAGS.contains(&tag.as_str()) {
            return Err(StoreError::UnknownAction(tag));
        }

        serde_json::from_value(value).map_err(|e| StoreError::InvalidAction(format!("{}: {}", tag, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_all_tags() {
        assert_eq!(Action::from_json(r#"{"type":"LOAD"}"#).unwrap(), Action::Load);
        assert_eq!(Action::from_json(r#"{"type":"GET"}"#).unwrap(), Action::Load);
        assert_eq!(Action::from_json(r#"{"type":"FLUSH"}"#).unwrap(), Action::Flush);
        assert_eq!(Action::from_json(r#"{"type":"UPLOAD"}"#).unwrap(), Action::Flush);
        assert_eq!(
            Action::from_json(r#"{"type":"ADD","value":{"productId":4,"quantity":2}}"#).unwrap(),
            Action::add(4u64, 2)
        );
        assert_eq!(
            Action::from_json(r#"{"type":"REMOVE","value":{"productId":"sku"}}"#).unwrap(),
            Action::remove("sku")
        );
    }

    #[test]
    fn test_encode_uses_type_and_value() {
        let value = serde_json::to_value(Action::add(4u64, 2)).unwrap();
        assert_eq!(
            value,
            json!({"type": "ADD", "value": {"productId": 4, "quantity": 2}})
        );
        assert_eq!(
            serde_json::to_value(Action::Flush).unwrap(),
            json!({"type": "FLUSH"})
        );
    }

    #[test]
    fn test_unknown_tag() {
        let result = Action::from_json(r#"{"type":"CHECKOUT"}"#);
        assert!(matches!(result, Err(StoreError::UnknownAction(tag)) if tag == "CHECKOUT"));

        let result = Action::from_json(r#"{"type":7}"#);
        assert!(matches!(result, Err(StoreError::UnknownAction(_))));
    }

    #[test]
    fn test_invalid_payloads() {
        for raw in [
            "nope",
            r#"{"value":{}}"#,
            r#"{"type":"ADD"}"#,
            r#"{"type":"ADD","value":{"productId":1}}"#,
            r#"{"type":"ADD","value":{"productId":1,"quantity":-3}}"#,
            r#"{"type":"REMOVE","value":{}}"#,
        ] {
            assert!(
                matches!(Action::from_json(raw), Err(StoreError::InvalidAction(_))),
                "raw: {raw}"
            );
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Action::Load.name(), "LOAD");
        assert_eq!(Action::remove(1u64).name(), "REMOVE");
    }
}
