use crate::errors::{DomainError, DomainResult};
use crate::store::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Typed views over the schemaless documents, decoded at the store boundary
/// so reference fields are validated before anything dereferences them.
/// Unknown fields are ignored; missing optional fields default.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_asset_id: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub rating: Option<RatingAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub posted_by: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_asset_ids: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Closed status set for items.
pub const ITEM_STATUSES: &[&str] = &["available", "pending", "exchanged", "removed"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    pub owner_id: String,
    pub requester_id: String,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Closed status set for exchanges.
pub const EXCHANGE_STATUSES: &[&str] =
    &["pending", "accepted", "rejected", "completed", "cancelled"];

/// Exchange statuses eligible for time-based pruning.
pub const FINISHED_EXCHANGE_STATUSES: &[&str] = &["completed", "cancelled"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRecord {
    pub sender_id: String,
    #[serde(default)]
    pub exchange_id: Option<String>,
    #[serde(default)]
    pub image_asset_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub reviewer_id: String,
    pub target_user_id: String,
    pub rating: f64,
}

/// Decode a document into its typed record, mapping decode failures to
/// `DomainError::InvalidDocument` so callers can skip-and-log rather than
/// abort a whole pass on one malformed payload.
pub fn decode<T: DeserializeOwned>(doc: &Document) -> DomainResult<T> {
    serde_json::from_value(doc.data.clone()).map_err(|e| DomainError::InvalidDocument {
        collection: doc.collection.to_string(),
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;
    use chrono::Utc;
    use serde_json::json;

    fn doc(data: serde_json::Value) -> Document {
        Document {
            collection: Collection::Items,
            id: "i1".to_string(),
            data,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn item_decodes_with_defaults() {
        let item: ItemRecord = decode(&doc(json!({"postedBy": "u1"}))).unwrap();
        assert_eq!(item.posted_by, "u1");
        assert_eq!(item.title, "");
        assert!(item.status.is_none());
        assert!(item.image_urls.is_empty());
    }

    #[test]
    fn missing_reference_field_is_invalid() {
        let err = decode::<ItemRecord>(&doc(json!({"title": "Bike"}))).unwrap_err();
        match err {
            DomainError::InvalidDocument { collection, id, .. } => {
                assert_eq!(collection, "items");
                assert_eq!(id, "i1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn chat_message_image_fields_are_optional() {
        let message: ChatMessageRecord =
            decode(&doc(json!({"senderId": "u1", "exchangeId": "e1"}))).unwrap();
        assert_eq!(message.sender_id, "u1");
        assert!(message.image_asset_id.is_none());
        assert!(message.image_url.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let review: ReviewRecord = decode(&doc(json!({
            "reviewerId": "u1",
            "targetUserId": "u2",
            "rating": 4.0,
            "comment": "solid trade"
        })))
        .unwrap();
        assert_eq!(review.rating, 4.0);
        assert_eq!(review.target_user_id, "u2");
    }
}
