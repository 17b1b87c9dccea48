use crate::store::{Collection, Document};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Extraction of external asset ids from image-bearing document fields.
///
/// Two schemas are in the wild: a direct opaque asset-id field (preferred)
/// and a legacy form where the id is embedded in the asset URL after the
/// `/media/` path segment. Anything unrecognized — identity-provider-hosted
/// avatars included — yields nothing and is simply not queued for deletion.
/// All functions here are pure and never fail.

const MAX_ASSET_ID_LEN: usize = 64;

fn media_url_regex() -> &'static Regex {
    static MEDIA_URL_REGEX: OnceLock<Regex> = OnceLock::new();
    MEDIA_URL_REGEX.get_or_init(|| {
        Regex::new(
            r"^https?://[^?#\s]+/media/([A-Za-z0-9_-]{1,64})(?:\.[A-Za-z0-9]{1,8})?(?:\?[^#\s]*)?$",
        )
        .unwrap()
    })
}

/// Extract the asset id from a legacy asset URL, if it is one.
pub fn asset_id_from_url(url: &str) -> Option<String> {
    media_url_regex()
        .captures(url.trim())
        .map(|caps| caps[1].to_string())
}

fn normalize_direct_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_ASSET_ID_LEN {
        return None;
    }
    // A direct id field holding a URL is legacy data that slipped through.
    if trimmed.contains("://") {
        return asset_id_from_url(trimmed);
    }
    Some(trimmed.to_string())
}

fn push_from_value(value: &Value, legacy_url: bool, out: &mut Vec<String>) {
    if let Some(raw) = value.as_str() {
        let id = if legacy_url {
            asset_id_from_url(raw)
        } else {
            normalize_direct_id(raw)
        };
        if let Some(id) = id {
            out.push(id);
        }
    }
}

fn push_field(data: &Value, field: &str, legacy_url: bool, out: &mut Vec<String>) {
    match data.get(field) {
        Some(Value::Array(values)) => {
            for value in values {
                push_from_value(value, legacy_url, out);
            }
        }
        Some(value) => push_from_value(value, legacy_url, out),
        None => {}
    }
}

/// Extract every external asset id referenced by a document's known
/// image-bearing fields.
pub fn extract_asset_ids(doc: &Document) -> Vec<String> {
    let mut out = Vec::new();
    match doc.collection {
        Collection::Users => {
            push_field(&doc.data, "avatarAssetId", false, &mut out);
            push_field(&doc.data, "avatarUrl", true, &mut out);
        }
        Collection::Items => {
            push_field(&doc.data, "imageAssetIds", false, &mut out);
            push_field(&doc.data, "imageUrls", true, &mut out);
        }
        Collection::ChatMessages => {
            push_field(&doc.data, "imageAssetId", false, &mut out);
            push_field(&doc.data, "imageUrl", true, &mut out);
        }
        _ => {}
    }
    out
}
