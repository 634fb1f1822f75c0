//! Broker gallery listing parser
//!
//! The broker has shipped several listing shapes over time. Rather than
//! treating the payload as open-ended, every logical attribute is resolved
//! through an ordered list of accepted field names, first match wins, and
//! the result is a strongly typed [`RemoteItem`].

use oneroll_core::domain::RemoteItem;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::client::endpoint;

/// Keys that may hold the item array when the body is an object
const LIST_FIELDS: &[&str] = &["items", "files", "data"];

const ID_FIELDS: &[&str] = &["id", "uploadId", "fileId"];
const NAME_FIELDS: &[&str] = &["name", "fileName", "filename"];
const DEVICE_FIELDS: &[&str] = &["deviceId", "device"];
const DOWNLOAD_FIELDS: &[&str] = &["downloadUrl", "url"];

/// Owner recorded for entries that do not name a device
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Returns the first non-blank string or numeric value among `aliases`
fn first_field(entry: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| match entry.get(*alias)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn item_array(root: Value) -> Vec<Value> {
    match root {
        Value::Array(items) => items,
        Value::Object(mut object) => LIST_FIELDS
            .iter()
            .find_map(|field| match object.remove(*field) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Parses a gallery response body
///
/// Accepts a bare array or an object holding the array under `items`,
/// `files` or `data` (first one present wins). Unrecognized shapes and
/// unparseable bodies yield an empty listing. Entries with neither an id nor
/// a name are skipped. A missing download URL becomes `{base}/gallery/{id}`.
pub fn parse_gallery(body: &str, base: &Url) -> Vec<RemoteItem> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    let root: Value = match serde_json::from_str(body) {
        Ok(root) => root,
        Err(e) => {
            warn!(error = %e, "Gallery response is not JSON, treating as empty");
            return Vec::new();
        }
    };

    let entries = item_array(root);
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(entry) = entry else {
            continue;
        };
        let name = first_field(&entry, NAME_FIELDS);
        let Some(id) = first_field(&entry, ID_FIELDS).or_else(|| name.clone()) else {
            debug!("Skipping gallery entry without id or name");
            continue;
        };
        let owner = first_field(&entry, DEVICE_FIELDS).unwrap_or_else(|| UNKNOWN_DEVICE.into());
        let download_ref = match first_field(&entry, DOWNLOAD_FIELDS) {
            Some(url) => url,
            None => match endpoint(base, ["gallery", id.as_str()]) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(id = %id, error = %e, "Cannot build download URL, skipping entry");
                    continue;
                }
            },
        };
        items.push(RemoteItem::new(id, name, owner, download_ref));
    }
    items
}
