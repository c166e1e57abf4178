//! Keyword tables: what a user configured and how incoming text is matched
//! against it.
//!
//! A user's table is stored as a JSON object keyed by keyword, each value
//! being `{"type": null|"text"|"photo", "content": string|null}`. The same
//! document shape is used by both storage backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Telegram user id as persisted
pub type UserId = i64;

/// Telegram chat id as persisted
pub type ChatId = i64;

/// Response configured for a keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredResponse", into = "StoredResponse")]
pub enum KeywordResponse {
    /// Keyword registered, response not supplied yet. Never matched.
    Pending,
    /// Plain text reply
    Text(String),
    /// Photo reply, identified by its Telegram file id
    Photo(String),
}

impl KeywordResponse {
    /// Whether this entry can be matched against incoming messages
    pub fn is_ready(&self) -> bool {
        !matches!(self, KeywordResponse::Pending)
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            KeywordResponse::Pending => "pending",
            KeywordResponse::Text(_) => "text",
            KeywordResponse::Photo(_) => "photo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredKind {
    Text,
    Photo,
    #[serde(other)]
    Unknown,
}

/// On-disk representation of a [`KeywordResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredResponse {
    #[serde(rename = "type", default)]
    kind: Option<StoredKind>,
    #[serde(default)]
    content: Option<String>,
}

impl From<StoredResponse> for KeywordResponse {
    fn from(stored: StoredResponse) -> Self {
        match (stored.kind, stored.content) {
            (Some(StoredKind::Text), Some(content)) => KeywordResponse::Text(content),
            (Some(StoredKind::Photo), Some(file_id)) => KeywordResponse::Photo(file_id),
            _ => KeywordResponse::Pending,
        }
    }
}

impl From<KeywordResponse> for StoredResponse {
    fn from(response: KeywordResponse) -> Self {
        match response {
            KeywordResponse::Pending => StoredResponse {
                kind: None,
                content: None,
            },
            KeywordResponse::Text(content) => StoredResponse {
                kind: Some(StoredKind::Text),
                content: Some(content),
            },
            KeywordResponse::Photo(file_id) => StoredResponse {
                kind: Some(StoredKind::Photo),
                content: Some(file_id),
            },
        }
    }
}

/// One configured trigger/response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordEntry {
    pub keyword: String,
    pub response: KeywordResponse,
}

/// Normalize user input into a keyword. Returns `None` for blank input.
pub fn normalize_keyword(input: &str) -> Option<String> {
    if input.trim().is_empty() {
        return None;
    }
    Some(input.to_lowercase())
}

/// A single user's keyword table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserConfig {
    entries: BTreeMap<String, KeywordResponse>,
}

impl UserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored document, degrading gracefully when it is malformed.
    ///
    /// A document that is not an object yields an empty table. Inside an
    /// object each entry is decoded on its own, and an entry that cannot be
    /// decoded becomes [`KeywordResponse::Pending`] so the rest survive.
    pub fn from_json_lenient(user_id: UserId, value: serde_json::Value) -> Self {
        let serde_json::Value::Object(map) = value else {
            warn!(user_id = %user_id, "Keyword config is not an object, using empty table");
            return Self::default();
        };

        let entries = map
            .into_iter()
            .map(|(keyword, entry)| {
                let response = serde_json::from_value(entry).unwrap_or_else(|e| {
                    warn!(user_id = %user_id, keyword = %keyword, error = %e, "Malformed keyword entry, treating as pending");
                    KeywordResponse::Pending
                });
                (keyword, response)
            })
            .collect();

        Self { entries }
    }

    /// Same as [`UserConfig::from_json_lenient`] for raw JSON text
    pub fn from_str_lenient(user_id: UserId, raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_json_lenient(user_id, value),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Unparseable keyword config, using empty table");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, keyword: &str) -> Option<&KeywordResponse> {
        self.entries.get(keyword)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.contains_key(keyword)
    }

    /// Insert or overwrite the response for `keyword`
    pub fn set(&mut self, keyword: impl Into<String>, response: KeywordResponse) {
        self.entries.insert(keyword.into(), response);
    }

    /// Remove `keyword`; returns whether it was present
    pub fn remove(&mut self, keyword: &str) -> bool {
        self.entries.remove(keyword).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeywordResponse)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn entries(&self) -> Vec<KeywordEntry> {
        self.entries
            .iter()
            .map(|(keyword, response)| KeywordEntry {
                keyword: keyword.clone(),
                response: response.clone(),
            })
            .collect()
    }

    /// Every ready entry whose keyword occurs in `text`, case-insensitively.
    ///
    /// All matches are returned in table order; overlapping keywords are not
    /// deduplicated.
    pub fn matches<'a>(&'a self, text: &str) -> Vec<(&'a str, &'a KeywordResponse)> {
        let haystack = text.to_lowercase();
        self.entries
            .iter()
            .filter(|(_, response)| response.is_ready())
            .filter(|(keyword, _)| haystack.contains(keyword.as_str()))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("HoLa"), Some("hola".to_string()));
        assert_eq!(normalize_keyword("Buenos Días"), Some("buenos días".to_string()));
        assert_eq!(normalize_keyword("   "), None);
        assert_eq!(normalize_keyword(""), None);
    }

    #[test]
    fn test_document_shape() {
        let mut config = UserConfig::new();
        config.set("hola", KeywordResponse::Text("mundo".to_string()));
        config.set("gato", KeywordResponse::Photo("AgACAgQ".to_string()));
        config.set("nuevo", KeywordResponse::Pending);

        assert_eq!(
            config.to_json(),
            json!({
                "gato": {"type": "photo", "content": "AgACAgQ"},
                "hola": {"type": "text", "content": "mundo"},
                "nuevo": {"type": null, "content": null}
            })
        );
    }

    #[test]
    fn test_lenient_decoding() {
        let config = UserConfig::from_json_lenient(
            1,
            json!({"hola": {"type": "text", "content": "mundo"}, "roto": {"type": "text"}}),
        );
        assert_eq!(config.get("hola"), Some(&KeywordResponse::Text("mundo".to_string())));
        assert_eq!(config.get("roto"), Some(&KeywordResponse::Pending));

        // Unknown types and odd entries only affect themselves
        let config = UserConfig::from_json_lenient(
            1,
            json!({
                "hola": {"type": "text", "content": "mundo"},
                "video": {"type": "video", "content": "x"},
                "numero": {"type": "text", "content": 42},
                "suelto": "texto"
            }),
        );
        assert_eq!(config.len(), 4);
        assert_eq!(config.get("hola"), Some(&KeywordResponse::Text("mundo".to_string())));
        assert_eq!(config.get("video"), Some(&KeywordResponse::Pending));
        assert_eq!(config.get("numero"), Some(&KeywordResponse::Pending));
        assert_eq!(config.get("suelto"), Some(&KeywordResponse::Pending));

        assert!(UserConfig::from_json_lenient(1, json!([1, 2, 3])).is_empty());
        assert!(UserConfig::from_str_lenient(1, "{not json").is_empty());
    }

    #[test]
    fn test_matches_case_insensitive_substring() {
        let mut config = UserConfig::new();
        config.set("hola", KeywordResponse::Text("mundo".to_string()));

        assert_eq!(config.matches("HOLA amigo").len(), 1);
        assert_eq!(config.matches("ahola").len(), 1);
        assert!(config.matches("adiós").is_empty());
    }

    #[test]
    fn test_pending_never_matches() {
        let mut config = UserConfig::new();
        config.set("hola", KeywordResponse::Pending);
        assert!(config.matches("hola").is_empty());
    }

    #[test]
    fn test_all_matches_returned_in_table_order() {
        let mut config = UserConfig::new();
        config.set("mundo", KeywordResponse::Text("2".to_string()));
        config.set("hola", KeywordResponse::Text("1".to_string()));

        let matched: Vec<&str> = config.matches("hola mundo").into_iter().map(|(k, _)| k).collect();
        assert_eq!(matched, vec!["hola", "mundo"]);
    }
}
