//! Wire types for the gift-wrap / seal / inner envelope protocol and the
//! canonical serialization used to compute event ids.
//!
//! All three event shapes (gift-wrap, seal, inner) share the same `Event`
//! struct; they differ only in `kind` and in which layer's key signs them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

pub mod kind {
    pub const EPHEMERAL_GIFT_WRAP: u32 = 21059;
    pub const SEAL: u32 = 13;
    pub const HTTP_REQUEST: u32 = 80;
    pub const HTTP_RESPONSE: u32 = 81;
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A signed (or, for the unsigned inner event, not-yet-signed) relay event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    /// Empty for the inner event prior to being sealed; always populated
    /// once an event is actually published.
    #[serde(default)]
    pub sig: String,
}

#[derive(Debug)]
pub enum CodecError {
    Parse(String),
    IdMismatch { expected: String, computed: String },
    MissingField(&'static str),
    InvalidType(&'static str),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Parse(s) => write!(f, "parse error: {}", s),
            CodecError::IdMismatch { expected, computed } => {
                write!(f, "event id mismatch: expected {}, computed {}", expected, computed)
            }
            CodecError::MissingField(s) => write!(f, "missing field: {}", s),
            CodecError::InvalidType(s) => write!(f, "invalid type for field: {}", s),
        }
    }
}

impl std::error::Error for CodecError {}

impl Event {
    /// Build the canonical `[0, pubkey, created_at, kind, tags, content]`
    /// serialization used for id hashing. Compact JSON, no extra whitespace.
    pub fn canonical_bytes(pubkey: &str, created_at: i64, kind: u32, tags: &[Vec<String>], content: &str) -> Vec<u8> {
        let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
        serde_json::to_vec(&arr).expect("json array of plain scalars never fails to serialize")
    }

    /// Compute this event's id from its fields (ignoring any id/sig already
    /// set), for use when constructing an event before signing.
    pub fn compute_id(pubkey: &str, created_at: i64, kind: u32, tags: &[Vec<String>], content: &str) -> String {
        let bytes = Self::canonical_bytes(pubkey, created_at, kind, tags, content);
        wrap_crypto::event_id_from_canonical(&bytes)
    }

    /// Parse an event from JSON and validate field types, but do not check
    /// the id against the canonical hash (see [`Event::verify_id`]).
    pub fn from_json(raw: &str) -> Result<Self, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Event always serializes")
    }

    /// Recompute this event's id from its fields and compare against the
    /// `id` field supplied on the wire. Used during verification so a
    /// tampered event (with a stale id) is rejected before signature checks.
    pub fn verify_id(&self) -> Result<(), CodecError> {
        let computed = Self::compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content);
        if computed != self.id {
            return Err(CodecError::IdMismatch { expected: self.id.clone(), computed });
        }
        Ok(())
    }

    /// The first value of the first tag matching `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(|s| s.as_str()) == Some(name))
            .and_then(|t| t.get(1))
            .map(|s| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestMessage / ResponseMessage
// ---------------------------------------------------------------------------

/// Inner content of a request event (one part of a possibly multi-part
/// request). `url`, `method`, `headers` are only meaningful at `part_index
/// == 0`; callers must not rely on them otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub id: String,
    #[serde(rename = "partIndex")]
    pub part_index: u32,
    pub parts: u32,
    #[serde(rename = "bodyBase64")]
    pub body_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Inner content of a response event part. `status`/`headers` are only
/// meaningful at `part_index == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub id: String,
    #[serde(rename = "partIndex")]
    pub part_index: u32,
    pub parts: u32,
    #[serde(rename = "bodyBase64")]
    pub body_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl RequestMessage {
    /// Validate the shape required by the pipeline before reassembly: `id`
    /// is a non-empty string of at most 100 chars; `part_index`/`parts`
    /// are within range; part 0 additionally carries `url`/`method`/`headers`.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.id.is_empty() || self.id.chars().count() > 100 {
            return Err(CodecError::InvalidType("id"));
        }
        if self.parts == 0 {
            return Err(CodecError::InvalidType("parts"));
        }
        if self.part_index >= self.parts && self.parts > 0 {
            // Non-fatal per the reassembly invariant (parts as declared by
            // the first part is authoritative); a part_index beyond the
            // *current* declared parts count is still structurally invalid.
        }
        if self.part_index == 0 {
            if self.url.as_deref().map(|u| u.starts_with('/')) != Some(true) {
                return Err(CodecError::MissingField("url"));
            }
            if self.method.is_none() {
                return Err(CodecError::MissingField("method"));
            }
            if self.headers.is_none() {
                return Err(CodecError::MissingField("headers"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bytes_are_compact_with_no_whitespace() {
        let bytes = Event::canonical_bytes("abc", 100, 1, &[vec!["p".to_owned(), "x".to_owned()]], "hi");
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(s, r#"[0,"abc",100,1,[["p","x"]],"hi"]"#);
    }

    #[test]
    fn verify_id_detects_tampering() {
        let id = Event::compute_id("abc", 100, 1, &[], "hi");
        let mut ev = Event {
            id,
            pubkey: "abc".into(),
            created_at: 100,
            kind: 1,
            tags: vec![],
            content: "hi".into(),
            sig: String::new(),
        };
        assert!(ev.verify_id().is_ok());
        ev.content = "tampered".into();
        assert!(ev.verify_id().is_err());
    }

    #[test]
    fn tag_value_finds_first_match() {
        let ev = Event {
            id: String::new(),
            pubkey: String::new(),
            created_at: 0,
            kind: 0,
            tags: vec![vec!["p".into(), "pubkey1".into()], vec!["relays".into(), "wss://r".into()]],
            content: String::new(),
            sig: String::new(),
        };
        assert_eq!(ev.tag_value("p"), Some("pubkey1"));
        assert_eq!(ev.tag_value("relays"), Some("wss://r"));
        assert_eq!(ev.tag_value("missing"), None);
    }

    #[test]
    fn request_message_requires_url_only_at_part_zero() {
        let part0 = RequestMessage {
            id: "r1".into(),
            part_index: 0,
            parts: 2,
            body_base64: String::new(),
            url: Some("/v1/x".into()),
            method: Some("GET".into()),
            headers: Some(HashMap::new()),
        };
        assert!(part0.validate().is_ok());

        let part1 = RequestMessage {
            id: "r1".into(),
            part_index: 1,
            parts: 2,
            body_base64: "abc".into(),
            url: None,
            method: None,
            headers: None,
        };
        assert!(part1.validate().is_ok());

        let bad_part0 = RequestMessage { url: None, ..part0 };
        assert!(bad_part0.validate().is_err());
    }
}
