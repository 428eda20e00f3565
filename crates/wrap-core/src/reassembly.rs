//! Buffers the parts of a multi-part request until all declared parts have
//! arrived, or drops them silently after a 60 s timeout.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use wrap_protocol::RequestMessage;

const PART_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully reassembled request: metadata from part 0, body concatenated in
/// ascending `partIndex` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRequest {
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub enum ReassemblyError {
    MissingPartZero,
    BadBase64 { part_index: u32 },
}

impl std::fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReassemblyError::MissingPartZero => write!(f, "request completed without a partIndex 0"),
            ReassemblyError::BadBase64 { part_index } => write!(f, "part {} has invalid base64 body", part_index),
        }
    }
}

impl std::error::Error for ReassemblyError {}

struct Pending {
    parts: HashMap<u32, RequestMessage>,
    declared_parts: u32,
    first_seen: Instant,
}

/// Map of request id to in-progress reassembly state, keyed as described in
/// §4.4. Not thread-safe on its own; callers on a multi-threaded runtime
/// must hold it behind a mutex (the orchestrator does via `tokio::sync::Mutex`).
#[derive(Default)]
pub struct ReassemblyBuffer {
    pending: HashMap<String, Pending>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `part`, returning the reassembled request once the number of
    /// distinct part indices reaches the `parts` value declared by the
    /// first-arriving part for this id. Last-write-wins on a repeated index.
    pub fn offer(&mut self, part: RequestMessage) -> Option<Result<CompleteRequest, ReassemblyError>> {
        let id = part.id.clone();
        let entry = self.pending.entry(id.clone()).or_insert_with(|| Pending {
            parts: HashMap::new(),
            declared_parts: part.parts,
            first_seen: Instant::now(),
        });
        entry.parts.insert(part.part_index, part);

        if (entry.parts.len() as u32) < entry.declared_parts {
            return None;
        }

        let pending = self.pending.remove(&id)?;
        Some(Self::assemble(id, pending))
    }

    fn assemble(id: String, pending: Pending) -> Result<CompleteRequest, ReassemblyError> {
        let part_zero = pending.parts.get(&0).ok_or(ReassemblyError::MissingPartZero)?;
        let url = part_zero.url.clone().ok_or(ReassemblyError::MissingPartZero)?;
        let method = part_zero.method.clone().ok_or(ReassemblyError::MissingPartZero)?;
        let headers = part_zero.headers.clone().unwrap_or_default();

        let mut indices: Vec<&u32> = pending.parts.keys().collect();
        indices.sort_unstable();

        let mut body = Vec::new();
        for idx in indices {
            let part = &pending.parts[idx];
            if part.body_base64.is_empty() {
                continue;
            }
            let decoded = STANDARD
                .decode(&part.body_base64)
                .map_err(|_| ReassemblyError::BadBase64 { part_index: *idx })?;
            body.extend_from_slice(&decoded);
        }

        Ok(CompleteRequest { id, url, method, headers, body })
    }

    /// Drop entries whose first part arrived more than 60s ago.
    pub fn sweep_expired(&mut self) {
        let now = Instant::now();
        self.pending.retain(|_, p| now.duration_since(p.first_seen) < PART_TIMEOUT);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(id: &str, idx: u32, parts: u32, body: &str, meta: bool) -> RequestMessage {
        RequestMessage {
            id: id.to_owned(),
            part_index: idx,
            parts,
            body_base64: STANDARD.encode(body.as_bytes()),
            url: meta.then(|| "/v1/x".to_owned()),
            method: meta.then(|| "GET".to_owned()),
            headers: meta.then(HashMap::new),
        }
    }

    #[test]
    fn single_part_completes_immediately() {
        let mut buf = ReassemblyBuffer::new();
        let result = buf.offer(part("r1", 0, 1, "hello", true)).unwrap().unwrap();
        assert_eq!(result.id, "r1");
        assert_eq!(result.body, b"hello");
        assert_eq!(buf.pending_count(), 0);
    }

    #[test]
    fn multi_part_completes_only_once_all_indices_seen() {
        let mut buf = ReassemblyBuffer::new();
        assert!(buf.offer(part("r2", 1, 3, "B", false)).is_none());
        assert!(buf.offer(part("r2", 2, 3, "C", false)).is_none());
        let result = buf.offer(part("r2", 0, 3, "A", true)).unwrap().unwrap();
        assert_eq!(result.body, b"ABC");
    }

    #[test]
    fn last_write_wins_on_repeated_index() {
        let mut buf = ReassemblyBuffer::new();
        buf.offer(part("r3", 0, 1, "first", true));
        let result = buf.offer(part("r3", 0, 1, "second", true)).unwrap().unwrap();
        assert_eq!(result.body, b"second");
    }

    #[test]
    fn completion_without_part_zero_is_rejected() {
        let mut buf = ReassemblyBuffer::new();
        let result = buf.offer(part("r4", 0, 1, "only-part", false)).unwrap();
        assert!(matches!(result, Err(ReassemblyError::MissingPartZero)));
    }

    #[test]
    fn sweep_expired_drops_stale_entries() {
        let mut buf = ReassemblyBuffer::new();
        buf.offer(part("r5", 0, 2, "A", true));
        assert_eq!(buf.pending_count(), 1);
        buf.sweep_expired();
        assert_eq!(buf.pending_count(), 1, "not yet expired");
    }
}
