//! Splits a response body into fixed-size base64 chunks per §4.8.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use wrap_protocol::ResponseMessage;

/// Pre-base64 byte ceiling per chunk.
pub const PART_BODY_MAX: usize = 16384;

/// Split `body` into `ResponseMessage` parts sharing `request_id`. Part 0
/// additionally carries `status`/`headers`; an empty body yields exactly
/// one part with an empty `bodyBase64`.
pub fn chunk_response(
    request_id: &str,
    status: u16,
    headers: HashMap<String, String>,
    body: &[u8],
) -> Vec<ResponseMessage> {
    if body.is_empty() {
        return vec![ResponseMessage {
            id: request_id.to_owned(),
            part_index: 0,
            parts: 1,
            body_base64: String::new(),
            status: Some(status),
            headers: Some(headers),
        }];
    }

    let slices: Vec<&[u8]> = body.chunks(PART_BODY_MAX).collect();
    let total = slices.len() as u32;

    slices
        .into_iter()
        .enumerate()
        .map(|(idx, slice)| ResponseMessage {
            id: request_id.to_owned(),
            part_index: idx as u32,
            parts: total,
            body_base64: STANDARD.encode(slice),
            status: (idx == 0).then_some(status),
            headers: (idx == 0).then(|| headers.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_yields_one_empty_part() {
        let parts = chunk_response("r1", 200, HashMap::new(), b"");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].parts, 1);
        assert_eq!(parts[0].body_base64, "");
        assert_eq!(parts[0].status, Some(200));
    }

    #[test]
    fn small_body_yields_single_chunk_with_metadata() {
        let parts = chunk_response("r1", 200, HashMap::new(), b"ok");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body_base64, STANDARD.encode(b"ok"));
        assert_eq!(parts[0].status, Some(200));
    }

    #[test]
    fn forty_thousand_bytes_yields_three_chunks() {
        let body = vec![7u8; 40_000];
        let parts = chunk_response("r1", 200, HashMap::new(), &body);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.parts == 3 && p.id == "r1"));
        assert_eq!(parts[0].status, Some(200));
        assert!(parts[1].status.is_none());
        assert!(parts[2].status.is_none());

        let decoded_lens: Vec<usize> =
            parts.iter().map(|p| STANDARD.decode(&p.body_base64).unwrap().len()).collect();
        assert_eq!(decoded_lens, vec![16384, 16384, 40_000 - 2 * 16384]);
    }

    #[test]
    fn every_chunk_respects_the_byte_ceiling() {
        let body = vec![1u8; PART_BODY_MAX * 5 + 1];
        let parts = chunk_response("r1", 200, HashMap::new(), &body);
        for p in &parts {
            let decoded = STANDARD.decode(&p.body_base64).unwrap();
            assert!(decoded.len() <= PART_BODY_MAX);
        }
    }
}
