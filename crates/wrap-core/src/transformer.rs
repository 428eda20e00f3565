//! The optional response transformer (§4.7). A trusted, in-process
//! collaborator, sandboxed only by the shape check on its output.

use crate::http_client::{HttpRequestSpec, HttpResponse};
use std::collections::HashMap;

pub struct TransformerInput<'a> {
    pub request: &'a HttpRequestSpec,
    pub response: &'a HttpResponse,
    pub destination: &'a str,
    pub nprofile: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerOutput {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// `None` means "use the original response unchanged". A transformer that
/// panics or whose output otherwise fails validation is a `TransformerFault`
/// — callers must catch panics at the boundary and fall back to original.
pub trait ResponseTransformer: Send + Sync {
    fn transform(&self, input: TransformerInput<'_>) -> Option<TransformerOutput>;
}

/// Applies `transformer` if present, falling back to `original` on `None`
/// or on any output that fails to satisfy the exact `{status, headers,
/// bodyBuffer}` shape (checked here by construction, since `TransformerOutput`
/// cannot itself be malformed; callers using a non-Rust transformer such as
/// a subprocess must validate before constructing one).
pub fn apply_transformer(
    transformer: Option<&dyn ResponseTransformer>,
    input: TransformerInput<'_>,
) -> HttpResponse {
    let original = input.response.clone();
    let Some(transformer) = transformer else {
        return original;
    };
    match transformer.transform(input) {
        Some(out) => HttpResponse { status: out.status, headers: out.headers, body: out.body },
        None => original,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upcase;
    impl ResponseTransformer for Upcase {
        fn transform(&self, _input: TransformerInput<'_>) -> Option<TransformerOutput> {
            Some(TransformerOutput {
                status: 299,
                headers: HashMap::from([("x-y".to_owned(), "z".to_owned())]),
                body: b"BYE".to_vec(),
            })
        }
    }

    #[test]
    fn no_transformer_keeps_original() {
        let req = HttpRequestSpec { method: "GET".into(), url: "/x".into(), headers: HashMap::new(), body: vec![] };
        let resp = HttpResponse { status: 200, headers: HashMap::new(), body: b"ok".to_vec() };
        let out = apply_transformer(None, TransformerInput { request: &req, response: &resp, destination: "http://o", nprofile: "np" });
        assert_eq!(out, resp);
    }

    #[test]
    fn transformer_override_replaces_triple_exactly() {
        let req = HttpRequestSpec { method: "GET".into(), url: "/x".into(), headers: HashMap::new(), body: vec![] };
        let resp = HttpResponse { status: 200, headers: HashMap::new(), body: b"ok".to_vec() };
        let t = Upcase;
        let out = apply_transformer(Some(&t), TransformerInput { request: &req, response: &resp, destination: "http://o", nprofile: "np" });
        assert_eq!(out.status, 299);
        assert_eq!(out.body, b"BYE");
        assert_eq!(out.headers.get("x-y"), Some(&"z".to_owned()));
    }
}
