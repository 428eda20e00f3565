//! The injected HTTP client boundary (§4.6, §6). The core only depends on
//! this trait; `services/proxy` supplies the `reqwest`-backed implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn synthetic(status: u16, body: &str) -> Self {
        HttpResponse { status, headers: HashMap::new(), body: body.as_bytes().to_vec() }
    }
}

/// One origin request against `destination + spec.url`, bounded by `timeout`.
/// On any transport, timeout, or protocol error, implementations must
/// return `Ok(HttpResponse::synthetic(500, "Request failed"))` rather than
/// an `Err` — origin failure is not a pipeline failure.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn dispatch(&self, destination: &str, spec: HttpRequestSpec, timeout: Duration) -> HttpResponse;
}
