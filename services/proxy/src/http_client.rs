//! `reqwest`-backed implementation of `wrap_core::HttpClient`: a single
//! request to `destination + spec.url`, with any transport/timeout/protocol
//! failure folded into a synthetic 500 per §4.6.

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use wrap_core::{HttpClient, HttpRequestSpec, HttpResponse};

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        ReqwestHttpClient { client: reqwest::Client::new() }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn dispatch(&self, destination: &str, spec: HttpRequestSpec, timeout: Duration) -> HttpResponse {
        match self.dispatch_inner(destination, spec, timeout).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "origin request failed");
                HttpResponse::synthetic(500, "Request failed")
            }
        }
    }
}

impl ReqwestHttpClient {
    async fn dispatch_inner(
        &self,
        destination: &str,
        spec: HttpRequestSpec,
        timeout: Duration,
    ) -> Result<HttpResponse, reqwest::Error> {
        let method = reqwest::Method::from_str(&spec.method.to_uppercase())
            .unwrap_or(reqwest::Method::GET);
        let url = format!("{}{}", destination.trim_end_matches('/'), spec.url);

        let mut builder = self.client.request(method, &url).timeout(timeout).body(spec.body);
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.entry(name.to_string()).or_insert_with(|| value_str.to_owned());
            }
        }

        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}
