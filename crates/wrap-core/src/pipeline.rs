//! The orchestrator: subscribes to relays for gift-wrap events addressed to
//! our identity and drives each one through decrypt, validate, dedup,
//! reassemble, dispatch, transform, chunk, and publish, per §4.10.

use crate::chunker::chunk_response;
use crate::dedup::{RequestDedup, WrapDedup};
use crate::error::PipelineError;
use crate::http_client::{HttpClient, HttpRequestSpec, HttpResponse};
use crate::publisher::{Publisher, RelayPool};
use crate::reassembly::ReassemblyBuffer;
use crate::route_gate::RouteGate;
use crate::transformer::{apply_transformer, ResponseTransformer, TransformerInput};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use wrap_crypto::{PublicKeyHex, SecretKeyHex};
use wrap_protocol::{kind, Event, RequestMessage};

const FUTURE_SKEW_SECS: i64 = 600;

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is after the epoch").as_secs() as i64
}

pub struct PipelineConfig {
    pub destination: String,
    pub secret_key: SecretKeyHex,
    pub relays: Vec<String>,
    pub allowed_routes: Vec<String>,
    pub timeout: Duration,
}

/// Owns the mutable pipeline state (dedup maps, reassembly buffer) and the
/// injected collaborators. Safe to share across concurrently-spawned
/// per-event handlers: interior mutability is behind `tokio::sync::Mutex`,
/// since the core itself does not assume a single-threaded runtime.
pub struct Pipeline {
    our_secret: SecretKeyHex,
    our_public: PublicKeyHex,
    relays: Vec<String>,
    destination: String,
    timeout: Duration,
    route_gate: RouteGate,
    wrap_dedup: Mutex<WrapDedup>,
    request_dedup: Mutex<RequestDedup>,
    reassembly: Mutex<ReassemblyBuffer>,
    http_client: Arc<dyn HttpClient>,
    transformer: Option<Arc<dyn ResponseTransformer>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        http_client: Arc<dyn HttpClient>,
        transformer: Option<Arc<dyn ResponseTransformer>>,
    ) -> Result<Self, crate::route_gate::RouteGateError> {
        let our_public = wrap_crypto::public_of(&config.secret_key);
        let route_gate = RouteGate::new(&config.allowed_routes)?;
        Ok(Pipeline {
            our_secret: config.secret_key,
            our_public,
            relays: config.relays,
            destination: config.destination,
            timeout: config.timeout,
            route_gate,
            wrap_dedup: Mutex::new(WrapDedup::new()),
            request_dedup: Mutex::new(RequestDedup::new(now_secs() - 60)),
            reassembly: Mutex::new(ReassemblyBuffer::new()),
            http_client,
            transformer,
        })
    }

    pub fn our_public(&self) -> PublicKeyHex {
        self.our_public
    }

    /// Periodic maintenance: wrap-dedup compaction (hourly), request-dedup
    /// cursor advance (every 10 min), and reassembly sweep. Callers on
    /// `services/proxy` drive this from `tokio::time::interval` tickers.
    pub async fn compact_wrap_dedup(&self) {
        self.wrap_dedup.lock().await.compact();
    }

    pub async fn compact_request_dedup(&self) {
        self.request_dedup.lock().await.compact();
    }

    pub async fn sweep_reassembly(&self) {
        self.reassembly.lock().await.sweep_expired();
    }

    /// Handle one gift-wrap event delivered by the relay subscription.
    /// Every failure mode short-circuits to a silent drop (logged) except
    /// Forbidden/OriginFail, which still produce a response per §7.
    pub async fn handle_wrap_event(&self, pool: &dyn RelayPool, wrap: Event) {
        if let Err(e) = self.handle_wrap_event_inner(pool, wrap).await {
            debug!(error = %e, "dropping event");
        }
    }

    async fn handle_wrap_event_inner(&self, pool: &dyn RelayPool, wrap: Event) -> Result<(), PipelineError> {
        {
            let mut dedup = self.wrap_dedup.lock().await;
            if dedup.contains(&wrap.id) {
                return Ok(());
            }
            dedup.insert(wrap.id.clone(), wrap.created_at);
        }

        if wrap.kind != kind::EPHEMERAL_GIFT_WRAP {
            return Err(PipelineError::MalformedEvent(format!("unexpected wrap kind {}", wrap.kind)));
        }

        let requester_public = PublicKeyHex::from_hex(&wrap.pubkey)
            .map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;
        let wrap_conv_key = wrap_crypto::conversation_key(&self.our_secret, &requester_public);
        let seal_json = wrap_crypto::decrypt(&wrap.content, &wrap_conv_key)
            .map_err(|e| PipelineError::DecryptFail(e.to_string()))?;
        let seal = Event::from_json(
            std::str::from_utf8(&seal_json).map_err(|e| PipelineError::MalformedEvent(e.to_string()))?,
        )
        .map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;

        if seal.kind != kind::SEAL {
            return Err(PipelineError::MalformedEvent(format!("unexpected seal kind {}", seal.kind)));
        }
        let seal_public =
            PublicKeyHex::from_hex(&seal.pubkey).map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;
        seal.verify_id().map_err(|_| PipelineError::VerifyFail)?;
        if !wrap_crypto::verify(&seal_public, &seal.id, &seal.sig) {
            return Err(PipelineError::VerifyFail);
        }

        let seal_conv_key = wrap_crypto::conversation_key(&self.our_secret, &seal_public);
        let inner_json = wrap_crypto::decrypt(&seal.content, &seal_conv_key)
            .map_err(|e| PipelineError::DecryptFail(e.to_string()))?;
        let inner = Event::from_json(
            std::str::from_utf8(&inner_json).map_err(|e| PipelineError::MalformedEvent(e.to_string()))?,
        )
        .map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;
        inner.verify_id().map_err(|_| PipelineError::VerifyFail)?;

        if inner.kind != kind::HTTP_REQUEST {
            return Err(PipelineError::MalformedEvent(format!("unexpected inner kind {}", inner.kind)));
        }
        if inner.pubkey != seal.pubkey {
            return Err(PipelineError::IdentityMismatch);
        }
        let now = now_secs();
        let oldest_time = self.request_dedup.lock().await.oldest_time();
        if inner.created_at < oldest_time || inner.created_at > now + FUTURE_SKEW_SECS {
            return Err(PipelineError::OutOfWindow { created_at: inner.created_at, oldest: oldest_time, now });
        }

        {
            let mut dedup = self.request_dedup.lock().await;
            if dedup.contains(&inner.id) {
                return Err(PipelineError::Replay(inner.id.clone()));
            }
            dedup.insert(inner.id.clone(), inner.created_at);
        }

        let request: RequestMessage =
            serde_json::from_str(&inner.content).map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;
        request.validate().map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;

        let complete = {
            let mut buffer = self.reassembly.lock().await;
            match buffer.offer(request) {
                None => return Ok(()),
                Some(Ok(complete)) => complete,
                Some(Err(e)) => return Err(PipelineError::MalformedEvent(e.to_string())),
            }
        };

        let response = self.dispatch_and_respond(complete.clone()).await;
        self.publish_response(pool, &seal_public, &complete.id, response).await;
        Ok(())
    }

    async fn dispatch_and_respond(&self, complete: crate::reassembly::CompleteRequest) -> HttpResponse {
        if !self.route_gate.is_allowed(&complete.url) {
            warn!(request_id = %complete.id, path = %complete.url, "route forbidden");
            return HttpResponse::synthetic(403, "Forbidden route");
        }

        let spec = HttpRequestSpec {
            method: complete.method.clone(),
            url: complete.url.clone(),
            headers: complete.headers.clone(),
            body: complete.body.clone(),
        };
        let origin_response = self.http_client.dispatch(&self.destination, spec.clone(), self.timeout).await;

        let nprofile = self.our_public.to_hex();
        apply_transformer(
            self.transformer.as_deref(),
            TransformerInput {
                request: &spec,
                response: &origin_response,
                destination: &self.destination,
                nprofile: &nprofile,
            },
        )
    }

    async fn publish_response(
        &self,
        pool: &dyn RelayPool,
        requester_public: &PublicKeyHex,
        request_id: &str,
        response: HttpResponse,
    ) {
        let publisher = Publisher::new(&self.our_secret, &self.relays);
        let chunks = chunk_response(request_id, response.status, response.headers, &response.body);
        for chunk in &chunks {
            let results = publisher.publish_chunk(pool, requester_public, chunk).await;
            for result in results {
                if let Err(e) = result.outcome {
                    error!(relay = %result.relay_url, error = %e, request_id, "publish failed");
                }
            }
        }
    }
}
