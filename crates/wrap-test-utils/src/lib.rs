//! In-memory fakes for the pipeline's injected collaborators, shared by
//! `wrap-core`'s and `services/proxy`'s test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};
use wrap_core::{HttpClient, HttpRequestSpec, HttpResponse, RelayPool};
use wrap_crypto::{PublicKeyHex, SecretKeyHex};
use wrap_protocol::{kind, Event, ResponseMessage};

/// An HTTP client whose response is fixed per call, recording every request
/// it was asked to dispatch.
pub struct FakeHttpClient {
    pub response: HttpResponse,
    pub requests: Mutex<Vec<HttpRequestSpec>>,
}

impl FakeHttpClient {
    pub fn new(response: HttpResponse) -> Self {
        FakeHttpClient { response, requests: Mutex::new(vec![]) }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn dispatch(&self, _destination: &str, spec: HttpRequestSpec, _timeout: Duration) -> HttpResponse {
        self.requests.lock().unwrap().push(spec);
        self.response.clone()
    }
}

/// A relay pool that records every publish and can be configured to fail
/// specific relays, for exercising per-relay error isolation.
#[derive(Default)]
pub struct FakeRelayPool {
    pub published: Mutex<Vec<(String, Event)>>,
    pub failing_relays: Vec<String>,
    pub connected: Vec<String>,
}

impl FakeRelayPool {
    pub fn new(connected: Vec<String>) -> Self {
        FakeRelayPool { published: Mutex::new(vec![]), failing_relays: vec![], connected }
    }

    pub fn published_events(&self) -> Vec<Event> {
        self.published.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }
}

#[async_trait]
impl RelayPool for FakeRelayPool {
    async fn publish(&self, relay_url: &str, event: &Event) -> Result<(), String> {
        if self.failing_relays.iter().any(|r| r == relay_url) {
            return Err(format!("relay {} unreachable", relay_url));
        }
        self.published.lock().unwrap().push((relay_url.to_owned(), event.clone()));
        Ok(())
    }

    fn connected_relays(&self) -> Vec<String> {
        self.connected.clone()
    }
}

/// Builds a bare-minimum valid `RequestMessage` part-0 JSON payload, for
/// constructing inner events in integration tests without hand-writing JSON.
pub fn request_message_json(id: &str, url: &str, method: &str, body_base64: &str) -> String {
    serde_json::json!({
        "id": id,
        "partIndex": 0,
        "parts": 1,
        "bodyBase64": body_base64,
        "url": url,
        "method": method,
        "headers": HashMap::<String, String>::new(),
    })
    .to_string()
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is after the epoch").as_secs() as i64
}

/// Plays the role of a well-behaved requester client: builds a full
/// wrap(seal(inner)) chain addressed to `proxy_public`, as a real client
/// would, so pipeline tests can exercise the decrypt path end to end.
pub struct FakeRequester {
    pub secret: SecretKeyHex,
    pub public: PublicKeyHex,
}

impl Default for FakeRequester {
    fn default() -> Self {
        let secret = wrap_crypto::random_secret();
        let public = wrap_crypto::public_of(&secret);
        FakeRequester { secret, public }
    }
}

impl FakeRequester {
    /// Build a gift-wrapped `HttpRequest` inner event with the given
    /// `created_at` (seconds since epoch) and inner `content`.
    pub fn build_wrap(&self, proxy_public: &PublicKeyHex, created_at: i64, inner_content: &str) -> Event {
        let now = now_secs();

        let inner_id =
            Event::compute_id(&self.public.to_hex(), created_at, kind::HTTP_REQUEST, &[], inner_content);
        let inner = Event {
            id: inner_id,
            pubkey: self.public.to_hex(),
            created_at,
            kind: kind::HTTP_REQUEST,
            tags: vec![],
            content: inner_content.to_owned(),
            sig: String::new(),
        };

        let seal_conv_key = wrap_crypto::conversation_key(&self.secret, proxy_public);
        let seal_content = wrap_crypto::encrypt(inner.to_json().as_bytes(), &seal_conv_key).unwrap();
        let seal_id = Event::compute_id(&self.public.to_hex(), now, kind::SEAL, &[], &seal_content);
        let seal_sig = wrap_crypto::sign(&self.secret, &seal_id).unwrap();
        let seal = Event {
            id: seal_id,
            pubkey: self.public.to_hex(),
            created_at: now,
            kind: kind::SEAL,
            tags: vec![],
            content: seal_content,
            sig: seal_sig,
        };

        let ephemeral_secret = wrap_crypto::random_secret();
        let ephemeral_public = wrap_crypto::public_of(&ephemeral_secret);
        let wrap_conv_key = wrap_crypto::conversation_key(&ephemeral_secret, proxy_public);
        let wrap_content = wrap_crypto::encrypt(seal.to_json().as_bytes(), &wrap_conv_key).unwrap();
        let tags = vec![vec!["p".to_owned(), proxy_public.to_hex(), "wss://relay.example".to_owned()]];
        let wrap_id =
            Event::compute_id(&ephemeral_public.to_hex(), now, kind::EPHEMERAL_GIFT_WRAP, &tags, &wrap_content);
        let wrap_sig = wrap_crypto::sign(&ephemeral_secret, &wrap_id).unwrap();

        Event {
            id: wrap_id,
            pubkey: ephemeral_public.to_hex(),
            created_at: now,
            kind: kind::EPHEMERAL_GIFT_WRAP,
            tags,
            content: wrap_content,
            sig: wrap_sig,
        }
    }

    /// Build a wrap carrying a seal whose signature has been tampered, for
    /// verify-fail tests: the chain is otherwise identical to `build_wrap`.
    pub fn build_wrap_with_tampered_seal(&self, proxy_public: &PublicKeyHex, created_at: i64, inner_content: &str) -> Event {
        let now = now_secs();

        let inner_id =
            Event::compute_id(&self.public.to_hex(), created_at, kind::HTTP_REQUEST, &[], inner_content);
        let inner = Event {
            id: inner_id,
            pubkey: self.public.to_hex(),
            created_at,
            kind: kind::HTTP_REQUEST,
            tags: vec![],
            content: inner_content.to_owned(),
            sig: String::new(),
        };

        let seal_conv_key = wrap_crypto::conversation_key(&self.secret, proxy_public);
        let seal_content = wrap_crypto::encrypt(inner.to_json().as_bytes(), &seal_conv_key).unwrap();
        let seal_id = Event::compute_id(&self.public.to_hex(), now, kind::SEAL, &[], &seal_content);
        let mut seal_sig = wrap_crypto::sign(&self.secret, &seal_id).unwrap();
        seal_sig.replace_range(0..2, if &seal_sig[0..2] == "ff" { "00" } else { "ff" });
        let seal = Event {
            id: seal_id,
            pubkey: self.public.to_hex(),
            created_at: now,
            kind: kind::SEAL,
            tags: vec![],
            content: seal_content,
            sig: seal_sig,
        };

        let ephemeral_secret = wrap_crypto::random_secret();
        let ephemeral_public = wrap_crypto::public_of(&ephemeral_secret);
        let wrap_conv_key = wrap_crypto::conversation_key(&ephemeral_secret, proxy_public);
        let wrap_content = wrap_crypto::encrypt(seal.to_json().as_bytes(), &wrap_conv_key).unwrap();
        let tags = vec![vec!["p".to_owned(), proxy_public.to_hex(), "wss://relay.example".to_owned()]];
        let wrap_id =
            Event::compute_id(&ephemeral_public.to_hex(), now, kind::EPHEMERAL_GIFT_WRAP, &tags, &wrap_content);
        let wrap_sig = wrap_crypto::sign(&ephemeral_secret, &wrap_id).unwrap();

        Event {
            id: wrap_id,
            pubkey: ephemeral_public.to_hex(),
            created_at: now,
            kind: kind::EPHEMERAL_GIFT_WRAP,
            tags,
            content: wrap_content,
            sig: wrap_sig,
        }
    }

    /// Unwrap a response gift-wrap published by the proxy back to its
    /// `ResponseMessage`, playing the client's side of the decrypt chain.
    pub fn decode_response(&self, wrap: &Event) -> ResponseMessage {
        let ephemeral_public = PublicKeyHex::from_hex(&wrap.pubkey).unwrap();
        let wrap_conv_key = wrap_crypto::conversation_key(&self.secret, &ephemeral_public);
        let seal_json = wrap_crypto::decrypt(&wrap.content, &wrap_conv_key).unwrap();
        let seal = Event::from_json(std::str::from_utf8(&seal_json).unwrap()).unwrap();

        let seal_public = PublicKeyHex::from_hex(&seal.pubkey).unwrap();
        let seal_conv_key = wrap_crypto::conversation_key(&self.secret, &seal_public);
        let inner_json = wrap_crypto::decrypt(&seal.content, &seal_conv_key).unwrap();
        let inner = Event::from_json(std::str::from_utf8(&inner_json).unwrap()).unwrap();

        serde_json::from_str(&inner.content).unwrap()
    }
}
