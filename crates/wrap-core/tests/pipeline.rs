//! End-to-end scenarios from the pipeline's concrete test table: happy
//! path, forbidden route, multi-part reassembly, replay, stale/future
//! timestamps, transformer override, and seal verify failure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wrap_core::transformer::{ResponseTransformer, TransformerInput, TransformerOutput};
use wrap_core::{HttpResponse, Pipeline, PipelineConfig};
use wrap_test_utils::{request_message_json, FakeHttpClient, FakeRelayPool, FakeRequester};

fn now_secs() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64
}

fn make_pipeline(allowed_routes: Vec<String>, http_response: HttpResponse) -> (Pipeline, Arc<FakeHttpClient>) {
    let secret = wrap_crypto::random_secret();
    let http_client = Arc::new(FakeHttpClient::new(http_response));
    let config = PipelineConfig {
        destination: "http://origin.example".to_owned(),
        secret_key: secret,
        relays: vec!["wss://relay1.example".to_owned(), "wss://relay2.example".to_owned()],
        allowed_routes,
        timeout: Duration::from_millis(300_000),
    };
    let pipeline = Pipeline::new(config, http_client.clone(), None).unwrap();
    (pipeline, http_client)
}

#[tokio::test]
async fn happy_path_returns_single_chunk() {
    let (pipeline, http_client) = make_pipeline(vec!["/v1/**".to_owned()], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r1", "/v1/x", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs(), &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    assert_eq!(http_client.call_count(), 1);
    let published = pool.published_events();
    assert_eq!(published.len(), 2, "one chunk published to both relays");
    let response = requester.decode_response(&published[0]);
    assert_eq!(response.status, Some(200));
    assert_eq!(response.parts, 1);
    assert_eq!(response.part_index, 0);
    assert_eq!(response.body_base64, STANDARD.encode(b"ok"));
}

#[tokio::test]
async fn forbidden_route_bypasses_http_client() {
    let (pipeline, http_client) = make_pipeline(vec!["/v1/**".to_owned()], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r2", "/v2/y", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs(), &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    assert_eq!(http_client.call_count(), 0, "http client must not be invoked for a forbidden route");
    let published = pool.published_events();
    let response = requester.decode_response(&published[0]);
    assert_eq!(response.status, Some(403));
    assert_eq!(response.body_base64, STANDARD.encode(b"Forbidden route"));
}

#[tokio::test]
async fn multi_part_origin_body_splits_into_three_chunks() {
    let body = vec![b'x'; 40_000];
    let (pipeline, _http_client) =
        make_pipeline(vec![], HttpResponse { status: 200, headers: HashMap::new(), body: body.clone() });
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r3", "/anything", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs(), &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    let published = pool.published_events();
    assert_eq!(published.len(), 3);
    let mut responses: Vec<_> = published.iter().map(|e| requester.decode_response(e)).collect();
    responses.sort_by_key(|r| r.part_index);

    assert!(responses.iter().all(|r| r.parts == 3 && r.id == "r3"));
    assert_eq!(responses[0].status, Some(200));
    assert!(responses[1].status.is_none());
    assert!(responses[2].status.is_none());

    let total: usize = responses.iter().map(|r| STANDARD.decode(&r.body_base64).unwrap().len()).sum();
    assert_eq!(total, 40_000);
}

#[tokio::test]
async fn replay_of_same_inner_id_triggers_exactly_one_origin_call() {
    let (pipeline, http_client) = make_pipeline(vec![], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r4", "/x", "GET", "");
    let created_at = now_secs();
    let wrap1 = requester.build_wrap(&pipeline.our_public(), created_at, &inner_content);
    let wrap2 = requester.build_wrap(&pipeline.our_public(), created_at, &inner_content);

    pipeline.handle_wrap_event(&pool, wrap1).await;
    pipeline.handle_wrap_event(&pool, wrap2).await;

    assert_eq!(http_client.call_count(), 1, "the inner request id repeats, only the first wrap should dispatch");
}

#[tokio::test]
async fn stale_created_at_is_dropped_silently() {
    let (pipeline, http_client) = make_pipeline(vec![], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r5", "/x", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs() - 3600, &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    assert_eq!(http_client.call_count(), 0);
    assert!(pool.published_events().is_empty());
}

#[tokio::test]
async fn future_created_at_is_dropped_silently() {
    let (pipeline, http_client) = make_pipeline(vec![], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r6", "/x", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs() + 1200, &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    assert_eq!(http_client.call_count(), 0);
    assert!(pool.published_events().is_empty());
}

struct OverrideTransformer;
impl ResponseTransformer for OverrideTransformer {
    fn transform(&self, _input: TransformerInput<'_>) -> Option<TransformerOutput> {
        Some(TransformerOutput {
            status: 299,
            headers: HashMap::from([("x-y".to_owned(), "z".to_owned())]),
            body: b"BYE".to_vec(),
        })
    }
}

#[tokio::test]
async fn transformer_override_replaces_the_response_triple() {
    let secret = wrap_crypto::random_secret();
    let http_client = Arc::new(FakeHttpClient::new(HttpResponse::synthetic(200, "ok")));
    let config = PipelineConfig {
        destination: "http://origin.example".to_owned(),
        secret_key: secret,
        relays: vec!["wss://relay1.example".to_owned()],
        allowed_routes: vec![],
        timeout: Duration::from_millis(300_000),
    };
    let pipeline = Pipeline::new(config, http_client, Some(Arc::new(OverrideTransformer))).unwrap();
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r7", "/x", "GET", "");
    let wrap = requester.build_wrap(&pipeline.our_public(), now_secs(), &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    let published = pool.published_events();
    let response = requester.decode_response(&published[0]);
    assert_eq!(response.status, Some(299));
    assert_eq!(response.body_base64, STANDARD.encode(b"BYE"));
}

#[tokio::test]
async fn tampered_seal_signature_is_dropped_silently() {
    let (pipeline, http_client) = make_pipeline(vec![], HttpResponse::synthetic(200, "ok"));
    let requester = FakeRequester::default();
    let pool = FakeRelayPool::new(vec!["wss://relay1.example".to_owned()]);

    let inner_content = request_message_json("r8", "/x", "GET", "");
    let wrap = requester.build_wrap_with_tampered_seal(&pipeline.our_public(), now_secs(), &inner_content);
    pipeline.handle_wrap_event(&pool, wrap).await;

    assert_eq!(http_client.call_count(), 0);
    assert!(pool.published_events().is_empty());
}
