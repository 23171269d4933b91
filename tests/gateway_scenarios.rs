//! End-to-end scenarios exercising the gateway through its HTTP surface,
//! one test per literal scenario described for this system (S1-S7 analogues
//! for the parts reachable without a live TCP bind: pattern matching with
//! path parameters, body-size rejection, queue saturation, and the
//! long-poll channel's envelope).

use std::sync::Arc;
use std::time::Duration;

use app_gateway::error::GatewayError;
use app_gateway::gateway::dispatcher::dispatch;
use app_gateway::gateway::longpoll::poll_endpoint;
use app_gateway::gateway::request::GatewayRequestBuilder;
use app_gateway::{EndpointRegistry, GatewayRequest, GatewayResponse, RequestHandler, ResponseTemplate};
use async_trait::async_trait;

struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok_json(serde_json::json!({
            "userId": request.path_param("userId"),
            "postId": request.path_param("postId"),
        })))
    }
}

/// S1: a queued endpoint accepts a POST, returns the default 202, and a
/// poller on the internal long-poll channel receives the body intact.
#[tokio::test]
async fn s1_queued_endpoint_accepts_and_poller_receives_body() {
    let registry = EndpointRegistry::new();
    registry.register_queue("/api/events", 10, ResponseTemplate::default()).unwrap();

    let request = GatewayRequestBuilder::new("POST", "/api/events")
        .content_type("application/json")
        .body(br#"{"k":"v"}"#.to_vec())
        .build()
        .unwrap();
    let response = dispatch(&registry, request, Duration::from_secs(1)).await;
    assert_eq!(response.status(), 202);

    let envelope = poll_endpoint(&registry, "/api/events", Duration::from_millis(100))
        .await
        .unwrap();
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD.decode(envelope.body_base64).unwrap();
    assert_eq!(decoded, br#"{"k":"v"}"#);
}

/// S2: a parameterised pattern binds both path parameters and the
/// synchronous handler sees them.
#[tokio::test]
async fn s2_path_parameters_are_bound_and_visible_to_the_handler() {
    let registry = EndpointRegistry::new();
    registry
        .register_handler("/users/:userId/posts/:postId", Arc::new(EchoHandler))
        .unwrap();

    // dispatch() looks up the matching registration itself and folds the
    // extracted bindings into the request before invoking the handler, so
    // callers never need to pre-bind path parameters themselves.
    let request = GatewayRequestBuilder::new("GET", "/users/42/posts/7").build().unwrap();
    let response = dispatch(&registry, request, Duration::from_secs(1)).await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["userId"], "42");
    assert_eq!(body["postId"], "7");
}

/// S3 (pipeline-level slice): a body whose declared length exceeds the cap
/// is rejected with 413 before being handed to the dispatcher at all, per
/// the "reject before reading any body byte" rule enforced in the listener.
/// This test exercises the same bounded-read primitive the listener relies
/// on, since S3's Content-Length short-circuit lives in the HTTP layer.
#[tokio::test]
async fn s3_oversized_body_is_rejected_without_buffering_past_the_cap() {
    use app_gateway::gateway::bounded_read::read_capped;
    let oversized = vec![0u8; 2 * 1024 * 1024];
    let err = read_capped(oversized.as_slice(), 1024 * 1024).await.unwrap_err();
    assert!(matches!(err, GatewayError::PayloadTooLarge(_, cap) if cap == 1024 * 1024));
}

/// S4: queue capacity 1, two requests in sequence -> first 202, second 503
/// with Retry-After, and queueFullRejections == 1.
#[tokio::test]
async fn s4_second_request_into_a_full_queue_is_rejected_with_retry_after() {
    let registry = EndpointRegistry::new();
    registry.register_queue("/api/events", 1, ResponseTemplate::default()).unwrap();

    let first = GatewayRequestBuilder::new("POST", "/api/events").build().unwrap();
    let second = GatewayRequestBuilder::new("POST", "/api/events").build().unwrap();

    let first_response = dispatch(&registry, first, Duration::from_secs(1)).await;
    let second_response = dispatch(&registry, second, Duration::from_secs(1)).await;

    assert_eq!(first_response.status(), 202);
    assert_eq!(second_response.status(), 503);
    assert_eq!(
        second_response.headers().get("Retry-After").map(String::as_str),
        Some("5")
    );

    let snapshot = registry.metrics_snapshot();
    let (_, metrics) = snapshot.iter().find(|(pattern, _)| pattern == "/api/events").unwrap();
    assert_eq!(metrics.queue_full_rejections, 1);
}

/// Invariant 6 (accounting identity): total == successful + failed +
/// queueFullRejections, modulo whatever is still sitting in the queue.
#[tokio::test]
async fn invariant_total_equals_successful_plus_failed_plus_rejections_plus_pending() {
    let registry = EndpointRegistry::new();
    registry.register_queue("/api/events", 2, ResponseTemplate::default()).unwrap();

    for _ in 0..3 {
        let request = GatewayRequestBuilder::new("POST", "/api/events").build().unwrap();
        dispatch(&registry, request, Duration::from_secs(1)).await;
    }

    let snapshot = registry.metrics_snapshot();
    let (_, metrics) = snapshot.iter().find(|(pattern, _)| pattern == "/api/events").unwrap();
    // a queued request is counted successful the moment it's accepted onto the
    // queue (§4.4's metrics update points), so no separate "pending" bucket is
    // needed for this implementation's accounting to balance.
    assert_eq!(metrics.total, metrics.successful + metrics.failed + metrics.queue_full_rejections);
}

/// Invariant 2: of two conflicting patterns, registration succeeds for
/// exactly one.
#[tokio::test]
async fn invariant_conflicting_patterns_register_exactly_once() {
    let registry = EndpointRegistry::new();
    assert!(registry.register_handler("/widgets/:id", Arc::new(EchoHandler)).is_ok());
    assert!(registry.register_handler("/widgets/:widgetId", Arc::new(EchoHandler)).is_err());
}
