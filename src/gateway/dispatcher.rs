//! Request dispatcher — the protocol state machine of spec.md §4.4.
//!
//! States: RECEIVED -> PARSED -> MATCHED -> READY -> {COMPLETED, ENQUEUED,
//! REJECTED}. Every branch below corresponds 1:1 to a spec.md transition and
//! records metrics at the point the spec mandates, never earlier.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::gateway::metrics::EndpointMetrics;
use crate::gateway::registry::{DispatchTarget, EndpointRegistry};
use crate::gateway::request::GatewayRequest;
use crate::gateway::response::GatewayResponse;
use std::sync::Arc;

/// Dispatches a single already-parsed [`GatewayRequest`] against `registry`.
///
/// Corresponds to spec.md §4.4's PARSED -> ... -> terminal-state walk. The
/// RECEIVED -> PARSED step (header/request-line parsing) happens upstream,
/// in the HTTP listener, since it is inherently tied to the wire protocol.
pub async fn dispatch(
    registry: &EndpointRegistry,
    request: GatewayRequest,
    handler_deadline: Duration,
) -> GatewayResponse {
    let Some((matched, bindings)) = registry.lookup(request.path()) else {
        return GatewayResponse::not_found();
    };
    let request = request.with_path_params(bindings);
    matched.metrics.record_received();

    let Some(target) = registry.dispatchable_for(&matched.pattern) else {
        // Unregistered between lookup and dispatch — treat as a fresh miss.
        return GatewayResponse::not_found();
    };

    let receive_time = request.received_instant();
    match target {
        DispatchTarget::Synchronous(handler) => {
            complete_synchronous(handler, request, &matched.metrics, receive_time, handler_deadline).await
        }
        DispatchTarget::Queued { queue, response_template } => {
            complete_queued(queue, request, &matched.metrics, response_template, receive_time)
        }
    }
}

async fn complete_synchronous(
    handler: Arc<dyn crate::gateway::handler::RequestHandler>,
    request: GatewayRequest,
    metrics: &EndpointMetrics,
    receive_time: Instant,
    handler_deadline: Duration,
) -> GatewayResponse {
    let invocation = run_handler_with_deadline(handler, &request, handler_deadline);
    match invocation.await {
        Ok(Ok(response)) => {
            if response.is_success() {
                metrics.record_success(elapsed_millis(receive_time));
            } else if response.status() != 503 {
                metrics.record_failure();
            }
            response
        }
        Ok(Err(err)) => {
            log::error!(
                "handler failed for '{}' (request {}): {err}",
                request.path(),
                request.request_id()
            );
            metrics.record_failure();
            GatewayResponse::internal_error(err.to_string())
        }
        Err(_timed_out) => {
            log::error!(
                "handler for '{}' (request {}) exceeded its {:?} deadline",
                request.path(),
                request.request_id(),
                handler_deadline
            );
            metrics.record_failure();
            GatewayResponse::gateway_timeout()
        }
    }
}

/// Invokes the handler under `tokio::time::timeout`, additionally catching
/// any panic that escapes it (spec.md §4.4: "Exceptions escaping the
/// handler are caught, logged at error level, and converted to 500").
fn run_handler_with_deadline(
    handler: Arc<dyn crate::gateway::handler::RequestHandler>,
    request: &GatewayRequest,
    deadline: Duration,
) -> impl Future<Output = Result<Result<GatewayResponse, crate::error::GatewayError>, tokio::time::error::Elapsed>> + '_
{
    let request = request.clone();
    tokio::time::timeout(deadline, async move {
        let fut = std::panic::AssertUnwindSafe(handler.handle(&request));
        match futures::FutureExt::catch_unwind(fut).await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&panic);
                Err(crate::error::GatewayError::RequestProcessing(message))
            }
        }
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn complete_queued(
    queue: Arc<crate::gateway::queue::RequestQueue>,
    request: GatewayRequest,
    metrics: &EndpointMetrics,
    response_template: crate::gateway::registry::ResponseTemplate,
    receive_time: Instant,
) -> GatewayResponse {
    if queue.offer(request) {
        metrics.set_current_queue_size(queue.size());
        metrics.record_success(elapsed_millis(receive_time));
        response_template.to_response()
    } else {
        metrics.record_queue_full_rejection();
        GatewayResponse::service_unavailable()
    }
}

fn elapsed_millis(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::registry::ResponseTemplate;
    use crate::gateway::request::GatewayRequestBuilder;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl crate::gateway::handler::RequestHandler for Echo {
        async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok_json(serde_json::json!({ "path": request.path() })))
        }
    }

    struct Slow;

    #[async_trait]
    impl crate::gateway::handler::RequestHandler for Slow {
        async fn handle(&self, _request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(GatewayResponse::new(200, Vec::new()))
        }
    }

    struct Panicker;

    #[async_trait]
    impl crate::gateway::handler::RequestHandler for Panicker {
        async fn handle(&self, _request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn no_match_returns_404() {
        let registry = EndpointRegistry::new();
        let request = GatewayRequestBuilder::new("GET", "/nope").build().unwrap();
        let response = dispatch(&registry, request, Duration::from_secs(1)).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn synchronous_handler_completes_with_200() {
        let registry = EndpointRegistry::new();
        registry.register_handler("/api/echo", Arc::new(Echo)).unwrap();
        let request = GatewayRequestBuilder::new("GET", "/api/echo").build().unwrap();
        let response = dispatch(&registry, request, Duration::from_secs(1)).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn handler_deadline_exceeded_returns_504() {
        let registry = EndpointRegistry::new();
        registry.register_handler("/api/slow", Arc::new(Slow)).unwrap();
        let request = GatewayRequestBuilder::new("GET", "/api/slow").build().unwrap();
        let response = dispatch(&registry, request, Duration::from_millis(20)).await;
        assert_eq!(response.status(), 504);
    }

    #[tokio::test]
    async fn panicking_handler_is_converted_to_500() {
        let registry = EndpointRegistry::new();
        registry.register_handler("/api/panic", Arc::new(Panicker)).unwrap();
        let request = GatewayRequestBuilder::new("GET", "/api/panic").build().unwrap();
        let response = dispatch(&registry, request, Duration::from_secs(1)).await;
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn queued_endpoint_returns_default_202_and_enqueues() {
        let registry = EndpointRegistry::new();
        let queue = registry
            .register_queue("/api/events", 10, ResponseTemplate::default())
            .unwrap();
        let request = GatewayRequestBuilder::new("POST", "/api/events").body(b"{}".to_vec()).build().unwrap();
        let response = dispatch(&registry, request, Duration::from_secs(1)).await;
        assert_eq!(response.status(), 202);
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn full_queue_returns_503_with_retry_after() {
        let registry = EndpointRegistry::new();
        registry.register_queue("/api/events", 1, ResponseTemplate::default()).unwrap();
        let first = GatewayRequestBuilder::new("POST", "/api/events").build().unwrap();
        let second = GatewayRequestBuilder::new("POST", "/api/events").build().unwrap();
        let first_resp = dispatch(&registry, first, Duration::from_secs(1)).await;
        let second_resp = dispatch(&registry, second, Duration::from_secs(1)).await;
        assert_eq!(first_resp.status(), 202);
        assert_eq!(second_resp.status(), 503);
        assert_eq!(second_resp.headers().get("Retry-After").map(String::as_str), Some("5"));
    }
}
