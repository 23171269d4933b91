//! HTTP listener (spec.md §4.5) — binds a port, optionally terminates TLS,
//! and feeds parsed requests into the [`crate::gateway::dispatcher`].
//!
//! Built on `actix-web`, matching `router_api::main`'s
//! `HttpServer::new(...).bind(...).run()` shape almost exactly; the
//! difference is that routes are not statically `#[get(...)]`-annotated
//! handlers but a single catch-all that consults the [`EndpointRegistry`]
//! at request time, since registrations are dynamic here.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::dev::ServerHandle;
use actix_web::http::header;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::StreamExt;
use parking_lot::Mutex;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::dispatcher;
use crate::gateway::registry::EndpointRegistry;
use crate::gateway::request::GatewayRequestBuilder;

struct AppState {
    registry: Arc<EndpointRegistry>,
    config: Arc<GatewayConfig>,
}

/// The gateway core's top-level handle: owns the registry and the running
/// HTTP server, if started.
pub struct Gateway {
    registry: Arc<EndpointRegistry>,
    config: Arc<GatewayConfig>,
    handle: Mutex<Option<ServerHandle>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            registry: Arc::new(EndpointRegistry::new()),
            config: Arc::new(config),
            handle: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Binds and starts serving in the background. Idempotent: calling
    /// `start` twice while already running is a no-op (§4.5).
    pub async fn start(&self) -> Result<(), GatewayError> {
        if self.handle.lock().is_some() {
            return Ok(());
        }
        let state = web::Data::new(AppState {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        });
        let addr = (self.config.host, self.config.port);
        let cors_enabled = self.config.cors_enabled;
        let allowed_origins = self.config.cors_allowed_origins.clone();

        let make_app = move || {
            let mut app = App::new().app_data(state.clone());
            if cors_enabled {
                let mut cors = Cors::default()
                    .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                    .allow_any_header()
                    .max_age(3600);
                cors = if allowed_origins.is_empty() {
                    cors.allow_any_origin()
                } else {
                    allowed_origins.iter().fold(cors, |c, origin| c.allowed_origin(origin))
                };
                app = app.wrap(cors);
            }
            app.route("/_metrics", web::get().to(metrics_handler))
                .route("/_internal/poll/{pattern:.*}", web::get().to(poll_handler))
                .route("/openapi.json", web::get().to(openapi_handler))
                .route("/swagger/", web::get().to(swagger_handler))
                .default_service(web::route().to(dispatch_handler))
        };

        let server = if let Some(provider) = &self.config.tls_material_provider {
            let acceptor = build_tls_acceptor(provider.as_ref())?;
            HttpServer::new(make_app)
                .bind_openssl(addr, acceptor)
                .map_err(GatewayError::Io)?
                .run()
        } else {
            HttpServer::new(make_app).bind(addr).map_err(GatewayError::Io)?.run()
        };

        let handle = server.handle();
        tokio::spawn(server);
        *self.handle.lock() = Some(handle);
        log::info!("gateway listening on {}", self.config.base_url());
        Ok(())
    }

    /// Drains in-flight requests for up to `grace`, then force-closes
    /// (default grace: 5s, §4.5). Also cleans up every registration's
    /// resources by clearing the registry (§4.5, "`stop` must invoke
    /// cleanup of every registration's resources").
    pub async fn stop(&self, grace: Duration) -> Result<(), GatewayError> {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(grace, handle.stop(true)).await;
        }
        self.registry.clear();
        Ok(())
    }
}

fn build_tls_acceptor(
    provider: &dyn crate::config::TlsMaterialProvider,
) -> Result<openssl::ssl::SslAcceptorBuilder, GatewayError> {
    use openssl::pkey::PKey;
    use openssl::ssl::{SslAcceptor, SslMethod};
    use openssl::x509::X509;

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())
        .map_err(|e| GatewayError::BadRequest(format!("TLS acceptor init failed: {e}")))?;
    let cert = X509::from_pem(&provider.certificate_chain_pem())
        .map_err(|e| GatewayError::BadRequest(format!("invalid certificate PEM: {e}")))?;
    let key = PKey::private_key_from_pem(&provider.private_key_pem())
        .map_err(|e| GatewayError::BadRequest(format!("invalid private key PEM: {e}")))?;
    builder
        .set_certificate(&cert)
        .map_err(|e| GatewayError::BadRequest(format!("failed to set certificate: {e}")))?;
    builder
        .set_private_key(&key)
        .map_err(|e| GatewayError::BadRequest(format!("failed to set private key: {e}")))?;
    Ok(builder)
}

async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.registry.metrics_snapshot();
    let body: serde_json::Map<String, serde_json::Value> = snapshot
        .into_iter()
        .map(|(pattern, metrics)| (pattern, serde_json::to_value(metrics).unwrap_or_default()))
        .collect();
    HttpResponse::Ok().json(body)
}

async fn poll_handler(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    // The `{pattern:.*}` tail already carries the leading `/` contributed by
    // the registered pattern itself (the route's own URL has the literal
    // "poll/" segment before it) — don't re-prepend one, or a registered
    // pattern like "/api/events" becomes the unmatchable "//api/events".
    let pattern = path.into_inner();
    let timeout = state.config.long_poll_interval;
    match crate::gateway::longpoll::poll_endpoint(&state.registry, &pattern, timeout).await {
        Some(envelope) => HttpResponse::Ok().json(envelope),
        None => HttpResponse::NoContent().finish(),
    }
}

async fn openapi_handler(state: web::Data<AppState>) -> HttpResponse {
    match crate::gateway::docs::openapi_document(&state.registry).await {
        Ok(body) => HttpResponse::Ok().content_type("application/json").body(body),
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

async fn swagger_handler() -> HttpResponse {
    match crate::gateway::docs::swagger_page().await {
        Ok(body) => HttpResponse::Ok().content_type("text/html").body(body),
        Err(_) => HttpResponse::InternalServerError().finish(),
    }
}

async fn dispatch_handler(
    req: HttpRequest,
    mut payload: web::Payload,
    state: web::Data<AppState>,
) -> HttpResponse {
    let max_size = state.config.max_request_size;

    // Resolve the registration before enforcing the body-size cap: spec.md
    // §4.4 puts the size check in state MATCHED, after lookup, specifically
    // so a 413 rejection has an endpoint to record `failed += 1` against
    // (§7, S3). A path with no matching endpoint has no metrics to update;
    // it still gets the same early 413 if oversized, just unattributed.
    let matched = state.registry.lookup(req.path());

    if let Some(declared) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > max_size {
            record_oversized_rejection(&matched);
            return to_http(crate::gateway::response::GatewayResponse::payload_too_large(max_size));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(err) => {
                // Transport errors (client disconnect mid-read) are a distinct
                // category from request errors (spec.md §7): info level, not
                // folded into the 4xx bucket.
                log::info!("transport error reading body for '{}': {err}", req.path());
                return to_http(crate::gateway::response::GatewayResponse::client_disconnected());
            }
        };
        if body.len() + chunk.len() > max_size {
            record_oversized_rejection(&matched);
            return to_http(crate::gateway::response::GatewayResponse::payload_too_large(max_size));
        }
        body.extend_from_slice(&chunk);
    }

    let mut builder = GatewayRequestBuilder::new(req.method().as_str(), req.path())
        .body(body)
        .client_address(
            req.peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );

    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            builder = builder.header(name.as_str(), v);
        }
    }
    if let Some(content_type) = req.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        builder = builder.content_type(content_type);
    }
    for (key, value) in web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map(|q| q.into_inner())
        .unwrap_or_default()
    {
        builder = builder.query_param(key, value);
    }

    let request = match builder.build() {
        Ok(request) => request,
        Err(err) => return to_http(crate::gateway::response::GatewayResponse::bad_request(err.to_string())),
    };

    let response = dispatcher::dispatch(&state.registry, request, state.config.handler_deadline).await;
    to_http(response)
}

/// Records `total += 1` / `failed += 1` against the matched endpoint's
/// metrics for an early, pre-dispatch 413 rejection (spec.md §4.4's metrics
/// update points, S3). A no-op when nothing matched the request path.
fn record_oversized_rejection(
    matched: &Option<(crate::gateway::registry::EndpointPatternRef, std::collections::HashMap<String, String>)>,
) {
    if let Some((endpoint, _)) = matched {
        endpoint.metrics.record_received();
        endpoint.metrics.record_failure();
    }
}

fn to_http(response: crate::gateway::response::GatewayResponse) -> HttpResponse {
    let mut builder = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(response.status()).unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
    );
    for (name, value) in response.headers() {
        builder.insert_header((name.clone(), value.clone()));
    }
    builder.body(response.body().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::handler::RequestHandler;
    use crate::gateway::request::GatewayRequest;
    use crate::gateway::response::GatewayResponse;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, _request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok_json(serde_json::json!({"ok": true})))
        }
    }

    #[actix_web::test]
    async fn registered_endpoint_is_reachable_through_the_service() {
        let gateway = Gateway::new(GatewayConfig::builder().build().unwrap());
        gateway.registry().register_handler("/api/echo", Arc::new(Echo)).unwrap();
        let state = web::Data::new(AppState {
            registry: Arc::clone(gateway.registry()),
            config: Arc::new(gateway.config().clone()),
        });
        let app = actix_web::test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(dispatch_handler)),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri("/api/echo").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    }

    struct PathParamEcho;

    #[async_trait]
    impl RequestHandler for PathParamEcho {
        async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::ok_json(serde_json::json!({
                "userId": request.path_param("userId"),
            })))
        }
    }

    #[actix_web::test]
    async fn path_parameters_are_bound_through_the_real_http_path() {
        let gateway = Gateway::new(GatewayConfig::builder().build().unwrap());
        gateway
            .registry()
            .register_handler("/users/:userId", Arc::new(PathParamEcho))
            .unwrap();
        let state = web::Data::new(AppState {
            registry: Arc::clone(gateway.registry()),
            config: Arc::new(gateway.config().clone()),
        });
        let app = actix_web::test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(dispatch_handler)),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri("/users/42").to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["userId"], "42");
    }
}
