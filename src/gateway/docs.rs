//! Optional documentation surface (spec.md §2, §6): an OpenAPI-like JSON
//! document at `/openapi.json` and a read-only HTML surface at
//! `/swagger/`, both served from embedded resources.
//!
//! Specified only because the body-size shared invariant (§4.3) also
//! governs this read path: resources are read through
//! [`crate::gateway::bounded_read::read_capped`], never `include_str!`ed
//! and handed back whole, so a corrupted or oversized embedded asset can
//! never silently balloon past the configured cap.

use crate::error::GatewayError;
use crate::gateway::bounded_read::read_capped;
use crate::gateway::registry::EndpointRegistry;

/// Default cap applied to embedded-resource reads — generous, since these
/// assets are build-time controlled, but still enforced incrementally per
/// §4.3's closing paragraph.
pub const MAX_DOCS_RESOURCE_SIZE: usize = 5 * 1024 * 1024;

/// Builds the OpenAPI-like document describing every currently registered
/// endpoint. This is generated, not a static embedded asset, but is still
/// read back through the same capped path other embedded resources use.
pub async fn openapi_document(registry: &EndpointRegistry) -> Result<Vec<u8>, GatewayError> {
    let paths: serde_json::Map<String, serde_json::Value> = registry
        .list()
        .into_iter()
        .map(|pattern| {
            (
                pattern,
                serde_json::json!({ "get": { "responses": { "200": { "description": "OK" } } } }),
            )
        })
        .collect();
    let document = serde_json::json!({
        "openapi": "3.0.0",
        "info": { "title": "app-gateway", "version": env!("CARGO_PKG_VERSION") },
        "paths": paths,
    });
    let bytes = serde_json::to_vec(&document).unwrap_or_default();
    read_capped(bytes.as_slice(), MAX_DOCS_RESOURCE_SIZE).await
}

/// The embedded static HTML page served at `/swagger/`.
const SWAGGER_HTML: &str = include_str!("../../assets/swagger.html");

pub async fn swagger_page() -> Result<Vec<u8>, GatewayError> {
    read_capped(SWAGGER_HTML.as_bytes(), MAX_DOCS_RESOURCE_SIZE).await
}
