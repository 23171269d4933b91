//! Immutable outbound response value and factory constants (spec.md §3).

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    status: u16,
    body: Vec<u8>,
    headers: HashMap<String, String>,
}

impl GatewayResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    // -- Factory constants (spec.md §3) --

    pub fn ok_json(body: serde_json::Value) -> Self {
        Self::new(200, serde_json::to_vec(&body).unwrap_or_default())
            .with_header("Content-Type", "application/json")
    }

    pub fn created(location: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(201, serde_json::to_vec(&body).unwrap_or_default())
            .with_header("Content-Type", "application/json")
            .with_header("Location", location)
    }

    pub fn accepted() -> Self {
        Self::new(202, Vec::new())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, json_error(message)).with_header("Content-Type", "application/json")
    }

    pub fn not_found() -> Self {
        Self::new(404, json_error("no endpoint matches the request path"))
            .with_header("Content-Type", "application/json")
    }

    pub fn payload_too_large(max_bytes: usize) -> Self {
        Self::new(413, json_error(format!("request body exceeds {max_bytes} bytes")))
            .with_header("Content-Type", "application/json")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(500, json_error(message)).with_header("Content-Type", "application/json")
    }

    /// Backpressure signal — always carries `Retry-After: 5` by convention
    /// (spec.md §3, §7).
    pub fn service_unavailable() -> Self {
        Self::new(503, json_error("endpoint queue is full"))
            .with_header("Content-Type", "application/json")
            .with_header("Retry-After", "5")
    }

    pub fn gateway_timeout() -> Self {
        Self::new(504, json_error("handler exceeded its deadline"))
            .with_header("Content-Type", "application/json")
    }

    /// Transport error, not a request error (spec.md §7): the client went
    /// away mid-read. 499 is nginx's long-standing convention for this, kept
    /// here so these never land in the same 4xx bucket as a malformed
    /// request. The body is moot since the client already disconnected.
    pub fn client_disconnected() -> Self {
        Self::new(499, Vec::new())
    }
}

fn json_error(message: impl Into<String>) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "error": message.into() })).unwrap_or_default()
}
