//! Immutable inbound request value (spec.md §3, `GatewayRequest`).
//!
//! Constructed exactly once by the request pipeline (§4.3) and never
//! mutated afterwards — every accessor below returns a borrow or a clone,
//! never a mutable reference.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct GatewayRequest {
    request_id: uuid::Uuid,
    method: String,
    path: String,
    query_params: HashMap<String, String>,
    path_params: HashMap<String, String>,
    headers: HashMap<String, String>,
    content_type: Option<String>,
    body: Vec<u8>,
    client_address: String,
    received_at: DateTime<Utc>,
    received_instant: Instant,
}

impl GatewayRequest {
    /// Assigned once, at construction time; carried through logs so a
    /// handler failure can be correlated back to the originating request
    /// (spec.md §7, "logged at error level with endpoint and request id").
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Case-insensitive header lookup; `name` is lower-cased before lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Folds the bindings produced by a pattern match into this request.
    ///
    /// The request pipeline builds a `GatewayRequest` before the dispatcher
    /// has matched it against a registration, so path parameters are not yet
    /// known at `build()` time (§4.3 constructs the request; §4.1 binds
    /// parameters during matching). This consumes and replaces the request
    /// rather than mutating it in place, preserving the "never mutated"
    /// contract as "never mutated after its final value is fixed."
    pub(crate) fn with_path_params(mut self, path_params: HashMap<String, String>) -> Self {
        self.path_params = path_params;
        self
    }

    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn received_instant(&self) -> Instant {
        self.received_instant
    }

    /// The JSON envelope shape the long-poll channel hands back to an
    /// out-of-process consumer (§4.6): attributes plus base64-encoded body.
    pub fn to_poll_envelope(&self) -> PollEnvelope {
        use base64::Engine;
        PollEnvelope {
            request_id: self.request_id,
            method: self.method.clone(),
            path: self.path.clone(),
            query_params: self.query_params.clone(),
            path_params: self.path_params.clone(),
            headers: self.headers.clone(),
            content_type: self.content_type.clone(),
            body_base64: base64::engine::general_purpose::STANDARD.encode(&self.body),
            client_address: self.client_address.clone(),
            received_at: self.received_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollEnvelope {
    pub request_id: uuid::Uuid,
    pub method: String,
    pub path: String,
    pub query_params: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub content_type: Option<String>,
    pub body_base64: String,
    pub client_address: String,
    pub received_at: DateTime<Utc>,
}

/// Builds a [`GatewayRequest`], applying the normalisation rules of §4.3:
/// percent-decoding, rejection of `..`/NUL in paths, last-wins query
/// parameters, comma-joined repeated headers.
pub struct GatewayRequestBuilder {
    method: String,
    path: String,
    query_params: HashMap<String, String>,
    path_params: HashMap<String, String>,
    headers: HashMap<String, String>,
    content_type: Option<String>,
    body: Vec<u8>,
    client_address: String,
}

impl GatewayRequestBuilder {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query_params: HashMap::new(),
            path_params: HashMap::new(),
            headers: HashMap::new(),
            content_type: None,
            body: Vec::new(),
            client_address: "unknown".to_string(),
        }
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        // Last-wins on repeats (spec.md §3).
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// Adds a header value. Repeated values for the same header are joined
    /// with `,` in received order (§4.3).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let key = name.into().to_ascii_lowercase();
        self.headers
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value.clone().into());
            })
            .or_insert_with(|| value.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = address.into();
        self
    }

    /// Percent-decodes and normalises `path`, rejecting `..` and NUL bytes.
    pub fn build(self) -> Result<GatewayRequest, GatewayError> {
        let decoded = percent_decode(&self.path)?;
        if decoded.contains('\0') {
            return Err(GatewayError::BadRequest("path contains NUL".to_string()));
        }
        if decoded.split('/').any(|segment| segment == "..") {
            return Err(GatewayError::BadRequest("path contains '..'".to_string()));
        }
        let normalised = if decoded.starts_with('/') {
            decoded
        } else {
            format!("/{decoded}")
        };

        let mut query_params = HashMap::new();
        for (k, v) in self.query_params {
            query_params.insert(percent_decode(&k)?, percent_decode(&v)?);
        }

        Ok(GatewayRequest {
            request_id: uuid::Uuid::new_v4(),
            method: self.method,
            path: normalised,
            query_params,
            path_params: self.path_params,
            headers: self.headers,
            content_type: self.content_type,
            body: self.body,
            client_address: self.client_address,
            received_at: Utc::now(),
            received_instant: Instant::now(),
        })
    }
}

/// Percent-decodes a path/query component as UTF-8; malformed sequences are
/// a `BadRequest` (§4.3).
pub fn percent_decode(input: &str) -> Result<String, GatewayError> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() {
                    return Err(GatewayError::BadRequest("truncated percent-encoding".to_string()));
                }
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .map_err(|_| GatewayError::BadRequest("invalid percent-encoding".to_string()))?;
                let value = u8::from_str_radix(hex, 16)
                    .map_err(|_| GatewayError::BadRequest("invalid percent-encoding".to_string()))?;
                decoded.push(value);
                i += 3;
            }
            other => {
                decoded.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8(decoded).map_err(|_| GatewayError::BadRequest("invalid UTF-8 in path".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decodes_path_segments() {
        let req = GatewayRequestBuilder::new("get", "/api/hello%20world").build().unwrap();
        assert_eq!(req.path(), "/api/hello world");
    }

    #[test]
    fn rejects_dot_dot_segments() {
        let err = GatewayRequestBuilder::new("GET", "/api/../etc").build().unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn rejects_malformed_percent_encoding() {
        let err = GatewayRequestBuilder::new("GET", "/api/%zz").build().unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn repeated_headers_are_comma_joined_in_received_order() {
        let req = GatewayRequestBuilder::new("GET", "/api")
            .header("X-Trace", "a")
            .header("x-trace", "b")
            .build()
            .unwrap();
        assert_eq!(req.header("X-TRACE"), Some("a,b"));
    }

    #[test]
    fn each_built_request_gets_a_distinct_request_id() {
        let a = GatewayRequestBuilder::new("GET", "/api").build().unwrap();
        let b = GatewayRequestBuilder::new("GET", "/api").build().unwrap();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn method_is_uppercased() {
        let req = GatewayRequestBuilder::new("post", "/api").build().unwrap();
        assert_eq!(req.method(), "POST");
    }
}
