//! Endpoint registry (spec.md §4.2).
//!
//! Owns the set of live registrations and mediates every mutation under a
//! single exclusive lock; readers (dispatch lookups) use the same
//! `parking_lot::RwLock`'s read-biased acquisition, matching the read/write
//! split `router-core`'s `service::registry` keeps between its hot-path
//! lookups and its (rare) reconfiguration writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::gateway::handler::RequestHandler;
use crate::gateway::metrics::EndpointMetrics;
use crate::gateway::pattern::{split_path, EndpointPattern};
use crate::gateway::queue::RequestQueue;
use crate::gateway::response::GatewayResponse;

/// Path prefixes the gateway owns; registration of a pattern whose first
/// segment is one of these is rejected (spec.md §4.5, §6).
pub const RESERVED_PREFIXES: &[&str] = &["_internal", "_metrics", "openapi.json", "swagger"];

/// A response the gateway emits immediately after a successful `offer` onto
/// a queued endpoint's queue (§3 `EndpointRegistration`).
#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    pub status: u16,
    pub body: Option<Vec<u8>>,
    pub headers: HashMap<String, String>,
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status: 202,
            body: None,
            headers: HashMap::new(),
        }
    }
}

impl ResponseTemplate {
    pub fn to_response(&self) -> GatewayResponse {
        let mut response = GatewayResponse::new(self.status, self.body.clone().unwrap_or_default());
        for (name, value) in &self.headers {
            response = response.with_header(name.clone(), value.clone());
        }
        response
    }
}

/// The tagged union of how a registration delivers requests (spec.md §9,
/// Design Notes: "Registration variants"). A handler registration is
/// strictly synchronous; a queue may not coexist with a handler on the same
/// registration (§9, Open Question 3).
pub enum RegistrationKind {
    Synchronous(Arc<dyn RequestHandler>),
    Queued {
        queue: Arc<RequestQueue>,
        response_template: ResponseTemplate,
    },
}

pub struct EndpointRegistration {
    pattern: EndpointPattern,
    kind: RegistrationKind,
    metrics: Arc<EndpointMetrics>,
    sequence: u64,
}

impl EndpointRegistration {
    pub fn pattern(&self) -> &EndpointPattern {
        &self.pattern
    }

    pub fn kind(&self) -> &RegistrationKind {
        &self.kind
    }

    pub fn metrics(&self) -> &Arc<EndpointMetrics> {
        &self.metrics
    }
}

/// An owned, lock-free copy of how to dispatch a matched request, returned
/// by [`EndpointRegistry::dispatchable_for`].
pub enum DispatchTarget {
    Synchronous(Arc<dyn RequestHandler>),
    Queued {
        queue: Arc<RequestQueue>,
        response_template: ResponseTemplate,
    },
}

#[derive(Default)]
pub struct EndpointRegistry {
    registrations: RwLock<Vec<EndpointRegistration>>,
    sequence: AtomicU64,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_reserved(pattern: &EndpointPattern) -> Result<(), RegistryError> {
        let first_segment = split_path(pattern.as_str()).first().copied().unwrap_or("");
        if RESERVED_PREFIXES.contains(&first_segment) {
            Err(RegistryError::ReservedPrefix(pattern.as_str().to_string()))
        } else {
            Ok(())
        }
    }

    /// Registers a synchronous handler. Rejects conflicting patterns,
    /// invalid patterns, and reserved prefixes (§4.2).
    pub fn register_handler(
        &self,
        pattern_source: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), RegistryError> {
        let pattern = EndpointPattern::compile(pattern_source)?;
        self.insert(pattern, RegistrationKind::Synchronous(handler))
    }

    /// Registers a queued endpoint with the given bounded capacity and
    /// response template (§4.2, §3).
    pub fn register_queue(
        &self,
        pattern_source: &str,
        queue_capacity: usize,
        response_template: ResponseTemplate,
    ) -> Result<Arc<RequestQueue>, RegistryError> {
        let pattern = EndpointPattern::compile(pattern_source)?;
        let queue = RequestQueue::new(queue_capacity.max(1));
        self.insert(
            pattern,
            RegistrationKind::Queued {
                queue: Arc::clone(&queue),
                response_template,
            },
        )?;
        Ok(queue)
    }

    fn insert(&self, pattern: EndpointPattern, kind: RegistrationKind) -> Result<(), RegistryError> {
        Self::check_reserved(&pattern)?;
        let mut guard = self.registrations.write();
        if let Some(existing) = guard.iter().find(|r| r.pattern.conflicts_with(&pattern)) {
            return Err(RegistryError::EndpointAlreadyRegistered(
                existing.pattern.as_str().to_string(),
            ));
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        guard.push(EndpointRegistration {
            pattern,
            kind,
            metrics: Arc::new(EndpointMetrics::new()),
            sequence,
        });
        Ok(())
    }

    /// Idempotent: unregistering an absent pattern is a no-op. Drops any
    /// queued-but-undelivered requests, logging the count at warn level
    /// (§4.2).
    pub fn unregister(&self, pattern_source: &str) {
        let Ok(pattern) = EndpointPattern::compile(pattern_source) else {
            return;
        };
        let mut guard = self.registrations.write();
        if let Some(pos) = guard.iter().position(|r| r.pattern == pattern) {
            let removed = guard.remove(pos);
            if let RegistrationKind::Queued { queue, .. } = &removed.kind {
                let dropped = queue.drain_all();
                if !dropped.is_empty() {
                    log::warn!(
                        "unregistered endpoint '{}' discarded {} undelivered request(s)",
                        removed.pattern,
                        dropped.len()
                    );
                }
            }
        }
    }

    /// Drops every active registration and discards any undelivered queued
    /// requests, logging the dropped count per endpoint exactly as
    /// `unregister` does. Used by the listener's `stop()` to clean up every
    /// registration's resources (spec.md §4.5).
    pub fn clear(&self) {
        let mut guard = self.registrations.write();
        for registration in guard.drain(..) {
            if let RegistrationKind::Queued { queue, .. } = &registration.kind {
                let dropped = queue.drain_all();
                if !dropped.is_empty() {
                    log::warn!(
                        "listener shutdown discarded {} undelivered request(s) from '{}'",
                        dropped.len(),
                        registration.pattern
                    );
                }
            }
        }
    }

    /// Finds the most-specific registration matching `path`, per the
    /// specificity ordering of §4.1. Returns `None` if nothing matches.
    pub fn lookup(&self, path: &str) -> Option<(EndpointPatternRef, HashMap<String, String>)> {
        let segments = split_path(path);
        let guard = self.registrations.read();
        let mut best: Option<(&EndpointRegistration, HashMap<String, String>)> = None;
        for registration in guard.iter() {
            if let Some(bindings) = registration.pattern.matches(&segments) {
                best = match best {
                    None => Some((registration, bindings)),
                    Some((current_best, current_bindings)) => {
                        if registration.pattern.specificity_cmp(current_best.pattern()) == std::cmp::Ordering::Less
                        {
                            Some((registration, bindings))
                        } else {
                            Some((current_best, current_bindings))
                        }
                    }
                };
            }
        }
        best.map(|(registration, bindings)| (EndpointPatternRef::from(registration), bindings))
    }

    /// Clones out the dispatchable shape (handler, or queue + response
    /// template) for an already-matched pattern string. Kept as a separate
    /// step from [`Self::lookup`] so the dispatcher never holds the
    /// registry's read lock across an `await` on a handler invocation.
    pub fn dispatchable_for(&self, pattern_source: &str) -> Option<DispatchTarget> {
        let guard = self.registrations.read();
        let registration = guard.iter().find(|r| r.pattern.as_str() == pattern_source)?;
        Some(match &registration.kind {
            RegistrationKind::Synchronous(handler) => DispatchTarget::Synchronous(Arc::clone(handler)),
            RegistrationKind::Queued { queue, response_template } => DispatchTarget::Queued {
                queue: Arc::clone(queue),
                response_template: response_template.clone(),
            },
        })
    }

    /// Snapshot of active patterns, newest-registration-last, for the
    /// metrics surface and diagnostics (§4.2 `list()`).
    pub fn list(&self) -> Vec<String> {
        let mut guard: Vec<&EndpointRegistration> = self.registrations.read().iter().collect::<Vec<_>>();
        guard.sort_by_key(|r| r.sequence);
        guard.iter().map(|r| r.pattern.as_str().to_string()).collect()
    }

    /// Metrics for every active endpoint, keyed by pattern string (§4.7).
    pub fn metrics_snapshot(&self) -> Vec<(String, crate::gateway::metrics::MetricsSnapshot)> {
        self.registrations
            .read()
            .iter()
            .map(|r| (r.pattern.as_str().to_string(), r.metrics.snapshot()))
            .collect()
    }

    /// Looks up the live queue registered for `pattern_source`, for the
    /// long-poll channel (§4.6).
    pub fn queue_for(&self, pattern_source: &str) -> Option<Arc<RequestQueue>> {
        let pattern = EndpointPattern::compile(pattern_source).ok()?;
        self.registrations.read().iter().find_map(|r| {
            if r.pattern == pattern {
                if let RegistrationKind::Queued { queue, .. } = &r.kind {
                    return Some(Arc::clone(queue));
                }
            }
            None
        })
    }
}

/// A cheap owned handle to a matched registration's pattern string and
/// metrics, returned by [`EndpointRegistry::lookup`] so callers don't need
/// to hold the registry's read lock across an `await`.
pub struct EndpointPatternRef {
    pub pattern: String,
    pub metrics: Arc<EndpointMetrics>,
}

impl From<&EndpointRegistration> for EndpointPatternRef {
    fn from(registration: &EndpointRegistration) -> Self {
        Self {
            pattern: registration.pattern.as_str().to_string(),
            metrics: Arc::clone(&registration.metrics),
        }
    }
}
