//! Internal long-poll channel (spec.md §4.6).
//!
//! A thin adapter over a queue's `poll(timeout)` (§9, Design Notes) — no
//! persistent state is kept for a poller between calls.

use std::time::Duration;

use crate::gateway::registry::EndpointRegistry;
use crate::gateway::request::PollEnvelope;

/// Polls the queue registered under `pattern` for up to `timeout`.
///
/// Returns `None` when nothing arrived in time, which the HTTP layer turns
/// into a 204; returns `Some(_)` on delivery, which the HTTP layer turns
/// into 200 with the JSON envelope.
pub async fn poll_endpoint(
    registry: &EndpointRegistry,
    pattern: &str,
    timeout: Duration,
) -> Option<PollEnvelope> {
    let queue = registry.queue_for(pattern)?;
    let request = queue.poll(timeout).await?;
    Some(request.to_poll_envelope())
}
