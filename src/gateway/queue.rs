//! Bounded per-endpoint FIFO queue (spec.md §4.2, §5).
//!
//! `offer` never blocks; `poll(timeout)` suspends the calling task until an
//! item arrives or the timeout elapses. Implemented with a `parking_lot`
//! mutex guarding a `VecDeque` plus a `tokio::sync::Notify` for wakeups —
//! the same "small lock plus a condition signal" shape `router-core`'s
//! registry uses for its in-memory routing tables, adapted here to carry a
//! block-until-available read instead of a plain snapshot read.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::gateway::request::GatewayRequest;

/// A bounded, blocking-capable FIFO queue of [`GatewayRequest`]s.
pub struct RequestQueue {
    capacity: usize,
    items: Mutex<VecDeque<GatewayRequest>>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: Notify::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.items.lock().len()
    }

    /// Non-blocking enqueue. Returns `false` iff the queue was already at
    /// capacity (spec.md invariant 4: `offer` returns `false` iff
    /// `size() == capacity`).
    pub fn offer(&self, request: GatewayRequest) -> bool {
        let mut guard = self.items.lock();
        if guard.len() >= self.capacity {
            return false;
        }
        guard.push_back(request);
        drop(guard);
        self.notify.notify_one();
        true
    }

    /// Removes and returns the oldest queued request immediately, or `None`
    /// if the queue is empty. Used by `unregister` to drain/discard.
    pub fn drain_all(&self) -> Vec<GatewayRequest> {
        let mut guard = self.items.lock();
        guard.drain(..).collect()
    }

    fn try_pop(&self) -> Option<GatewayRequest> {
        self.items.lock().pop_front()
    }

    /// Blocks (asynchronously) for up to `timeout` waiting for a request to
    /// become available, returning it FIFO-ordered. Two concurrent pollers
    /// race freely for the next item (spec.md §4.6: "at-most-once delivery").
    pub async fn poll(&self, timeout: Duration) -> Option<GatewayRequest> {
        if let Some(item) = self.try_pop() {
            return Some(item);
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            match tokio::time::timeout_at(deadline, notified).await {
                Ok(()) => {
                    if let Some(item) = self.try_pop() {
                        return Some(item);
                    }
                }
                Err(_) => return None,
            }
        }
    }
}
