//! Synchronous-handler capability (spec.md §9, Design Notes: "Handlers as
//! capabilities, not subclasses").
//!
//! A registration's handler slot is a single-operation capability. Any host
//! runtime component that wants to register itself does so by supplying a
//! value of this trait — no inheritance chain, no base class.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::gateway::request::GatewayRequest;
use crate::gateway::response::GatewayResponse;

/// Invoked inline, on the request worker task, to produce a response.
///
/// Implementations MUST be thread-safe: multiple requests for the same
/// endpoint may invoke the same handler concurrently (§4.4).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Adapts a plain closure into a [`RequestHandler`], for host-runtime code
/// that has no natural struct to implement the trait on.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(&GatewayRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<GatewayResponse, GatewayError>> + Send,
{
    async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        (self.0)(request).await
    }
}
