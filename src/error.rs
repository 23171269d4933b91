//! Error taxonomy for the gateway and supervisor cores.
//!
//! Mirrors the shape of `router_api::client::error::ClientError`: one
//! `thiserror` enum per subsystem, `#[from]` conversions for the I/O errors
//! that actually occur at the boundary, and no silent `unwrap`s further in.

use thiserror::Error;

/// Errors raised while building a [`crate::config::GatewayConfig`] or
/// [`crate::config::SupervisorConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("maxRequestSize must be greater than zero")]
    ZeroMaxRequestSize,
    #[error("perEndpointQueueCapacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("handlerDeadlineMillis must be greater than zero")]
    ZeroHandlerDeadline,
    #[error("executablePath must not be empty")]
    EmptyExecutablePath,
    #[error("probeIntervalMillis must be greater than zero")]
    ZeroProbeInterval,
    #[error("maxRestartAttempts must be greater than zero")]
    ZeroMaxRestartAttempts,
}

/// Errors raised by pattern compilation (§4.1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must not be empty")]
    Empty,
    #[error("pattern segment at position {0} is empty")]
    EmptySegment(usize),
    #[error("parameter name at position {0} is empty")]
    EmptyParameterName(usize),
}

/// Errors raised by [`crate::gateway::registry::EndpointRegistry`] operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),
    #[error("a conflicting pattern is already registered: {0}")]
    EndpointAlreadyRegistered(String),
    #[error("pattern '{0}' collides with a reserved gateway prefix")]
    ReservedPrefix(String),
}

/// Errors surfaced while turning a raw connection into a [`crate::gateway::request::GatewayRequest`]
/// (§4.3) or while dispatching it (§4.4).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("no endpoint matches the request path")]
    NoMatch,
    #[error("request body of {0} bytes exceeds the configured maximum of {1} bytes")]
    PayloadTooLarge(usize, usize),
    #[error("registered handler failed: {0}")]
    RequestProcessing(String),
    #[error("registered handler exceeded its deadline")]
    HandlerDeadlineExceeded,
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the process supervisor (§4.9, §7).
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[from] std::io::Error),
    #[error("health probe request failed: {0}")]
    ProbeFailed(String),
    #[error("health probe timed out after {0:?}")]
    ProbeTimedOut(std::time::Duration),
    #[error("supervisor already started")]
    AlreadyStarted,
    #[error("supervisor is not running")]
    NotRunning,
    #[error("restart attempts exhausted ({0} attempts); supervisor is FAILED")]
    RestartsExhausted(u32),
}
