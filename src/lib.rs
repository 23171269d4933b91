//! Embeddable HTTP application gateway and process supervisor.
//!
//! The two cores described in the crate's design docs are independent and
//! may be used separately: [`gateway`] fronts inbound HTTP traffic and
//! dispatches it to registered handlers or bounded queues; [`supervisor`]
//! owns the lifecycle of an external worker process. A host runtime wires
//! them together by passing the gateway's [`config::GatewayConfig::base_url`]
//! into a [`supervisor::Supervisor`] as the address the child should call
//! back into.

pub mod config;
pub mod error;
pub mod gateway;
pub mod supervisor;

pub use config::{GatewayConfig, SupervisorConfig, TlsMaterialProvider};
pub use error::{ConfigError, GatewayError, PatternError, RegistryError, SupervisorError};
pub use gateway::{EndpointRegistry, Gateway, GatewayRequest, GatewayResponse, RequestHandler, ResponseTemplate};
pub use supervisor::Supervisor;
