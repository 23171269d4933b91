//! Configuration as a value type (spec.md §9, Design Notes).
//!
//! Both [`GatewayConfig`] and [`SupervisorConfig`] are immutable once built:
//! every field is validated once, in a constructor, and never re-read or
//! re-validated after the listener/supervisor has started. This mirrors the
//! builder-then-freeze shape `router-api` uses for its `Client` (built once
//! in `main.rs`, then shared read-only via `Arc<Mutex<_>>`).

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

/// Supplies TLS server-auth key material to the gateway listener, and
/// optionally a trust store the supervisor's health prober should use when
/// probing over HTTPS.
///
/// Implemented by the host runtime; the core never reads certificates off
/// disk itself (§6, "tlsMaterialProvider (optional)").
pub trait TlsMaterialProvider: Send + Sync {
    /// PEM-encoded certificate chain, leaf first.
    fn certificate_chain_pem(&self) -> Vec<u8>;
    /// PEM-encoded private key matching the leaf certificate.
    fn private_key_pem(&self) -> Vec<u8>;
    /// PEM-encoded CA bundle the health prober should trust. `None` falls
    /// back to the platform trust store.
    fn trust_store_pem(&self) -> Option<Vec<u8>> {
        None
    }
}

impl fmt::Debug for dyn TlsMaterialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TlsMaterialProvider")
    }
}

/// Immutable gateway configuration (spec.md §6, "Gateway" row).
#[derive(Clone)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_request_size: usize,
    pub per_endpoint_queue_capacity: usize,
    pub cors_enabled: bool,
    pub cors_allowed_origins: Vec<String>,
    pub handler_deadline: Duration,
    pub long_poll_interval: Duration,
    pub tls_material_provider: Option<Arc<dyn TlsMaterialProvider>>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_request_size", &self.max_request_size)
            .field("per_endpoint_queue_capacity", &self.per_endpoint_queue_capacity)
            .field("cors_enabled", &self.cors_enabled)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("handler_deadline", &self.handler_deadline)
            .field("long_poll_interval", &self.long_poll_interval)
            .field("tls_enabled", &self.tls_material_provider.is_some())
            .finish()
    }
}

/// Builder for [`GatewayConfig`]. Defaults match spec.md §6 exactly.
pub struct GatewayConfigBuilder {
    host: IpAddr,
    port: u16,
    max_request_size: usize,
    per_endpoint_queue_capacity: usize,
    cors_enabled: bool,
    cors_allowed_origins: Vec<String>,
    handler_deadline: Duration,
    long_poll_interval: Duration,
    tls_material_provider: Option<Arc<dyn TlsMaterialProvider>>,
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            max_request_size: 10 * 1024 * 1024,
            per_endpoint_queue_capacity: 100,
            cors_enabled: true,
            cors_allowed_origins: Vec::new(),
            handler_deadline: Duration::from_millis(5000),
            long_poll_interval: Duration::from_millis(30_000),
            tls_material_provider: None,
        }
    }
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    pub fn per_endpoint_queue_capacity(mut self, capacity: usize) -> Self {
        self.per_endpoint_queue_capacity = capacity;
        self
    }

    pub fn cors_enabled(mut self, enabled: bool) -> Self {
        self.cors_enabled = enabled;
        self
    }

    pub fn cors_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }

    pub fn handler_deadline(mut self, deadline: Duration) -> Self {
        self.handler_deadline = deadline;
        self
    }

    pub fn long_poll_interval(mut self, interval: Duration) -> Self {
        self.long_poll_interval = interval;
        self
    }

    pub fn tls_material_provider(mut self, provider: Arc<dyn TlsMaterialProvider>) -> Self {
        self.tls_material_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        if self.max_request_size == 0 {
            return Err(ConfigError::ZeroMaxRequestSize);
        }
        if self.per_endpoint_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.handler_deadline.is_zero() {
            return Err(ConfigError::ZeroHandlerDeadline);
        }
        Ok(GatewayConfig {
            host: self.host,
            port: self.port,
            max_request_size: self.max_request_size,
            per_endpoint_queue_capacity: self.per_endpoint_queue_capacity,
            cors_enabled: self.cors_enabled,
            cors_allowed_origins: self.cors_allowed_origins,
            handler_deadline: self.handler_deadline,
            long_poll_interval: self.long_poll_interval,
            tls_material_provider: self.tls_material_provider,
        })
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// `https://` iff a TLS material provider is configured (§4.5).
    pub fn base_url(&self) -> String {
        let scheme = if self.tls_material_provider.is_some() {
            "https"
        } else {
            "http"
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Immutable supervisor configuration (spec.md §6, "Supervisor" row).
#[derive(Clone)]
pub struct SupervisorConfig {
    pub executable_path: String,
    pub argument_vector: Vec<String>,
    pub environment_overlay: HashMap<String, String>,
    pub host: String,
    pub port: u16,
    pub probe_path: String,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub auto_restart: bool,
    pub max_restart_attempts: u32,
    pub stability_period: Duration,
    pub log_buffer_size: usize,
    pub tls_material_provider: Option<Arc<dyn TlsMaterialProvider>>,
}

impl fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("executable_path", &self.executable_path)
            .field("argument_vector", &self.argument_vector)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("probe_path", &self.probe_path)
            .field("probe_interval", &self.probe_interval)
            .field("probe_timeout", &self.probe_timeout)
            .field("auto_restart", &self.auto_restart)
            .field("max_restart_attempts", &self.max_restart_attempts)
            .field("stability_period", &self.stability_period)
            .field("log_buffer_size", &self.log_buffer_size)
            .field("tls_enabled", &self.tls_material_provider.is_some())
            .finish()
    }
}

pub struct SupervisorConfigBuilder {
    executable_path: String,
    argument_vector: Vec<String>,
    environment_overlay: HashMap<String, String>,
    host: String,
    port: u16,
    probe_path: String,
    probe_interval: Duration,
    probe_timeout: Duration,
    auto_restart: bool,
    max_restart_attempts: u32,
    stability_period: Duration,
    log_buffer_size: usize,
    tls_material_provider: Option<Arc<dyn TlsMaterialProvider>>,
}

impl SupervisorConfigBuilder {
    pub fn new(executable_path: impl Into<String>) -> Self {
        Self {
            executable_path: executable_path.into(),
            argument_vector: Vec::new(),
            environment_overlay: HashMap::new(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            probe_path: "/health".to_string(),
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            auto_restart: true,
            max_restart_attempts: 5,
            stability_period: Duration::from_millis(300_000),
            log_buffer_size: 1000,
            tls_material_provider: None,
        }
    }

    pub fn argument_vector(mut self, args: Vec<String>) -> Self {
        self.argument_vector = args;
        self
    }

    pub fn environment_overlay(mut self, overlay: HashMap<String, String>) -> Self {
        self.environment_overlay = overlay;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    pub fn max_restart_attempts(mut self, max: u32) -> Self {
        self.max_restart_attempts = max;
        self
    }

    pub fn stability_period(mut self, period: Duration) -> Self {
        self.stability_period = period;
        self
    }

    pub fn log_buffer_size(mut self, size: usize) -> Self {
        self.log_buffer_size = size;
        self
    }

    pub fn tls_material_provider(mut self, provider: Arc<dyn TlsMaterialProvider>) -> Self {
        self.tls_material_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<SupervisorConfig, ConfigError> {
        if self.executable_path.trim().is_empty() {
            return Err(ConfigError::EmptyExecutablePath);
        }
        if self.probe_interval.is_zero() {
            return Err(ConfigError::ZeroProbeInterval);
        }
        if self.max_restart_attempts == 0 {
            return Err(ConfigError::ZeroMaxRestartAttempts);
        }
        Ok(SupervisorConfig {
            executable_path: self.executable_path,
            argument_vector: self.argument_vector,
            environment_overlay: self.environment_overlay,
            host: self.host,
            port: self.port,
            probe_path: self.probe_path,
            probe_interval: self.probe_interval,
            probe_timeout: self.probe_timeout,
            auto_restart: self.auto_restart,
            max_restart_attempts: self.max_restart_attempts,
            stability_period: self.stability_period,
            log_buffer_size: self.log_buffer_size,
            tls_material_provider: self.tls_material_provider,
        })
    }
}

impl SupervisorConfig {
    pub fn builder(executable_path: impl Into<String>) -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::new(executable_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_config_matches_spec_defaults() {
        let cfg = GatewayConfig::builder().build().unwrap();
        assert_eq!(cfg.max_request_size, 10 * 1024 * 1024);
        assert_eq!(cfg.per_endpoint_queue_capacity, 100);
        assert!(cfg.cors_enabled);
        assert_eq!(cfg.handler_deadline, Duration::from_millis(5000));
        assert_eq!(cfg.long_poll_interval, Duration::from_millis(30_000));
        assert_eq!(cfg.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn zero_max_request_size_is_rejected() {
        let err = GatewayConfig::builder().max_request_size(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroMaxRequestSize));
    }

    #[test]
    fn empty_executable_path_is_rejected() {
        let err = SupervisorConfig::builder("").build().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyExecutablePath));
    }

    #[test]
    fn supervisor_defaults_match_spec() {
        let cfg = SupervisorConfig::builder("/usr/bin/node").build().unwrap();
        assert_eq!(cfg.max_restart_attempts, 5);
        assert_eq!(cfg.stability_period, Duration::from_millis(300_000));
    }
}
