//! Health prober (spec.md §4.9 "health prober").
//!
//! Issues a periodic `GET` against the configured probe path, grounded in
//! the same request-with-timeout shape `router-cli`'s HTTP client and the
//! `zleetch-rust-healthcheck` example use for their health checks: build a
//! client once, attach a per-request timeout, treat anything but a 200 as
//! unhealthy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::TlsMaterialProvider;
use crate::error::SupervisorError;

/// A reusable probe client bound to one supervised process's address and
/// TLS posture. Rebuilding a `reqwest::Client` per probe would re-resolve
/// its connection pool and TLS config every tick; built once instead.
pub struct HealthProber {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(
        host: &str,
        port: u16,
        probe_path: &str,
        timeout: Duration,
        tls_material_provider: Option<&Arc<dyn TlsMaterialProvider>>,
    ) -> Result<Self, SupervisorError> {
        let mut builder = Client::builder().timeout(timeout).connect_timeout(timeout);
        let scheme = if let Some(provider) = tls_material_provider {
            if let Some(trust_store) = provider.trust_store_pem() {
                let cert = reqwest::Certificate::from_pem(&trust_store)
                    .map_err(|e| SupervisorError::ProbeFailed(format!("invalid trust store: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            "https"
        } else {
            "http"
        };
        let client = builder
            .build()
            .map_err(|e| SupervisorError::ProbeFailed(format!("failed to build probe client: {e}")))?;
        let path = if probe_path.starts_with('/') {
            probe_path.to_string()
        } else {
            format!("/{probe_path}")
        };
        Ok(Self {
            client,
            url: format!("{scheme}://{host}:{port}{path}"),
            timeout,
        })
    }

    /// Runs one probe. Passes iff the response status is 200 (§4.9).
    pub async fn probe_once(&self) -> bool {
        self.probe_with_message().await.healthy
    }

    /// As [`Self::probe_once`], but also returns a human-readable summary of
    /// the outcome for [`crate::supervisor::status::ProcessStatus::record_probe`]
    /// (spec.md §3, "last health-probe message").
    pub async fn probe_with_message(&self) -> ProbeOutcome {
        match tokio::time::timeout(self.timeout, self.client.get(&self.url).send()).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                if status == 200 {
                    ProbeOutcome { healthy: true, message: "200 OK".to_string() }
                } else {
                    ProbeOutcome { healthy: false, message: format!("unexpected status {status}") }
                }
            }
            Ok(Err(err)) => {
                log::debug!("health probe against {} failed: {err}", self.url);
                ProbeOutcome { healthy: false, message: format!("request failed: {err}") }
            }
            Err(_) => {
                log::debug!("health probe against {} timed out", self.url);
                ProbeOutcome { healthy: false, message: "timed out".to_string() }
            }
        }
    }
}

/// The result of one health probe tick.
pub struct ProbeOutcome {
    pub healthy: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_http_url_without_tls_provider() {
        let prober = HealthProber::new("127.0.0.1", 8080, "/health", Duration::from_secs(1), None).unwrap();
        assert_eq!(prober.url, "http://127.0.0.1:8080/health");
    }

    #[test]
    fn normalises_probe_path_missing_leading_slash() {
        let prober = HealthProber::new("127.0.0.1", 8080, "health", Duration::from_secs(1), None).unwrap();
        assert_eq!(prober.url, "http://127.0.0.1:8080/health");
    }

    #[tokio::test]
    async fn probe_against_unreachable_host_fails() {
        let prober = HealthProber::new("127.0.0.1", 1, "/health", Duration::from_millis(200), None).unwrap();
        assert!(!prober.probe_once().await);
    }
}
