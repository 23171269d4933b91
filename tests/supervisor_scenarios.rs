//! End-to-end supervisor scenarios driven through the real scheduler loop
//! (fast timings substituted for the spec's production defaults so these
//! stay sub-second): restart-cap exhaustion into FAILED, and continuous
//! health flipping the state machine to RUNNING_HEALTHY against a live
//! gateway instance.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use app_gateway::error::GatewayError;
use app_gateway::{Gateway, GatewayConfig, GatewayRequest, GatewayResponse, RequestHandler, Supervisor, SupervisorConfig};
use async_trait::async_trait;

struct HealthHandler;

#[async_trait]
impl RequestHandler for HealthHandler {
    async fn handle(&self, _request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::new(200, Vec::new()))
    }
}

async fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// S6: a supervised process whose probe target never comes up exhausts its
/// restart attempts and lands in FAILED, not in an infinite restart loop.
#[tokio::test]
async fn s6_restart_cap_exhaustion_drives_failed_state() {
    let config = SupervisorConfig::builder("/bin/sleep")
        .argument_vector(vec!["5".to_string()])
        .port(18199) // nothing listens here; every probe fails
        .probe_interval(Duration::from_millis(15))
        .probe_timeout(Duration::from_millis(10))
        .max_restart_attempts(1)
        .build()
        .unwrap();
    let supervisor = Arc::new(Supervisor::new(config, "http://127.0.0.1:8080"));
    supervisor.start().await.unwrap();

    let reached_failed = wait_for(
        || supervisor.status().state == app_gateway::supervisor::status::ProcessState::Failed,
        Duration::from_secs(5),
    )
    .await;
    assert!(reached_failed, "expected supervisor to reach FAILED, got {:?}", supervisor.status().state);

    assert_eq!(supervisor.status().restart_count, 1, "one restart attempt should have been recorded before exhaustion");
    supervisor.stop().await.unwrap();
}

/// S7: once a supervised process is reachable and healthy, the scheduler
/// transitions the state machine to RUNNING_HEALTHY.
#[tokio::test]
async fn s7_continuous_health_reaches_running_healthy() {
    let gateway_config = GatewayConfig::builder()
        .host(IpAddr::from([127, 0, 0, 1]))
        .port(18200)
        .build()
        .unwrap();
    let gateway = Gateway::new(gateway_config);
    gateway.registry().register_handler("/health", Arc::new(HealthHandler)).unwrap();
    gateway.start().await.unwrap();

    let supervisor_config = SupervisorConfig::builder("/bin/sleep")
        .argument_vector(vec!["5".to_string()])
        .port(18200)
        .probe_path("/health")
        .probe_interval(Duration::from_millis(15))
        .probe_timeout(Duration::from_millis(50))
        .max_restart_attempts(3)
        .build()
        .unwrap();
    let supervisor = Arc::new(Supervisor::new(supervisor_config, gateway.config().base_url()));
    supervisor.start().await.unwrap();

    let reached_healthy = wait_for(
        || supervisor.status().state == app_gateway::supervisor::status::ProcessState::RunningHealthy,
        Duration::from_secs(5),
    )
    .await;
    assert!(reached_healthy, "expected supervisor to reach RUNNING_HEALTHY, got {:?}", supervisor.status().state);

    supervisor.stop().await.unwrap();
    gateway.stop(Duration::from_secs(1)).await.unwrap();
}
