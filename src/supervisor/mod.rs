//! Process supervisor core (spec.md §4.8, §4.9): spawns and watches an
//! external child process, capturing its logs and driving a restart policy
//! off a periodic health probe.

pub mod launcher;
pub mod logbuffer;
pub mod prober;
pub mod restart;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use launcher::LaunchedProcess;
use logbuffer::LogBuffer;
use prober::HealthProber;
use restart::RestartController;
use status::{ProcessState, ProcessStatus};

/// The delay after spawn before the first probe is issued, giving a child
/// process a chance to finish binding its own listener.
const INITIAL_PROBE_DELAY: Duration = Duration::from_millis(500);

pub struct Supervisor {
    config: SupervisorConfig,
    gateway_base_url: String,
    status: Arc<RwLock<ProcessStatus>>,
    log_buffer: Arc<LogBuffer>,
    process: Arc<tokio::sync::Mutex<Option<LaunchedProcess>>>,
    restart: Arc<tokio::sync::Mutex<RestartController>>,
    scheduler: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, gateway_base_url: impl Into<String>) -> Self {
        let log_buffer = Arc::new(LogBuffer::new(config.log_buffer_size));
        let restart = RestartController::new(config.max_restart_attempts, config.stability_period);
        Self {
            gateway_base_url: gateway_base_url.into(),
            status: Arc::new(RwLock::new(ProcessStatus::initial())),
            log_buffer,
            process: Arc::new(tokio::sync::Mutex::new(None)),
            restart: Arc::new(tokio::sync::Mutex::new(restart)),
            scheduler: tokio::sync::Mutex::new(None),
            config,
        }
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.read().clone()
    }

    pub fn log_buffer(&self) -> &Arc<LogBuffer> {
        &self.log_buffer
    }

    /// Spawns the child and starts the probe/restart scheduler. Idempotent
    /// double-start is an error (§4.9, "Resource hygiene on restart").
    pub async fn start(&self) -> Result<(), SupervisorError> {
        {
            let state = self.status.read().state;
            if matches!(state, ProcessState::Starting | ProcessState::RunningHealthy | ProcessState::RunningUnhealthy) {
                return Err(SupervisorError::AlreadyStarted);
            }
        }
        self.status.write().transition_to(ProcessState::Starting);

        let launched = launcher::spawn(&self.config, &self.gateway_base_url, Arc::clone(&self.log_buffer))?;
        self.status.write().pid = launched.pid;
        *self.process.lock().await = Some(launched);

        let scheduler = spawn_scheduler(
            self.config.clone_probe_params(),
            Arc::clone(&self.status),
            Arc::clone(&self.log_buffer),
            Arc::clone(&self.process),
            Arc::clone(&self.restart),
            self.config.clone(),
            self.gateway_base_url.clone(),
        );
        *self.scheduler.lock().await = Some(scheduler);
        Ok(())
    }

    /// Cancels the scheduler and capture tasks, then kills the child
    /// (§4.9 "STOPPED"). Idempotent.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        if let Some(handle) = self.scheduler.lock().await.take() {
            handle.abort();
        }
        if let Some(process) = self.process.lock().await.take() {
            process.teardown().await;
        }
        self.status.write().transition_to(ProcessState::Stopped);
        Ok(())
    }
}

/// Probe parameters bundled for the scheduler closure, avoiding repeated
/// config field lookups inside the loop.
struct ProbeParams {
    host: String,
    port: u16,
    probe_path: String,
    probe_interval: Duration,
    probe_timeout: Duration,
    auto_restart: bool,
}

impl SupervisorConfig {
    fn clone_probe_params(&self) -> ProbeParams {
        ProbeParams {
            host: self.host.clone(),
            port: self.port,
            probe_path: self.probe_path.clone(),
            probe_interval: self.probe_interval,
            probe_timeout: self.probe_timeout,
            auto_restart: self.auto_restart,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_scheduler(
    params: ProbeParams,
    status: Arc<RwLock<ProcessStatus>>,
    log_buffer: Arc<LogBuffer>,
    process: Arc<tokio::sync::Mutex<Option<LaunchedProcess>>>,
    restart: Arc<tokio::sync::Mutex<RestartController>>,
    config: SupervisorConfig,
    gateway_base_url: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let prober = match HealthProber::new(
            &params.host,
            params.port,
            &params.probe_path,
            params.probe_timeout,
            config.tls_material_provider.as_ref(),
        ) {
            Ok(prober) => prober,
            Err(err) => {
                log::error!("failed to build health prober: {err}");
                status.write().transition_to(ProcessState::Failed);
                return;
            }
        };

        tokio::time::sleep(INITIAL_PROBE_DELAY).await;

        loop {
            let child_exited = {
                let mut guard = process.lock().await;
                match guard.as_mut() {
                    Some(launched) => match launched.child.try_wait().ok().flatten() {
                        Some(exit_status) => {
                            status.write().last_exit_code = exit_status.code();
                            true
                        }
                        None => false,
                    },
                    None => true,
                }
            };

            let healthy = if child_exited {
                status.write().record_probe("process exited");
                false
            } else {
                let outcome = prober.probe_with_message().await;
                status.write().record_probe(outcome.message);
                outcome.healthy
            };

            let mut restart_guard = restart.lock().await;
            if healthy {
                {
                    let mut guard = status.write();
                    if guard.state == ProcessState::RunningHealthy {
                        guard.note_still_healthy();
                    } else {
                        guard.transition_to(ProcessState::RunningHealthy);
                    }
                }
                restart_guard.note_healthy();
                if restart_guard.maybe_reset() {
                    log::info!("restart counter reset after a stable uptime window");
                    status.write().restart_count = 0;
                }
            } else {
                status.write().transition_to(ProcessState::RunningUnhealthy);
                restart_guard.note_unhealthy();

                if !params.auto_restart {
                    drop(restart_guard);
                    tokio::time::sleep(params.probe_interval).await;
                    continue;
                }

                // Record the attempt before checking the cap: the restart
                // that reaches `maxRestartAttempts` is the one that trips
                // FAILED, so exhaustion is detected the same tick it
                // happens rather than on a wasted extra probe next tick
                // (spec.md §4.9, §8 invariant 8, S6 "a sixth probe is not
                // scheduled").
                restart_guard.record_attempt();
                let attempts = restart_guard.attempts();
                let exhausted = restart_guard.is_exhausted();
                drop(restart_guard);
                status.write().restart_count = attempts;

                if exhausted {
                    status.write().transition_to(ProcessState::Failed);
                    log::error!("restart attempts exhausted ({attempts}), supervisor entering FAILED");
                    return;
                }

                if let Some(previous) = process.lock().await.take() {
                    previous.teardown().await;
                }
                match launcher::spawn(&config, &gateway_base_url, Arc::clone(&log_buffer)) {
                    Ok(launched) => {
                        status.write().pid = launched.pid;
                        *process.lock().await = Some(launched);
                        status.write().transition_to(ProcessState::Starting);
                    }
                    Err(err) => {
                        log::error!("restart spawn failed: {err}");
                        status.write().transition_to(ProcessState::Failed);
                        return;
                    }
                }
            }

            tokio::time::sleep(params.probe_interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(executable: &str) -> SupervisorConfig {
        SupervisorConfig::builder(executable)
            .probe_interval(Duration::from_millis(30))
            .probe_timeout(Duration::from_millis(20))
            .max_restart_attempts(2)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn starts_in_not_started_before_start_is_called() {
        let supervisor = Supervisor::new(config("/bin/sleep"), "http://127.0.0.1:8080");
        assert_eq!(supervisor.status().state, ProcessState::NotStarted);
    }

    #[tokio::test]
    async fn start_transitions_to_starting_and_records_pid() {
        let mut cfg = config("/bin/sleep");
        cfg.argument_vector = vec!["5".to_string()];
        let supervisor = Supervisor::new(cfg, "http://127.0.0.1:8080");
        supervisor.start().await.unwrap();
        assert!(supervisor.status().pid.is_some());
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let mut cfg = config("/bin/sleep");
        cfg.argument_vector = vec!["5".to_string()];
        let supervisor = Supervisor::new(cfg, "http://127.0.0.1:8080");
        supervisor.start().await.unwrap();
        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::AlreadyStarted));
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn restart_count_is_surfaced_on_status_after_an_unhealthy_cycle() {
        let mut cfg = config("/bin/sleep");
        cfg.argument_vector = vec!["5".to_string()];
        let supervisor = Supervisor::new(cfg, "http://127.0.0.1:8080");
        supervisor.start().await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while supervisor.status().restart_count == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(supervisor.status().restart_count >= 1);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_transitions_to_stopped() {
        let mut cfg = config("/bin/sleep");
        cfg.argument_vector = vec!["5".to_string()];
        let supervisor = Supervisor::new(cfg, "http://127.0.0.1:8080");
        supervisor.start().await.unwrap();
        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.status().state, ProcessState::Stopped);
    }
}
