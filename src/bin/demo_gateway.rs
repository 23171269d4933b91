//! Minimal host runtime demonstrating `app_gateway`: starts the gateway
//! core with a couple of sample endpoints and, if an executable path is
//! supplied, a supervised child process pointed at the gateway's base URL.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use app_gateway::error::GatewayError;
use app_gateway::{Gateway, GatewayConfig, GatewayRequest, GatewayResponse, RequestHandler, SupervisorConfig, Supervisor};
use async_trait::async_trait;

struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::ok_json(serde_json::json!({
            "method": request.method(),
            "path": request.path(),
            "query": request.query_params(),
        })))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("RUST_LOG", "info");
    env_logger::init();

    let matches = clap::Command::new("demo-gateway")
        .version("0.1.0")
        .about("Demo host runtime for app-gateway")
        .arg(
            clap::Arg::new("port")
                .long("port")
                .help("Port the gateway listener binds to")
                .value_name("PORT")
                .default_value("8080")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            clap::Arg::new("supervise")
                .long("supervise")
                .help("Executable to spawn and supervise, pointed at the gateway base URL")
                .value_name("PATH"),
        )
        .get_matches();

    let port = *matches.get_one::<u16>("port").unwrap();

    let config = GatewayConfig::builder()
        .host(IpAddr::from([127, 0, 0, 1]))
        .port(port)
        .build()?;
    let base_url = config.base_url();

    let gateway = Gateway::new(config);
    gateway.registry().register_handler("/api/echo", Arc::new(EchoHandler))?;
    gateway
        .registry()
        .register_queue("/api/events", 100, app_gateway::ResponseTemplate::default())?;

    log::info!(
        "starting app gateway on {base_url} with {} registered endpoint(s)",
        gateway.registry().list().len()
    );
    gateway.start().await?;

    if let Some(executable) = matches.get_one::<String>("supervise") {
        log::info!("starting supervised process: {executable}");
        let supervisor_config = SupervisorConfig::builder(executable).build()?;
        let supervisor = Arc::new(Supervisor::new(supervisor_config, base_url));
        supervisor.start().await?;

        tokio::signal::ctrl_c().await?;
        log::info!("shutting down supervisor...");
        supervisor.stop().await?;
    } else {
        tokio::signal::ctrl_c().await?;
    }

    log::info!("shutting down gateway...");
    gateway.stop(Duration::from_secs(5)).await?;
    Ok(())
}
