//! Writer: appends a sonar line to the configured ConfigMap on `GET /api/v0/sonar`

use echo_sonar::blueprint::{KubeConfigMaps, SonarBlueprint};
use echo_sonar::bootstrap;
use echo_sonar::config::WriterConfig;
use echo_sonar::server::ServerTimeouts;
use kube::Client;
use tracing::{error, info};

const SERVICE_NAME: &str = "writer";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_logging();
    info!("Starting writer");

    let config = match WriterConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    config.log_startup();

    // kube's TLS stack needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };
    info!("Connected to Kubernetes cluster");

    let blueprint = SonarBlueprint::new(config.configmap.clone(), KubeConfigMaps::new(client));

    let api = bootstrap::build_api(SERVICE_NAME, &config.service)?;
    let timeouts = ServerTimeouts::default();
    let router = api.register_blueprints(&[&blueprint]).handler(timeouts);

    bootstrap::serve_until_signal(router, &config.service, timeouts).await?;
    Ok(())
}
