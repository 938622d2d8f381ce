//! Reader: serves the configured file on `GET /api/v0/echo`

use echo_sonar::blueprint::EchoBlueprint;
use echo_sonar::bootstrap;
use echo_sonar::config::ReaderConfig;
use echo_sonar::server::ServerTimeouts;
use tracing::{error, info};

const SERVICE_NAME: &str = "reader";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_logging();
    info!("Starting reader");

    let config = match ReaderConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    config.log_startup();

    // Fatal if the file cannot be opened now; later read errors go to clients
    let blueprint = match EchoBlueprint::new(&config.file) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "Echo file is not readable");
            return Err(e.into());
        }
    };

    let api = bootstrap::build_api(SERVICE_NAME, &config.service)?;
    let timeouts = ServerTimeouts::default();
    let router = api.register_blueprints(&[&blueprint]).handler(timeouts);

    bootstrap::serve_until_signal(router, &config.service, timeouts).await?;
    Ok(())
}
