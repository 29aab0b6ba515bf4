use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing::info;
use vigil_api::ApiServer;
use vigil_config::{ConfigSchema, ConfigService};
use vigil_telemetry::LoggingConfig;

use crate::error::{AppError, AppResult};

/// Listener settings resolved from the environment.
struct ListenerConfig {
    bind_addr: IpAddr,
    port: u16,
}

impl ListenerConfig {
    fn from_env() -> AppResult<Self> {
        let bind_addr = match std::env::var("VIGIL_BIND_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| AppError::InvalidEnv {
                name: "VIGIL_BIND_ADDR",
                value: raw,
            })?,
            Err(_) => IpAddr::from([127, 0, 0, 1]),
        };
        let port = match std::env::var("VIGIL_HTTP_PORT") {
            Ok(raw) => raw.parse().map_err(|_| AppError::InvalidEnv {
                name: "VIGIL_HTTP_PORT",
                value: raw,
            })?,
            Err(_) => 8080,
        };
        Ok(Self { bind_addr, port })
    }
}

/// Entry point for the Vigil application boot sequence.
///
/// # Errors
///
/// Returns an error if environment wiring, service construction, or the API
/// listener fails.
pub async fn run_app() -> AppResult<()> {
    vigil_telemetry::init_logging(&LoggingConfig::default())
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!("Vigil application bootstrap starting");

    let database_url = std::env::var("DATABASE_URL").map_err(|_| AppError::MissingEnv {
        name: "DATABASE_URL",
    })?;
    let listener = ListenerConfig::from_env()?;

    let config = ConfigService::new(&database_url, ConfigSchema::builtin())
        .await
        .map_err(|err| AppError::config("config_service.new", err))?;
    info!("Configuration service ready; migrations applied");

    let api = ApiServer::new(Arc::new(config));
    let addr = SocketAddr::new(listener.bind_addr, listener.port);
    info!(addr = %addr, "Launching API listener");

    api.serve(addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;

    info!("API server shutdown complete");
    Ok(())
}
