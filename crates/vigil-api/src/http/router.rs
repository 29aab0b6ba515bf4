//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{Method, Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;
use vigil_telemetry::build_sha;

use crate::config::SharedConfig;
use crate::error::ApiServerError;
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::device_api::{confirm_applied, poll_config, report_apply_error};
use crate::http::devices::{
    apply_profile, duplicate_config, get_config_history, get_device_config, put_device_config,
    register_device, reset_config, retry_config, rollback_config,
};
use crate::http::fleet::fleet_status;
use crate::http::health::health;
use crate::http::profiles::list_profiles;
use crate::state::ApiState;

/// Axum router wrapper that hosts the Vigil API services.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct a new API server around the configuration backend.
    #[must_use]
    pub fn new(config: SharedConfig) -> Self {
        let state = Arc::new(ApiState::new(config));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(vigil_telemetry::propagate_request_id_layer())
            .layer(vigil_telemetry::set_request_id_layer())
            .layer(trace_layer);

        let router = Self::public_routes()
            .merge(Self::admin_routes())
            .merge(Self::device_routes())
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new().route("/health", get(health))
    }

    fn admin_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/v1/devices", post(register_device))
            .route(
                "/v1/devices/{device_id}/config",
                get(get_device_config).put(put_device_config),
            )
            .route(
                "/v1/devices/{device_id}/config/history",
                get(get_config_history),
            )
            .route("/v1/devices/{device_id}/config/profile", post(apply_profile))
            .route("/v1/devices/{device_id}/config/reset", post(reset_config))
            .route("/v1/devices/{device_id}/config/retry", post(retry_config))
            .route(
                "/v1/devices/{device_id}/config/rollback",
                post(rollback_config),
            )
            .route(
                "/v1/devices/{device_id}/config/duplicate",
                post(duplicate_config),
            )
            .route("/v1/profiles", get(list_profiles))
            .route("/v1/fleet/status", get(fleet_status))
    }

    fn device_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/device/v1/config/{device_id}", get(poll_config))
            .route(
                "/device/v1/config/{device_id}/confirm",
                post(confirm_applied),
            )
            .route(
                "/device/v1/config/{device_id}/error",
                post(report_apply_error),
            )
    }

    /// Serve the API using the configured router on the supplied address.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server
    /// terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ApiServerError> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
