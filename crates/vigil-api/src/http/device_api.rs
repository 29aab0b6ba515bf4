//! Device-facing endpoints: configuration poll and the acknowledgment
//! protocol that closes the pending loop.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::http::errors::{ApiError, map_config_error};
use crate::models::{AckResponse, ConfirmRequest, DeviceConfigResponse, ReportErrorRequest};
use crate::state::ApiState;

/// Device poll: returns the current configuration and stamps the device's
/// `last_config_check`.
pub(crate) async fn poll_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceConfigResponse>, ApiError> {
    let device = state
        .config
        .device_poll_config(&device_id)
        .await
        .map_err(|err| map_config_error(err, "failed to serve device configuration poll"))?;
    Ok(Json(device.into()))
}

/// Device confirmation that a configuration version was applied. A stale
/// version is a success with outcome `stale`, never an error.
pub(crate) async fn confirm_applied(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let outcome = state
        .config
        .confirm_applied(&device_id, request.version, request.history_id)
        .await
        .map_err(|err| map_config_error(err, "failed to record configuration confirmation"))?;
    Ok(Json(AckResponse { outcome }))
}

/// Device report that applying a configuration failed. The device stays
/// pending; retrying is the device client's concern.
pub(crate) async fn report_apply_error(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<ReportErrorRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .config
        .report_apply_error(&device_id, &request.message, request.history_id)
        .await
        .map_err(|err| map_config_error(err, "failed to record configuration apply failure"))?;
    Ok(StatusCode::NO_CONTENT)
}
