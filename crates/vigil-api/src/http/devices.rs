//! Admin-facing device configuration endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::http::errors::{ApiError, map_config_error};
use crate::models::{
    ActorRequest, ApplyProfileRequest, DeviceConfigResponse, DuplicateRequest, HistoryQuery,
    RegisterDeviceRequest, RollbackRequest, UpdateConfigRequest, UpdateConfigResponse,
};
use crate::state::ApiState;
use vigil_config::{ConfigHistoryEntry, DuplicateReport};

pub(crate) async fn register_device(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<DeviceConfigResponse>, ApiError> {
    let device = state
        .config
        .register_device(&request.device_id, &request.name, &request.device_type)
        .await
        .map_err(|err| map_config_error(err, "failed to register device"))?;
    Ok(Json(device.into()))
}

pub(crate) async fn get_device_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceConfigResponse>, ApiError> {
    let device = state
        .config
        .get_device_config(&device_id)
        .await
        .map_err(|err| map_config_error(err, "failed to load device configuration"))?;
    Ok(Json(device.into()))
}

pub(crate) async fn put_device_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<UpdateConfigRequest>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let receipt = state
        .config
        .update_device_config(&device_id, &request.config, request.actor, request.summary)
        .await
        .map_err(|err| map_config_error(err, "failed to update device configuration"))?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn get_config_history(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConfigHistoryEntry>>, ApiError> {
    let entries = state
        .config
        .config_history(&device_id, query.limit)
        .await
        .map_err(|err| map_config_error(err, "failed to load configuration history"))?;
    Ok(Json(entries))
}

pub(crate) async fn apply_profile(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<ApplyProfileRequest>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let receipt = state
        .config
        .apply_profile(&device_id, request.profile_id, request.actor)
        .await
        .map_err(|err| map_config_error(err, "failed to apply configuration profile"))?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn reset_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let receipt = state
        .config
        .reset_config(&device_id, request.actor)
        .await
        .map_err(|err| map_config_error(err, "failed to reset device configuration"))?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn retry_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let receipt = state
        .config
        .retry_config(&device_id, request.actor)
        .await
        .map_err(|err| map_config_error(err, "failed to re-send device configuration"))?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn rollback_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<RollbackRequest>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let receipt = state
        .config
        .rollback_config(&device_id, request.history_id, request.actor)
        .await
        .map_err(|err| map_config_error(err, "failed to roll back device configuration"))?;
    Ok(Json(receipt.into()))
}

pub(crate) async fn duplicate_config(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Json(request): Json<DuplicateRequest>,
) -> Result<Json<Vec<DuplicateReport>>, ApiError> {
    if request.targets.is_empty() {
        return Err(ApiError::bad_request("targets must not be empty"));
    }
    let reports = state
        .config
        .duplicate_config(&device_id, &request.targets, request.actor)
        .await
        .map_err(|err| map_config_error(err, "failed to duplicate device configuration"))?;
    Ok(Json(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::StubConfig;
    use axum::http::StatusCode;
    use serde_json::json;

    fn state() -> Arc<ApiState> {
        Arc::new(ApiState::new(Arc::new(StubConfig::with_default_device())))
    }

    #[tokio::test]
    async fn get_returns_the_device_snapshot() {
        let Json(body) = get_device_config(State(state()), Path("cab-001".to_string()))
            .await
            .expect("device should resolve");
        assert_eq!(body.device_id, "cab-001");
        assert_eq!(body.config_version, 3);
        assert!(body.config.get("camera", "fps").is_some());
    }

    #[tokio::test]
    async fn get_maps_unknown_devices_to_not_found() {
        let err = get_device_config(State(state()), Path("ghost".to_string()))
            .await
            .expect_err("unknown device should fail");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_rejects_rule_violations_with_pointers() {
        let request: UpdateConfigRequest =
            serde_json::from_value(json!({"config": {"camera": {"fps": 50}}}))
                .expect("request should deserialize");
        let err = put_device_config(State(state()), Path("cab-001".to_string()), Json(request))
            .await
            .expect_err("out-of-range update should fail");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        let params = err.invalid_params.expect("pointers expected");
        assert_eq!(params[0].pointer, "/camera/fps");
    }

    #[tokio::test]
    async fn put_returns_a_receipt_for_valid_updates() {
        let request: UpdateConfigRequest =
            serde_json::from_value(json!({"config": {"camera": {"fps": 20}}}))
                .expect("request should deserialize");
        let Json(body) =
            put_device_config(State(state()), Path("cab-001".to_string()), Json(request))
                .await
                .expect("valid update should succeed");
        assert_eq!(body.history_id, 7);
        assert_eq!(body.config_version, 4);
    }

    #[tokio::test]
    async fn duplicate_requires_targets() {
        let request = DuplicateRequest {
            targets: Vec::new(),
            actor: None,
        };
        let err = duplicate_config(State(state()), Path("cab-001".to_string()), Json(request))
            .await
            .expect_err("empty target list should fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn retry_without_pending_change_conflicts() {
        let err = retry_config(
            State(state()),
            Path("cab-001".to_string()),
            Json(ActorRequest::default()),
        )
        .await
        .expect_err("stub has nothing pending");
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
