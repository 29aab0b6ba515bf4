//! Fleet-wide status rollup endpoint.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::http::errors::{ApiError, map_config_error};
use crate::state::ApiState;
use vigil_config::FleetDevice;

pub(crate) async fn fleet_status(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<FleetDevice>>, ApiError> {
    let devices = state
        .config
        .fleet_status()
        .await
        .map_err(|err| map_config_error(err, "failed to load fleet status"))?;
    Ok(Json(devices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::StubConfig;

    #[tokio::test]
    async fn rollup_returns_one_row_per_device() {
        let state = Arc::new(ApiState::new(Arc::new(StubConfig::with_default_device())));
        let Json(devices) = fleet_status(State(state))
            .await
            .expect("fleet status should resolve");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "cab-001");
    }
}
