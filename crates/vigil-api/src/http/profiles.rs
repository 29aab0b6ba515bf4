//! Configuration profile endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};

use crate::http::errors::{ApiError, map_config_error};
use crate::models::ProfilesQuery;
use crate::state::ApiState;
use vigil_config::ConfigProfile;

pub(crate) async fn list_profiles(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ProfilesQuery>,
) -> Result<Json<Vec<ConfigProfile>>, ApiError> {
    let profiles = state
        .config
        .list_profiles(query.device_type.as_deref())
        .await
        .map_err(|err| map_config_error(err, "failed to list configuration profiles"))?;
    Ok(Json(profiles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::StubConfig;

    #[tokio::test]
    async fn listing_orders_defaults_first() {
        let state = Arc::new(ApiState::new(Arc::new(StubConfig::with_default_device())));
        let Json(profiles) = list_profiles(State(state), Query(ProfilesQuery::default()))
            .await
            .expect("profiles should list");
        assert_eq!(profiles.len(), 1);
        assert!(profiles[0].is_default);
        assert_eq!(profiles[0].name, "Factory defaults");
    }
}
