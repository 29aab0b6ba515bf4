//! Liveness endpoint.

use axum::Json;
use serde_json::{Value, json};

use vigil_telemetry::build_sha;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "build_sha": build_sha(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
