//! Shared HTTP DTOs for the Vigil public API.
//!
//! These types pin the wire contract; conversions from domain objects live
//! next to the server so the mapping stays a single source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_config::{Ack, ChangeReceipt, ConfigTree, DeviceConfig};

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type identifier.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable title.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Optional pointers to the offending request fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending field.
    pub pointer: String,
    /// Violation description.
    pub message: String,
}

/// Body accepted by `POST /v1/devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    /// External identifier reported by the device.
    pub device_id: String,
    /// Friendly display name.
    #[serde(default)]
    pub name: String,
    /// Hardware/deployment class used to scope profiles.
    #[serde(default = "default_device_type")]
    pub device_type: String,
}

fn default_device_type() -> String {
    "standard".to_string()
}

/// Device configuration snapshot returned by reads and the device poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfigResponse {
    /// External device identifier.
    pub device_id: String,
    /// Friendly display name.
    pub name: String,
    /// Hardware/deployment class.
    pub device_type: String,
    /// Full configuration tree.
    pub config: ConfigTree,
    /// Monotonic configuration version.
    pub config_version: i64,
    /// Whether a change is awaiting device acknowledgment.
    pub config_pending: bool,
    /// Instant the device last confirmed an applied configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_applied_at: Option<DateTime<Utc>>,
    /// Instant the device last polled for configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_config_check: Option<DateTime<Utc>>,
}

impl From<DeviceConfig> for DeviceConfigResponse {
    fn from(device: DeviceConfig) -> Self {
        Self {
            device_id: device.device_id,
            name: device.name,
            device_type: device.device_type,
            config: device.config,
            config_version: device.version,
            config_pending: device.pending,
            config_applied_at: device.applied_at,
            last_config_check: device.last_config_check,
        }
    }
}

/// Body accepted by `PUT /v1/devices/{device_id}/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    /// Partial or full configuration tree.
    pub config: ConfigTree,
    /// Operator attribution; omitted means a system change.
    #[serde(default)]
    pub actor: Option<Uuid>,
    /// Caller-supplied change summary; generated when omitted.
    #[serde(default)]
    pub summary: Option<String>,
}

/// Receipt returned after a successful change pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigResponse {
    /// History entry recorded for the change.
    pub history_id: i64,
    /// Configuration version the device must confirm.
    pub config_version: i64,
}

impl From<ChangeReceipt> for UpdateConfigResponse {
    fn from(receipt: ChangeReceipt) -> Self {
        Self {
            history_id: receipt.history_id,
            config_version: receipt.version,
        }
    }
}

/// Body accepted by `POST /device/v1/config/{device_id}/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// Version the device believes it applied.
    pub version: i64,
    /// History entry the device is confirming, when known.
    #[serde(default)]
    pub history_id: Option<i64>,
}

/// Outcome of a confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    /// `applied` when the version matched, `stale` when superseded.
    pub outcome: Ack,
}

/// Body accepted by `POST /device/v1/config/{device_id}/error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportErrorRequest {
    /// Device-reported failure description.
    pub message: String,
    /// History entry the failure belongs to, when known.
    #[serde(default)]
    pub history_id: Option<i64>,
}

/// Body accepted by `POST /v1/devices/{device_id}/config/profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyProfileRequest {
    /// Profile to apply.
    pub profile_id: Uuid,
    /// Operator attribution.
    #[serde(default)]
    pub actor: Option<Uuid>,
}

/// Body accepted by `POST /v1/devices/{device_id}/config/rollback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// History entry whose configuration should be restored.
    pub history_id: i64,
    /// Operator attribution.
    #[serde(default)]
    pub actor: Option<Uuid>,
}

/// Body accepted by reset/retry endpoints; attribution only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorRequest {
    /// Operator attribution.
    #[serde(default)]
    pub actor: Option<Uuid>,
}

/// Body accepted by `POST /v1/devices/{device_id}/config/duplicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRequest {
    /// Devices the configuration should be copied to.
    pub targets: Vec<String>,
    /// Operator attribution.
    #[serde(default)]
    pub actor: Option<Uuid>,
}

/// Query accepted by `GET /v1/devices/{device_id}/config/history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of entries to return.
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Query accepted by `GET /v1/profiles`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesQuery {
    /// Narrow results to profiles applicable to this device type.
    #[serde(default)]
    pub device_type: Option<String>,
}
