//! Typed domain models for device configuration state.
//!
//! # Design
//! - Pure data carriers used by the configuration service and API.
//! - Keeps domain types separate from IO/wiring code in `service.rs`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::tree::ConfigTree;

/// Current configuration state of one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// External identifier reported by the device itself.
    pub device_id: String,
    /// Friendly display name.
    pub name: String,
    /// Hardware/deployment class used to scope profiles.
    pub device_type: String,
    /// Full configuration tree (always a superset of the canonical defaults).
    pub config: ConfigTree,
    /// Monotonic configuration version.
    pub version: i64,
    /// Whether a change is awaiting device acknowledgment.
    pub pending: bool,
    /// Instant the device last confirmed an applied configuration.
    pub applied_at: Option<DateTime<Utc>>,
    /// Instant the device last polled for configuration.
    pub last_config_check: Option<DateTime<Utc>>,
}

/// How a configuration change entered the system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// An operator edited the configuration directly.
    Manual,
    /// A named profile was applied.
    Profile,
    /// The system changed the configuration without an operator.
    System,
    /// A previous configuration was restored from history.
    Rollback,
}

impl ChangeKind {
    /// Render the kind as its lowercase storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Profile => "profile",
            Self::System => "system",
            Self::Rollback => "rollback",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "profile" => Ok(Self::Profile),
            "system" => Ok(Self::System),
            "rollback" => Ok(Self::Rollback),
            other => Err(ConfigError::InvalidChangeKind {
                value: other.to_string(),
            }),
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One recorded configuration change attempt and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigHistoryEntry {
    /// Auto-generated entry identifier.
    pub id: i64,
    /// Device the entry belongs to.
    pub device_id: String,
    /// Operator who made the change; `None` means the system.
    pub changed_by: Option<Uuid>,
    /// How the change entered the system.
    pub change_type: ChangeKind,
    /// Configuration snapshot before the change.
    pub config_before: Option<ConfigTree>,
    /// Configuration snapshot after the change.
    pub config_after: ConfigTree,
    /// Human-readable diff text.
    pub changes_summary: String,
    /// Outcome: `None` unresolved, `Some(true)` applied, `Some(false)` failed.
    pub applied_successfully: Option<bool>,
    /// Device-reported failure message.
    pub error_message: Option<String>,
    /// Entry creation instant.
    pub created_at: DateTime<Utc>,
    /// Instant the outcome was recorded.
    pub applied_at: Option<DateTime<Utc>>,
}

/// A named, reusable configuration template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigProfile {
    /// Profile identifier.
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Device type the profile targets; `None` applies to any type.
    pub device_type: Option<String>,
    /// Stored configuration tree (full or partial).
    pub config: ConfigTree,
    /// Whether the profile is the reset target for its device type.
    pub is_default: bool,
}

/// One row of the fleet-wide status rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetDevice {
    /// External device identifier.
    pub device_id: String,
    /// Friendly display name.
    pub name: String,
    /// Hardware/deployment class.
    pub device_type: String,
    /// Monotonic configuration version.
    pub config_version: i64,
    /// Whether a change is awaiting device acknowledgment.
    pub config_pending: bool,
    /// Instant the device last confirmed an applied configuration.
    pub config_applied_at: Option<DateTime<Utc>>,
    /// Instant the device last polled for configuration.
    pub last_config_check: Option<DateTime<Utc>>,
    /// Creation instant of the latest history entry.
    pub last_change_at: Option<DateTime<Utc>>,
    /// Outcome of the latest history entry.
    pub last_outcome: Option<bool>,
    /// Summary of the latest history entry.
    pub last_summary: Option<String>,
}

/// Receipt returned by a successful change pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChangeReceipt {
    /// Identifier of the history entry recorded for the change.
    pub history_id: i64,
    /// Configuration version the device must confirm.
    pub version: i64,
}

/// Outcome of a device confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Ack {
    /// The version matched; the pending flag was cleared.
    Applied,
    /// The version was superseded; the confirmation was ignored.
    Stale,
}

impl Ack {
    /// Whether the confirmation landed on the current version.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-target outcome of a configuration duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Target device identifier.
    pub device_id: String,
    /// History entry recorded when the copy succeeded.
    pub history_id: Option<i64>,
    /// New configuration version when the copy succeeded.
    pub version: Option<i64>,
    /// Failure description when the copy was rejected.
    pub error: Option<String>,
}
