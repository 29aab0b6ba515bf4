//! Error types for device configuration operations.

use thiserror::Error;
use uuid::Uuid;
use vigil_data::DataError;

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Structured errors emitted by the configuration subsystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A candidate value violated a declared rule.
    #[error("invalid value for '{parameter}' in '{section}': {reason}")]
    Validation {
        /// Section that failed validation.
        section: String,
        /// Parameter that failed validation.
        parameter: String,
        /// Human-readable description of the violated constraint.
        reason: String,
    },

    /// The referenced device is not registered.
    #[error("device '{device_id}' not found")]
    DeviceNotFound {
        /// Device identifier supplied by the caller.
        device_id: String,
    },

    /// The referenced profile does not exist.
    #[error("profile '{profile_id}' not found")]
    ProfileNotFound {
        /// Profile identifier supplied by the caller.
        profile_id: Uuid,
    },

    /// The referenced history entry does not exist.
    #[error("history entry {history_id} not found")]
    HistoryNotFound {
        /// History entry identifier supplied by the caller.
        history_id: i64,
    },

    /// A device with this identifier is already registered.
    #[error("device '{device_id}' is already registered")]
    DeviceExists {
        /// Conflicting device identifier.
        device_id: String,
    },

    /// A stored profile payload is not a section/parameter tree.
    #[error("profile '{profile_id}' holds a malformed configuration: {reason}")]
    InvalidProfile {
        /// Profile whose payload failed to decode.
        profile_id: Uuid,
        /// Decode failure description.
        reason: &'static str,
    },

    /// A stored device configuration failed to decode.
    #[error("stored configuration for device '{device_id}' is malformed")]
    CorruptConfig {
        /// Device whose stored configuration failed to decode.
        device_id: String,
    },

    /// A history entry carried an unknown change kind label.
    #[error("invalid change kind '{value}'")]
    InvalidChangeKind {
        /// Label found in storage.
        value: String,
    },

    /// The requested rollback target is not eligible.
    #[error("history entry {history_id} cannot be rolled back: {reason}")]
    RollbackRejected {
        /// History entry the caller tried to roll back to.
        history_id: i64,
        /// Why the entry is ineligible.
        reason: &'static str,
    },

    /// A retry was requested for a device with nothing pending.
    #[error("device '{device_id}' has no pending configuration")]
    NothingPending {
        /// Device identifier supplied by the caller.
        device_id: String,
    },

    /// Source and target device types differ on a duplicate request.
    #[error("device '{target}' has a different device type than '{source_device}'")]
    DeviceTypeMismatch {
        /// Device the configuration is copied from.
        source_device: String,
        /// Device the configuration would be copied to.
        target: String,
    },

    /// An underlying storage operation failed; the transaction was rolled back.
    #[error("persistence failed during {operation}")]
    Persistence {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: DataError,
    },
}

impl ConfigError {
    pub(crate) fn validation(
        section: &str,
        parameter: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            section: section.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn device_not_found(device_id: &str) -> Self {
        Self::DeviceNotFound {
            device_id: device_id.to_string(),
        }
    }

    pub(crate) fn persistence(
        operation: &'static str,
    ) -> impl FnOnce(DataError) -> Self {
        move |source| Self::Persistence { operation, source }
    }
}
