//! Error types for telemetry initialisation.

use thiserror::Error;

/// Errors raised while wiring telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global tracing subscriber could not be installed.
    #[error("failed to install tracing subscriber: {detail}")]
    SubscriberInstall {
        /// Installation failure description.
        detail: String,
    },
}
