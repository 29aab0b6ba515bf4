//! Shared API handler state.

use crate::config::SharedConfig;

/// State injected into every handler.
pub(crate) struct ApiState {
    /// Configuration backend facade.
    pub(crate) config: SharedConfig,
}

impl ApiState {
    pub(crate) const fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}
