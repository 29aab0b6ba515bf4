//! Configuration backend seam consumed by the HTTP handlers.

use std::sync::Arc;

use vigil_config::DeviceSettingsFacade;

/// Shared handle to the configuration backend. Handlers only see the facade
/// trait, which keeps them stubbable in tests.
pub type SharedConfig = Arc<dyn DeviceSettingsFacade>;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use uuid::Uuid;
    use vigil_config::{
        Ack, ChangeReceipt, ConfigError, ConfigHistoryEntry, ConfigProfile, ConfigResult,
        ConfigSchema, ConfigTree, DeviceConfig, DeviceSettingsFacade, DuplicateReport,
        FleetDevice,
    };

    /// In-memory facade returning canned data for one device.
    pub(crate) struct StubConfig {
        pub(crate) schema: ConfigSchema,
        pub(crate) device: DeviceConfig,
    }

    impl StubConfig {
        pub(crate) fn with_default_device() -> Self {
            let schema = ConfigSchema::builtin();
            let device = DeviceConfig {
                device_id: "cab-001".to_string(),
                name: "Cab 1".to_string(),
                device_type: "cabin_camera".to_string(),
                config: schema.complete(&ConfigTree::new()),
                version: 3,
                pending: false,
                applied_at: None,
                last_config_check: None,
            };
            Self { schema, device }
        }

        fn require_device(&self, device_id: &str) -> ConfigResult<DeviceConfig> {
            if device_id == self.device.device_id {
                Ok(self.device.clone())
            } else {
                Err(ConfigError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })
            }
        }
    }

    #[async_trait]
    impl DeviceSettingsFacade for StubConfig {
        async fn register_device(
            &self,
            device_id: &str,
            _name: &str,
            _device_type: &str,
        ) -> ConfigResult<DeviceConfig> {
            if device_id == self.device.device_id {
                return Err(ConfigError::DeviceExists {
                    device_id: device_id.to_string(),
                });
            }
            let mut device = self.device.clone();
            device.device_id = device_id.to_string();
            Ok(device)
        }

        async fn get_device_config(&self, device_id: &str) -> ConfigResult<DeviceConfig> {
            self.require_device(device_id)
        }

        async fn device_poll_config(&self, device_id: &str) -> ConfigResult<DeviceConfig> {
            let mut device = self.require_device(device_id)?;
            device.last_config_check = Some(chrono::Utc::now());
            Ok(device)
        }

        async fn update_device_config(
            &self,
            device_id: &str,
            candidate: &ConfigTree,
            _actor: Option<Uuid>,
            _summary: Option<String>,
        ) -> ConfigResult<ChangeReceipt> {
            self.require_device(device_id)?;
            self.schema.validate(candidate)?;
            Ok(ChangeReceipt {
                history_id: 7,
                version: self.device.version + 1,
            })
        }

        async fn confirm_applied(
            &self,
            device_id: &str,
            version: i64,
            _history_id: Option<i64>,
        ) -> ConfigResult<Ack> {
            self.require_device(device_id)?;
            if version == self.device.version {
                Ok(Ack::Applied)
            } else {
                Ok(Ack::Stale)
            }
        }

        async fn report_apply_error(
            &self,
            device_id: &str,
            _message: &str,
            _history_id: Option<i64>,
        ) -> ConfigResult<()> {
            self.require_device(device_id)?;
            Ok(())
        }

        async fn apply_profile(
            &self,
            device_id: &str,
            profile_id: Uuid,
            _actor: Option<Uuid>,
        ) -> ConfigResult<ChangeReceipt> {
            self.require_device(device_id)?;
            Err(ConfigError::ProfileNotFound { profile_id })
        }

        async fn list_profiles(
            &self,
            _device_type: Option<&str>,
        ) -> ConfigResult<Vec<ConfigProfile>> {
            Ok(vec![ConfigProfile {
                id: Uuid::nil(),
                name: "Factory defaults".to_string(),
                device_type: None,
                config: ConfigTree::new(),
                is_default: true,
            }])
        }

        async fn config_history(
            &self,
            device_id: &str,
            _limit: Option<i64>,
        ) -> ConfigResult<Vec<ConfigHistoryEntry>> {
            self.require_device(device_id)?;
            Ok(Vec::new())
        }

        async fn fleet_status(&self) -> ConfigResult<Vec<FleetDevice>> {
            Ok(vec![FleetDevice {
                device_id: self.device.device_id.clone(),
                name: self.device.name.clone(),
                device_type: self.device.device_type.clone(),
                config_version: self.device.version,
                config_pending: self.device.pending,
                config_applied_at: self.device.applied_at,
                last_config_check: self.device.last_config_check,
                last_change_at: None,
                last_outcome: None,
                last_summary: None,
            }])
        }

        async fn reset_config(
            &self,
            device_id: &str,
            _actor: Option<Uuid>,
        ) -> ConfigResult<ChangeReceipt> {
            self.require_device(device_id)?;
            Ok(ChangeReceipt {
                history_id: 8,
                version: self.device.version + 1,
            })
        }

        async fn rollback_config(
            &self,
            device_id: &str,
            history_id: i64,
            _actor: Option<Uuid>,
        ) -> ConfigResult<ChangeReceipt> {
            self.require_device(device_id)?;
            Err(ConfigError::RollbackRejected {
                history_id,
                reason: "entry was never confirmed applied",
            })
        }

        async fn retry_config(
            &self,
            device_id: &str,
            _actor: Option<Uuid>,
        ) -> ConfigResult<ChangeReceipt> {
            self.require_device(device_id)?;
            Err(ConfigError::NothingPending {
                device_id: device_id.to_string(),
            })
        }

        async fn duplicate_config(
            &self,
            source_device_id: &str,
            targets: &[String],
            _actor: Option<Uuid>,
        ) -> ConfigResult<Vec<DuplicateReport>> {
            self.require_device(source_device_id)?;
            Ok(targets
                .iter()
                .map(|target| DuplicateReport {
                    device_id: target.clone(),
                    history_id: None,
                    version: None,
                    error: Some("device not found".to_string()),
                })
                .collect())
        }
    }
}
