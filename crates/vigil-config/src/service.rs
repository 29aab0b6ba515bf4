//! Database-backed device configuration service.
//!
//! Layout: `schema.rs` (defaults + rules), `model.rs` (domain models),
//! `service.rs` (`DeviceSettingsFacade` + `ConfigService`: the change
//! pipeline, acknowledgment protocol, profile manager, and queries).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use vigil_data::DataError;
use vigil_data::devices::{
    self, DeviceRow, FleetStatusRow, HistoryRow, NewHistoryEntry, ProfileRow,
};

use crate::error::{ConfigError, ConfigResult};
use crate::merge::summarize_changes;
use crate::model::{
    Ack, ChangeKind, ChangeReceipt, ConfigHistoryEntry, ConfigProfile, DeviceConfig,
    DuplicateReport, FleetDevice,
};
use crate::schema::ConfigSchema;
use crate::tree::ConfigTree;

/// Default cap applied when a history query does not bound itself.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Abstraction over the configuration backend consumed by the HTTP layer.
#[async_trait]
pub trait DeviceSettingsFacade: Send + Sync {
    /// Register a device and initialize its configuration to the defaults.
    async fn register_device(
        &self,
        device_id: &str,
        name: &str,
        device_type: &str,
    ) -> ConfigResult<DeviceConfig>;

    /// Current configuration, version, and pending/applied state for a device.
    async fn get_device_config(&self, device_id: &str) -> ConfigResult<DeviceConfig>;

    /// Device-facing read: identical to [`Self::get_device_config`] but also
    /// stamps the device's `last_config_check`.
    async fn device_poll_config(&self, device_id: &str) -> ConfigResult<DeviceConfig>;

    /// Validate, complete, persist, and record a configuration change.
    async fn update_device_config(
        &self,
        device_id: &str,
        candidate: &ConfigTree,
        actor: Option<Uuid>,
        summary: Option<String>,
    ) -> ConfigResult<ChangeReceipt>;

    /// Device confirmation that a configuration version was applied.
    async fn confirm_applied(
        &self,
        device_id: &str,
        version: i64,
        history_id: Option<i64>,
    ) -> ConfigResult<Ack>;

    /// Device report that applying a configuration failed.
    async fn report_apply_error(
        &self,
        device_id: &str,
        message: &str,
        history_id: Option<i64>,
    ) -> ConfigResult<()>;

    /// Apply a named profile through the change pipeline.
    async fn apply_profile(
        &self,
        device_id: &str,
        profile_id: Uuid,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt>;

    /// List available profiles, optionally narrowed to a device type.
    async fn list_profiles(&self, device_type: Option<&str>) -> ConfigResult<Vec<ConfigProfile>>;

    /// A device's change history, most recent first.
    async fn config_history(
        &self,
        device_id: &str,
        limit: Option<i64>,
    ) -> ConfigResult<Vec<ConfigHistoryEntry>>;

    /// Fleet-wide status rollup, one row per device.
    async fn fleet_status(&self) -> ConfigResult<Vec<FleetDevice>>;

    /// Reset a device to its default configuration: the device type's default
    /// profile when one exists, otherwise the canonical schema defaults.
    async fn reset_config(
        &self,
        device_id: &str,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt>;

    /// Restore the configuration recorded by a successfully applied history
    /// entry.
    async fn rollback_config(
        &self,
        device_id: &str,
        history_id: i64,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt>;

    /// Re-send the currently stored configuration to a device stuck pending.
    async fn retry_config(
        &self,
        device_id: &str,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt>;

    /// Copy one device's configuration to each target of the same type.
    async fn duplicate_config(
        &self,
        source_device_id: &str,
        targets: &[String],
        actor: Option<Uuid>,
    ) -> ConfigResult<Vec<DuplicateReport>>;
}

/// Concrete implementation backed by `PostgreSQL` + `SQLx`.
#[derive(Clone)]
pub struct ConfigService {
    pool: PgPool,
    schema: Arc<ConfigSchema>,
}

fn tx_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> ConfigError {
    move |source| ConfigError::Persistence {
        operation,
        source: DataError::from(source),
    }
}

impl ConfigService {
    /// Establish a connection pool, apply migrations, and take ownership of
    /// the injected schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the `PostgreSQL` connection cannot be established
    /// or migrations fail to run.
    #[instrument(name = "config_service.new", skip(database_url, schema))]
    pub async fn new(database_url: &str, schema: ConfigSchema) -> ConfigResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(tx_error("connect"))?;
        Self::with_pool(pool, schema).await
    }

    /// Wrap an existing pool, applying migrations first.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail to run.
    pub async fn with_pool(pool: PgPool, schema: ConfigSchema) -> ConfigResult<Self> {
        devices::run_migrations(&pool)
            .await
            .map_err(ConfigError::persistence("run_migrations"))?;
        Ok(Self {
            pool,
            schema: Arc::new(schema),
        })
    }

    /// Access the underlying `SQLx` connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The schema this service validates and completes against.
    #[must_use]
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// The change pipeline shared by every entry point: validate, load,
    /// complete, diff, then persist the device row and history entry in one
    /// transaction.
    async fn apply_change(
        &self,
        device_id: &str,
        candidate: &ConfigTree,
        actor: Option<Uuid>,
        summary: Option<String>,
        kind: ChangeKind,
    ) -> ConfigResult<ChangeReceipt> {
        self.schema.validate(candidate)?;

        let mut tx = self.pool.begin().await.map_err(tx_error("begin"))?;
        let row = devices::fetch_device_for_update(tx.as_mut(), device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(device_id))?;

        let before = decode_stored_tree(&row)?;
        let completed = self.schema.complete(candidate);
        let summary_text =
            summary.unwrap_or_else(|| summarize_changes(&before, &completed));

        let before_value = before.to_value();
        let after_value = completed.to_value();
        let version = devices::apply_device_config(tx.as_mut(), device_id, &after_value)
            .await
            .map_err(ConfigError::persistence("apply_device_config"))?
            .ok_or_else(|| ConfigError::device_not_found(device_id))?;

        let entry = NewHistoryEntry {
            device_id,
            changed_by: actor,
            change_type: kind.as_str(),
            config_before: Some(&before_value),
            config_after: &after_value,
            changes_summary: &summary_text,
        };
        let history_id = devices::insert_history(tx.as_mut(), &entry)
            .await
            .map_err(ConfigError::persistence("insert_history"))?;

        tx.commit().await.map_err(tx_error("commit"))?;

        info!(
            device_id,
            version,
            history_id,
            change_type = kind.as_str(),
            summary = %summary_text,
            "device configuration updated"
        );
        Ok(ChangeReceipt {
            history_id,
            version,
        })
    }

    async fn duplicate_to_target(
        &self,
        source: &DeviceRow,
        source_tree: &ConfigTree,
        target: &str,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt> {
        let target_row = devices::fetch_device(&self.pool, target)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(target))?;
        if target_row.device_type != source.device_type {
            return Err(ConfigError::DeviceTypeMismatch {
                source_device: source.device_id.clone(),
                target: target.to_string(),
            });
        }
        let summary = format!("Configuration duplicated from {}", source.device_id);
        self.apply_change(target, source_tree, actor, Some(summary), ChangeKind::Manual)
            .await
    }

    fn map_device_row(&self, row: DeviceRow) -> ConfigResult<DeviceConfig> {
        let stored = decode_stored_tree(&row)?;
        // Re-completing on the way out keeps reads whole even if the schema
        // gained parameters after the row was written.
        let config = self.schema.complete(&stored);
        Ok(DeviceConfig {
            device_id: row.device_id,
            name: row.name,
            device_type: row.device_type,
            config,
            version: row.config_version,
            pending: row.config_pending,
            applied_at: row.config_applied_at,
            last_config_check: row.last_config_check,
        })
    }
}

fn decode_stored_tree(row: &DeviceRow) -> ConfigResult<ConfigTree> {
    ConfigTree::from_value(&row.config).ok_or_else(|| ConfigError::CorruptConfig {
        device_id: row.device_id.clone(),
    })
}

fn decode_profile_tree(row: &ProfileRow) -> ConfigResult<ConfigTree> {
    ConfigTree::from_value(&row.config).ok_or(ConfigError::InvalidProfile {
        profile_id: row.id,
        reason: "not a section/parameter tree of scalar values",
    })
}

fn map_history_row(row: HistoryRow) -> ConfigResult<ConfigHistoryEntry> {
    let change_type = ChangeKind::from_str(&row.change_type)?;
    let config_before = row
        .config_before
        .as_ref()
        .map(|value| {
            ConfigTree::from_value(value).ok_or_else(|| ConfigError::CorruptConfig {
                device_id: row.device_id.clone(),
            })
        })
        .transpose()?;
    let config_after =
        ConfigTree::from_value(&row.config_after).ok_or_else(|| ConfigError::CorruptConfig {
            device_id: row.device_id.clone(),
        })?;
    Ok(ConfigHistoryEntry {
        id: row.id,
        device_id: row.device_id,
        changed_by: row.changed_by,
        change_type,
        config_before,
        config_after,
        changes_summary: row.changes_summary,
        applied_successfully: row.applied_successfully,
        error_message: row.error_message,
        created_at: row.created_at,
        applied_at: row.applied_at,
    })
}

fn map_profile_row(row: ProfileRow) -> ConfigResult<ConfigProfile> {
    let config = decode_profile_tree(&row)?;
    Ok(ConfigProfile {
        id: row.id,
        name: row.name,
        device_type: row.device_type,
        config,
        is_default: row.is_default,
    })
}

fn map_fleet_row(row: FleetStatusRow) -> FleetDevice {
    FleetDevice {
        device_id: row.device_id,
        name: row.name,
        device_type: row.device_type,
        config_version: row.config_version,
        config_pending: row.config_pending,
        config_applied_at: row.config_applied_at,
        last_config_check: row.last_config_check,
        last_change_at: row.last_change_at,
        last_outcome: row.last_outcome,
        last_summary: row.last_summary,
    }
}

async fn finalize_history_applied(
    tx: &mut Transaction<'_, Postgres>,
    history_id: i64,
) -> ConfigResult<()> {
    let transitioned = devices::mark_history_applied(tx.as_mut(), history_id)
        .await
        .map_err(ConfigError::persistence("mark_history_applied"))?;
    if !transitioned {
        warn!(
            history_id,
            "confirmation referenced a missing or already-resolved history entry"
        );
    }
    Ok(())
}

#[async_trait]
impl DeviceSettingsFacade for ConfigService {
    async fn register_device(
        &self,
        device_id: &str,
        name: &str,
        device_type: &str,
    ) -> ConfigResult<DeviceConfig> {
        let defaults = self.schema.defaults().to_value();
        let inserted =
            devices::insert_device(&self.pool, device_id, name, device_type, &defaults)
                .await
                .map_err(ConfigError::persistence("insert_device"))?;
        if !inserted {
            return Err(ConfigError::DeviceExists {
                device_id: device_id.to_string(),
            });
        }
        info!(device_id, device_type, "device registered with default configuration");
        self.get_device_config(device_id).await
    }

    async fn get_device_config(&self, device_id: &str) -> ConfigResult<DeviceConfig> {
        let row = devices::fetch_device(&self.pool, device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(device_id))?;
        self.map_device_row(row)
    }

    async fn device_poll_config(&self, device_id: &str) -> ConfigResult<DeviceConfig> {
        let touched = devices::touch_last_config_check(&self.pool, device_id)
            .await
            .map_err(ConfigError::persistence("touch_last_config_check"))?;
        if !touched {
            return Err(ConfigError::device_not_found(device_id));
        }
        self.get_device_config(device_id).await
    }

    async fn update_device_config(
        &self,
        device_id: &str,
        candidate: &ConfigTree,
        actor: Option<Uuid>,
        summary: Option<String>,
    ) -> ConfigResult<ChangeReceipt> {
        let kind = if actor.is_some() {
            ChangeKind::Manual
        } else {
            ChangeKind::System
        };
        self.apply_change(device_id, candidate, actor, summary, kind)
            .await
    }

    async fn confirm_applied(
        &self,
        device_id: &str,
        version: i64,
        history_id: Option<i64>,
    ) -> ConfigResult<Ack> {
        let mut tx = self.pool.begin().await.map_err(tx_error("begin"))?;
        let matched = devices::confirm_device(tx.as_mut(), device_id, version)
            .await
            .map_err(ConfigError::persistence("confirm_device"))?;

        if matched {
            if let Some(history_id) = history_id {
                finalize_history_applied(&mut tx, history_id).await?;
            }
            tx.commit().await.map_err(tx_error("commit"))?;
            info!(device_id, version, "device confirmed configuration applied");
            return Ok(Ack::Applied);
        }

        let exists = devices::fetch_device(tx.as_mut(), device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .is_some();
        tx.rollback().await.map_err(tx_error("rollback"))?;
        if exists {
            // The device acted on state that a newer change already replaced.
            warn!(device_id, version, "stale configuration confirmation ignored");
            Ok(Ack::Stale)
        } else {
            Err(ConfigError::device_not_found(device_id))
        }
    }

    async fn report_apply_error(
        &self,
        device_id: &str,
        message: &str,
        history_id: Option<i64>,
    ) -> ConfigResult<()> {
        let exists = devices::fetch_device(&self.pool, device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .is_some();
        if !exists {
            return Err(ConfigError::device_not_found(device_id));
        }

        if let Some(history_id) = history_id {
            let transitioned =
                devices::mark_history_failed(&self.pool, history_id, message)
                    .await
                    .map_err(ConfigError::persistence("mark_history_failed"))?;
            if !transitioned {
                warn!(
                    history_id,
                    "apply failure referenced a missing or already-resolved history entry"
                );
            }
        }

        // The device stays pending; retrying is the device client's concern.
        error!(device_id, message, "device reported configuration apply failure");
        Ok(())
    }

    async fn apply_profile(
        &self,
        device_id: &str,
        profile_id: Uuid,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt> {
        let profile = devices::fetch_profile(&self.pool, profile_id)
            .await
            .map_err(ConfigError::persistence("fetch_profile"))?
            .ok_or(ConfigError::ProfileNotFound { profile_id })?;
        let tree = decode_profile_tree(&profile)?;
        let summary = format!("Applied profile: {}", profile.name);
        self.apply_change(device_id, &tree, actor, Some(summary), ChangeKind::Profile)
            .await
    }

    async fn list_profiles(&self, device_type: Option<&str>) -> ConfigResult<Vec<ConfigProfile>> {
        devices::fetch_profiles(&self.pool, device_type)
            .await
            .map_err(ConfigError::persistence("fetch_profiles"))?
            .into_iter()
            .map(map_profile_row)
            .collect()
    }

    async fn config_history(
        &self,
        device_id: &str,
        limit: Option<i64>,
    ) -> ConfigResult<Vec<ConfigHistoryEntry>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
        devices::fetch_history(&self.pool, device_id, limit)
            .await
            .map_err(ConfigError::persistence("fetch_history"))?
            .into_iter()
            .map(map_history_row)
            .collect()
    }

    async fn fleet_status(&self) -> ConfigResult<Vec<FleetDevice>> {
        Ok(devices::fetch_fleet_status(&self.pool)
            .await
            .map_err(ConfigError::persistence("fetch_fleet_status"))?
            .into_iter()
            .map(map_fleet_row)
            .collect())
    }

    async fn reset_config(
        &self,
        device_id: &str,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt> {
        let device = devices::fetch_device(&self.pool, device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(device_id))?;

        let default_profile =
            devices::fetch_default_profile(&self.pool, &device.device_type)
                .await
                .map_err(ConfigError::persistence("fetch_default_profile"))?;
        let (tree, summary) = match default_profile {
            Some(profile) => {
                let tree = decode_profile_tree(&profile)?;
                let summary = format!("Reset to defaults (profile '{}')", profile.name);
                (tree, summary)
            }
            // An empty partial completes to the canonical schema defaults.
            None => (
                ConfigTree::new(),
                "Reset to defaults (builtin schema)".to_string(),
            ),
        };
        self.apply_change(device_id, &tree, actor, Some(summary), ChangeKind::Manual)
            .await
    }

    async fn rollback_config(
        &self,
        device_id: &str,
        history_id: i64,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt> {
        let entry = devices::fetch_history_entry(&self.pool, history_id)
            .await
            .map_err(ConfigError::persistence("fetch_history_entry"))?
            .ok_or(ConfigError::HistoryNotFound { history_id })?;
        if entry.device_id != device_id {
            return Err(ConfigError::RollbackRejected {
                history_id,
                reason: "entry belongs to a different device",
            });
        }
        if entry.applied_successfully != Some(true) {
            return Err(ConfigError::RollbackRejected {
                history_id,
                reason: "entry was never confirmed applied",
            });
        }
        let tree = ConfigTree::from_value(&entry.config_after).ok_or_else(|| {
            ConfigError::CorruptConfig {
                device_id: entry.device_id.clone(),
            }
        })?;
        let summary = format!(
            "Rollback to configuration from {} ({})",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.change_type
        );
        self.apply_change(device_id, &tree, actor, Some(summary), ChangeKind::Rollback)
            .await
    }

    async fn retry_config(
        &self,
        device_id: &str,
        actor: Option<Uuid>,
    ) -> ConfigResult<ChangeReceipt> {
        let device = devices::fetch_device(&self.pool, device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(device_id))?;
        if !device.config_pending {
            return Err(ConfigError::NothingPending {
                device_id: device_id.to_string(),
            });
        }

        // The stored config is unchanged, so the version is not bumped: the
        // existing pending version remains the confirmation target.
        let entry = NewHistoryEntry {
            device_id,
            changed_by: actor,
            change_type: ChangeKind::Manual.as_str(),
            config_before: None,
            config_after: &device.config,
            changes_summary: "Configuration re-sent for retry",
        };
        let history_id = devices::insert_history(&self.pool, &entry)
            .await
            .map_err(ConfigError::persistence("insert_history"))?;
        info!(
            device_id,
            history_id,
            version = device.config_version,
            "pending configuration re-sent"
        );
        Ok(ChangeReceipt {
            history_id,
            version: device.config_version,
        })
    }

    async fn duplicate_config(
        &self,
        source_device_id: &str,
        targets: &[String],
        actor: Option<Uuid>,
    ) -> ConfigResult<Vec<DuplicateReport>> {
        let source = devices::fetch_device(&self.pool, source_device_id)
            .await
            .map_err(ConfigError::persistence("fetch_device"))?
            .ok_or_else(|| ConfigError::device_not_found(source_device_id))?;
        let source_tree = decode_stored_tree(&source)?;

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            let report = match self
                .duplicate_to_target(&source, &source_tree, target, actor)
                .await
            {
                Ok(receipt) => DuplicateReport {
                    device_id: target.clone(),
                    history_id: Some(receipt.history_id),
                    version: Some(receipt.version),
                    error: None,
                },
                Err(err) => {
                    warn!(
                        source_device_id,
                        target,
                        error = %err,
                        "configuration duplication skipped a target"
                    );
                    DuplicateReport {
                        device_id: target.clone(),
                        history_id: None,
                        version: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }
}
