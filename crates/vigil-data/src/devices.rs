//! Device configuration schema migrations, row projections, and queries.

use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use uuid::Uuid;

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

const INSERT_DEVICE: &str = r"
    INSERT INTO devices (device_id, name, device_type, config)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (device_id) DO NOTHING
";

const SELECT_DEVICE: &str = r"
    SELECT device_id, name, device_type, config, config_version, config_pending,
           config_applied_at, last_config_check, created_at
    FROM devices
    WHERE device_id = $1
";

const SELECT_DEVICE_FOR_UPDATE: &str = r"
    SELECT device_id, name, device_type, config, config_version, config_pending,
           config_applied_at, last_config_check, created_at
    FROM devices
    WHERE device_id = $1
    FOR UPDATE
";

const APPLY_DEVICE_CONFIG: &str = r"
    UPDATE devices
    SET config = $2,
        config_pending = TRUE,
        config_version = config_version + 1
    WHERE device_id = $1
    RETURNING config_version
";

const CONFIRM_DEVICE: &str = r"
    UPDATE devices
    SET config_applied_at = now(),
        config_pending = FALSE,
        last_config_check = now()
    WHERE device_id = $1 AND config_version = $2
";

const TOUCH_LAST_CONFIG_CHECK: &str = r"
    UPDATE devices SET last_config_check = now() WHERE device_id = $1
";

const INSERT_HISTORY: &str = r"
    INSERT INTO device_config_history
        (device_id, changed_by, change_type, config_before, config_after, changes_summary)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id
";

const MARK_HISTORY_APPLIED: &str = r"
    UPDATE device_config_history
    SET applied_successfully = TRUE,
        applied_at = now()
    WHERE id = $1 AND applied_successfully IS NULL
";

const MARK_HISTORY_FAILED: &str = r"
    UPDATE device_config_history
    SET applied_successfully = FALSE,
        error_message = $2,
        applied_at = now()
    WHERE id = $1 AND applied_successfully IS NULL
";

const SELECT_HISTORY: &str = r"
    SELECT id, device_id, changed_by, change_type, config_before, config_after,
           changes_summary, applied_successfully, error_message, created_at, applied_at
    FROM device_config_history
    WHERE device_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT $2
";

const SELECT_HISTORY_ENTRY: &str = r"
    SELECT id, device_id, changed_by, change_type, config_before, config_after,
           changes_summary, applied_successfully, error_message, created_at, applied_at
    FROM device_config_history
    WHERE id = $1
";

const SELECT_PROFILES: &str = r"
    SELECT id, name, device_type, config, is_default, created_at
    FROM device_config_profiles
    WHERE $1::TEXT IS NULL OR device_type = $1 OR device_type IS NULL
    ORDER BY is_default DESC, name ASC
";

const SELECT_PROFILE: &str = r"
    SELECT id, name, device_type, config, is_default, created_at
    FROM device_config_profiles
    WHERE id = $1
";

const SELECT_DEFAULT_PROFILE: &str = r"
    SELECT id, name, device_type, config, is_default, created_at
    FROM device_config_profiles
    WHERE is_default AND (device_type = $1 OR device_type IS NULL)
    ORDER BY device_type NULLS LAST, name ASC
    LIMIT 1
";

const SELECT_FLEET_STATUS: &str = r"
    SELECT d.device_id, d.name, d.device_type, d.config_version, d.config_pending,
           d.config_applied_at, d.last_config_check,
           h.created_at AS last_change_at,
           h.applied_successfully AS last_outcome,
           h.changes_summary AS last_summary
    FROM devices d
    LEFT JOIN LATERAL (
        SELECT created_at, applied_successfully, changes_summary
        FROM device_config_history
        WHERE device_id = d.device_id
        ORDER BY created_at DESC, id DESC
        LIMIT 1
    ) h ON TRUE
    ORDER BY d.name ASC, d.device_id ASC
";

/// Apply all device configuration migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    Ok(())
}

/// Raw projection of the `devices` table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    /// External identifier reported by the device itself.
    pub device_id: String,
    /// Friendly display name.
    pub name: String,
    /// Hardware/deployment class used to scope profiles.
    pub device_type: String,
    /// Stored configuration document.
    pub config: Value,
    /// Monotonic configuration version.
    pub config_version: i64,
    /// Whether a change is awaiting device acknowledgment.
    pub config_pending: bool,
    /// Instant the device last confirmed an applied configuration.
    pub config_applied_at: Option<DateTime<Utc>>,
    /// Instant the device last polled for configuration.
    pub last_config_check: Option<DateTime<Utc>>,
    /// Registration instant.
    pub created_at: DateTime<Utc>,
}

/// Raw projection of the `device_config_history` table.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    /// Auto-generated entry identifier.
    pub id: i64,
    /// Device the entry belongs to.
    pub device_id: String,
    /// Operator who made the change; `NULL` means the system.
    pub changed_by: Option<Uuid>,
    /// Change kind label (`manual`, `profile`, `system`, `rollback`).
    pub change_type: String,
    /// Configuration snapshot before the change.
    pub config_before: Option<Value>,
    /// Configuration snapshot after the change.
    pub config_after: Value,
    /// Human-readable diff text.
    pub changes_summary: String,
    /// Outcome: `NULL` unresolved, `TRUE` applied, `FALSE` failed.
    pub applied_successfully: Option<bool>,
    /// Device-reported failure message.
    pub error_message: Option<String>,
    /// Entry creation instant.
    pub created_at: DateTime<Utc>,
    /// Instant the outcome was recorded.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Raw projection of the `device_config_profiles` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    /// Profile identifier.
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Device type the profile targets; `NULL` applies to any type.
    pub device_type: Option<String>,
    /// Stored configuration tree (full or partial).
    pub config: Value,
    /// Whether the profile is the reset target for its device type.
    pub is_default: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// One fleet status row: device state joined with its latest history entry.
#[derive(Debug, Clone, FromRow)]
pub struct FleetStatusRow {
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

/// Insert payload for a new history entry.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    /// Device the entry belongs to.
    pub device_id: &'a str,
    /// Operator who made the change; `None` means the system.
    pub changed_by: Option<Uuid>,
    /// Change kind label.
    pub change_type: &'a str,
    /// Configuration snapshot before the change.
    pub config_before: Option<&'a Value>,
    /// Configuration snapshot after the change.
    pub config_after: &'a Value,
    /// Human-readable diff text.
    pub changes_summary: &'a str,
}

/// Register a device row with its initial configuration.
///
/// Returns `false` when the device id is already registered.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub async fn insert_device<'e, E>(
    executor: E,
    device_id: &str,
    name: &str,
    device_type: &str,
    config: &Value,
) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(INSERT_DEVICE)
        .bind(device_id)
        .bind(name)
        .bind(device_type)
        .bind(config)
        .execute(executor)
        .await
        .map_err(map_query_err("insert_device"))?;
    Ok(result.rows_affected() == 1)
}

/// Fetch one device row by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_device<'e, E>(executor: E, device_id: &str) -> Result<Option<DeviceRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, DeviceRow>(SELECT_DEVICE)
        .bind(device_id)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch_device"))
}

/// Fetch one device row by id with a row lock, serializing concurrent writers.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_device_for_update<'e, E>(
    executor: E,
    device_id: &str,
) -> Result<Option<DeviceRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, DeviceRow>(SELECT_DEVICE_FOR_UPDATE)
        .bind(device_id)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch_device_for_update"))
}

/// Store a new configuration on the device row, flag it pending, and advance
/// the version counter. Returns the new version, or `None` when the device
/// does not exist.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn apply_device_config<'e, E>(
    executor: E,
    device_id: &str,
    config: &Value,
) -> Result<Option<i64>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar::<_, i64>(APPLY_DEVICE_CONFIG)
        .bind(device_id)
        .bind(config)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("apply_device_config"))
}

/// Compare-and-swap confirmation: clears the pending flag only when the
/// supplied version still matches. Returns `true` when a row was updated.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn confirm_device<'e, E>(executor: E, device_id: &str, version: i64) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(CONFIRM_DEVICE)
        .bind(device_id)
        .bind(version)
        .execute(executor)
        .await
        .map_err(map_query_err("confirm_device"))?;
    Ok(result.rows_affected() == 1)
}

/// Stamp the device's `last_config_check` column. Returns `true` when the
/// device exists.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn touch_last_config_check<'e, E>(executor: E, device_id: &str) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(TOUCH_LAST_CONFIG_CHECK)
        .bind(device_id)
        .execute(executor)
        .await
        .map_err(map_query_err("touch_last_config_check"))?;
    Ok(result.rows_affected() == 1)
}

/// Insert a history entry and return its generated id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub async fn insert_history<'e, E>(executor: E, entry: &NewHistoryEntry<'_>) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar::<_, i64>(INSERT_HISTORY)
        .bind(entry.device_id)
        .bind(entry.changed_by)
        .bind(entry.change_type)
        .bind(entry.config_before)
        .bind(entry.config_after)
        .bind(entry.changes_summary)
        .fetch_one(executor)
        .await
        .map_err(map_query_err("insert_history"))
}

/// Finalize a history entry as applied. The `IS NULL` guard keeps resolved
/// outcomes immutable; returns `true` when the entry transitioned.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn mark_history_applied<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(MARK_HISTORY_APPLIED)
        .bind(id)
        .execute(executor)
        .await
        .map_err(map_query_err("mark_history_applied"))?;
    Ok(result.rows_affected() == 1)
}

/// Finalize a history entry as failed with the device-reported message.
/// Returns `true` when the entry transitioned.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn mark_history_failed<'e, E>(executor: E, id: i64, message: &str) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(MARK_HISTORY_FAILED)
        .bind(id)
        .bind(message)
        .execute(executor)
        .await
        .map_err(map_query_err("mark_history_failed"))?;
    Ok(result.rows_affected() == 1)
}

/// Fetch a device's history, most recent first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_history<'e, E>(
    executor: E,
    device_id: &str,
    limit: i64,
) -> Result<Vec<HistoryRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, HistoryRow>(SELECT_HISTORY)
        .bind(device_id)
        .bind(limit)
        .fetch_all(executor)
        .await
        .map_err(map_query_err("fetch_history"))
}

/// Fetch one history entry by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_history_entry<'e, E>(executor: E, id: i64) -> Result<Option<HistoryRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, HistoryRow>(SELECT_HISTORY_ENTRY)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch_history_entry"))
}

/// List available profiles, optionally narrowed to a device type, defaults
/// ordered first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_profiles<'e, E>(
    executor: E,
    device_type: Option<&str>,
) -> Result<Vec<ProfileRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ProfileRow>(SELECT_PROFILES)
        .bind(device_type)
        .fetch_all(executor)
        .await
        .map_err(map_query_err("fetch_profiles"))
}

/// Fetch one profile by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_profile<'e, E>(executor: E, id: Uuid) -> Result<Option<ProfileRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ProfileRow>(SELECT_PROFILE)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch_profile"))
}

/// Fetch the default profile for a device type, preferring a type-specific
/// default over a fleet-wide one.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_default_profile<'e, E>(
    executor: E,
    device_type: &str,
) -> Result<Option<ProfileRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ProfileRow>(SELECT_DEFAULT_PROFILE)
        .bind(device_type)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch_default_profile"))
}

/// Fetch the fleet-wide status rollup, one row per device.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn fetch_fleet_status<'e, E>(executor: E) -> Result<Vec<FleetStatusRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, FleetStatusRow>(SELECT_FLEET_STATUS)
        .fetch_all(executor)
        .await
        .map_err(map_query_err("fetch_fleet_status"))
}
