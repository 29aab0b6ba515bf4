use uuid::Uuid;
use vigil_config::{
    Ack, ChangeKind, ConfigError, ConfigSchema, ConfigService, ConfigTree, DeviceSettingsFacade,
    ParamValue,
};
use vigil_test_support::postgres::start_postgres;

async fn connect(url: &str) -> anyhow::Result<ConfigService> {
    Ok(ConfigService::new(url, ConfigSchema::builtin()).await?)
}

fn partial(section: &str, parameter: &str, value: impl Into<ParamValue>) -> ConfigTree {
    let mut tree = ConfigTree::new();
    tree.set(section, parameter, value);
    tree
}

#[tokio::test]
async fn change_pipeline_and_acknowledgments() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping change_pipeline_and_acknowledgments: {err}");
            return Ok(());
        }
    };
    let service = connect(postgres.connection_string()).await?;
    let actor = Some(Uuid::new_v4());

    let device = service
        .register_device("cab-001", "Cab 1", "cabin_camera")
        .await?;
    assert_eq!(device.version, 1);
    assert!(!device.pending);
    assert!(device.applied_at.is_none());
    assert_eq!(device.config.get("camera", "fps"), Some(&ParamValue::Int(15)));

    let dup = service
        .register_device("cab-001", "Cab 1 again", "cabin_camera")
        .await;
    assert!(matches!(dup, Err(ConfigError::DeviceExists { .. })));

    // A rejected candidate mutates nothing and records nothing.
    let rejected = service
        .update_device_config("cab-001", &partial("camera", "fps", 50), actor, None)
        .await;
    assert!(matches!(rejected, Err(ConfigError::Validation { .. })));
    assert!(service.config_history("cab-001", None).await?.is_empty());
    let unchanged = service.get_device_config("cab-001").await?;
    assert_eq!(unchanged.version, 1);
    assert!(!unchanged.pending);

    let receipt = service
        .update_device_config("cab-001", &partial("camera", "fps", 20), actor, None)
        .await?;
    assert_eq!(receipt.version, 2);

    let pending = service.get_device_config("cab-001").await?;
    assert!(pending.pending);
    assert_eq!(pending.config.get("camera", "fps"), Some(&ParamValue::Int(20)));

    let history = service.config_history("cab-001", None).await?;
    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.id, receipt.history_id);
    assert_eq!(entry.change_type, ChangeKind::Manual);
    assert!(entry.changes_summary.contains("camera.fps: 15 → 20"));
    assert!(entry.applied_successfully.is_none());
    assert_eq!(
        entry.config_before.as_ref().and_then(|c| c.get("camera", "fps")),
        Some(&ParamValue::Int(15))
    );

    // A stale confirmation is ignored, not an error.
    let stale = service.confirm_applied("cab-001", 1, None).await?;
    assert_eq!(stale, Ack::Stale);
    assert!(service.get_device_config("cab-001").await?.pending);

    let applied = service
        .confirm_applied("cab-001", receipt.version, Some(receipt.history_id))
        .await?;
    assert_eq!(applied, Ack::Applied);
    let confirmed = service.get_device_config("cab-001").await?;
    assert!(!confirmed.pending);
    assert!(confirmed.applied_at.is_some());
    let history = service.config_history("cab-001", None).await?;
    assert_eq!(history[0].applied_successfully, Some(true));
    assert!(history[0].applied_at.is_some());

    let missing = service.confirm_applied("ghost", 1, None).await;
    assert!(matches!(missing, Err(ConfigError::DeviceNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn superseded_entries_stay_unresolved() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping superseded_entries_stay_unresolved: {err}");
            return Ok(());
        }
    };
    let service = connect(postgres.connection_string()).await?;

    service
        .register_device("cab-002", "Cab 2", "cabin_camera")
        .await?;
    let first = service
        .update_device_config("cab-002", &partial("camera", "fps", 10), None, None)
        .await?;
    let second = service
        .update_device_config("cab-002", &partial("camera", "fps", 12), None, None)
        .await?;
    assert_eq!(second.version, first.version + 1);

    let ack = service
        .confirm_applied("cab-002", second.version, Some(second.history_id))
        .await?;
    assert_eq!(ack, Ack::Applied);

    let history = service.config_history("cab-002", None).await?;
    assert_eq!(history.len(), 2);
    let first_entry = history
        .iter()
        .find(|entry| entry.id == first.history_id)
        .expect("first entry present");
    // The overtaken attempt keeps its unknown outcome forever.
    assert!(first_entry.applied_successfully.is_none());
    assert_eq!(first_entry.change_type, ChangeKind::System);
    Ok(())
}

#[tokio::test]
async fn device_error_reports_and_retry() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping device_error_reports_and_retry: {err}");
            return Ok(());
        }
    };
    let service = connect(postgres.connection_string()).await?;

    service
        .register_device("cab-003", "Cab 3", "cabin_camera")
        .await?;

    let fresh_retry = service.retry_config("cab-003", None).await;
    assert!(matches!(fresh_retry, Err(ConfigError::NothingPending { .. })));

    let receipt = service
        .update_device_config("cab-003", &partial("camera", "fps", 8), None, None)
        .await?;
    service
        .report_apply_error("cab-003", "camera initialization failed", Some(receipt.history_id))
        .await?;

    let device = service.get_device_config("cab-003").await?;
    assert!(device.pending, "an apply failure keeps the device pending");
    assert_eq!(device.version, receipt.version);

    let history = service.config_history("cab-003", None).await?;
    let failed = history
        .iter()
        .find(|entry| entry.id == receipt.history_id)
        .expect("failed entry present");
    assert_eq!(failed.applied_successfully, Some(false));
    assert_eq!(
        failed.error_message.as_deref(),
        Some("camera initialization failed")
    );

    // A failed outcome is immutable: a late confirmation must not revert it.
    let ack = service
        .confirm_applied("cab-003", receipt.version, Some(receipt.history_id))
        .await?;
    assert_eq!(ack, Ack::Applied);
    let history = service.config_history("cab-003", None).await?;
    let entry = history
        .iter()
        .find(|entry| entry.id == receipt.history_id)
        .expect("entry present");
    assert_eq!(entry.applied_successfully, Some(false));

    // Re-sending records a new attempt without bumping the version.
    let resend = service.retry_config("cab-003", None).await?;
    assert_eq!(resend.version, receipt.version);
    assert_ne!(resend.history_id, receipt.history_id);
    Ok(())
}

#[tokio::test]
async fn profiles_reset_and_polling() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping profiles_reset_and_polling: {err}");
            return Ok(());
        }
    };
    let service = connect(postgres.connection_string()).await?;

    service
        .register_device("cab-004", "Cab 4", "cabin_camera")
        .await?;

    let profiles = service.list_profiles(Some("cabin_camera")).await?;
    let factory = profiles
        .iter()
        .find(|profile| profile.name == "Factory defaults")
        .expect("seeded factory profile");
    assert!(factory.is_default);
    assert!(factory.config.is_empty());

    let missing = service
        .apply_profile("cab-004", Uuid::new_v4(), None)
        .await;
    assert!(matches!(missing, Err(ConfigError::ProfileNotFound { .. })));

    service
        .update_device_config("cab-004", &partial("camera", "fps", 22), None, None)
        .await?;
    let receipt = service.apply_profile("cab-004", factory.id, None).await?;
    let history = service.config_history("cab-004", None).await?;
    let entry = history
        .iter()
        .find(|entry| entry.id == receipt.history_id)
        .expect("profile entry present");
    assert_eq!(entry.change_type, ChangeKind::Profile);
    assert_eq!(entry.changes_summary, "Applied profile: Factory defaults");
    let device = service.get_device_config("cab-004").await?;
    assert_eq!(device.config.get("camera", "fps"), Some(&ParamValue::Int(15)));

    let reset = service.reset_config("cab-004", None).await?;
    let history = service.config_history("cab-004", None).await?;
    let entry = history
        .iter()
        .find(|entry| entry.id == reset.history_id)
        .expect("reset entry present");
    assert!(entry.changes_summary.starts_with("Reset to defaults"));

    // The device poll stamps the check column; the admin read does not.
    assert!(service.get_device_config("cab-004").await?.last_config_check.is_none());
    let polled = service.device_poll_config("cab-004").await?;
    assert!(polled.last_config_check.is_some());
    Ok(())
}

#[tokio::test]
async fn rollback_and_duplicate() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping rollback_and_duplicate: {err}");
            return Ok(());
        }
    };
    let service = connect(postgres.connection_string()).await?;

    service
        .register_device("cab-005", "Cab 5", "cabin_camera")
        .await?;
    service
        .register_device("cab-006", "Cab 6", "cabin_camera")
        .await?;
    service
        .register_device("gate-001", "Gate 1", "gate_camera")
        .await?;

    let first = service
        .update_device_config("cab-005", &partial("camera", "fps", 10), None, None)
        .await?;

    // Unconfirmed entries are not rollback targets.
    let premature = service.rollback_config("cab-005", first.history_id, None).await;
    assert!(matches!(premature, Err(ConfigError::RollbackRejected { .. })));

    service
        .confirm_applied("cab-005", first.version, Some(first.history_id))
        .await?;
    let second = service
        .update_device_config("cab-005", &partial("camera", "fps", 25), None, None)
        .await?;
    service
        .confirm_applied("cab-005", second.version, Some(second.history_id))
        .await?;

    let rollback = service
        .rollback_config("cab-005", first.history_id, None)
        .await?;
    let device = service.get_device_config("cab-005").await?;
    assert_eq!(device.config.get("camera", "fps"), Some(&ParamValue::Int(10)));
    let history = service.config_history("cab-005", None).await?;
    let entry = history
        .iter()
        .find(|entry| entry.id == rollback.history_id)
        .expect("rollback entry present");
    assert_eq!(entry.change_type, ChangeKind::Rollback);

    // A history entry only rolls back onto its own device.
    let cross = service.rollback_config("cab-006", first.history_id, None).await;
    assert!(matches!(cross, Err(ConfigError::RollbackRejected { .. })));

    let reports = service
        .duplicate_config(
            "cab-005",
            &[
                "cab-006".to_string(),
                "gate-001".to_string(),
                "ghost".to_string(),
            ],
            None,
        )
        .await?;
    assert_eq!(reports.len(), 3);
    assert!(reports[0].error.is_none(), "same-type target succeeds");
    assert!(reports[0].history_id.is_some());
    assert!(
        reports[1].error.as_deref().is_some_and(|e| e.contains("device type")),
        "cross-type target is rejected"
    );
    assert!(reports[2].error.is_some(), "unknown target is reported");

    let copied = service.get_device_config("cab-006").await?;
    assert_eq!(copied.config.get("camera", "fps"), Some(&ParamValue::Int(10)));

    let fleet = service.fleet_status().await?;
    assert!(fleet.len() >= 3);
    let cab5 = fleet
        .iter()
        .find(|row| row.device_id == "cab-005")
        .expect("cab-005 in fleet rollup");
    assert!(cab5.config_pending);
    assert!(cab5.last_summary.is_some());
    Ok(())
}
