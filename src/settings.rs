use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::{
    db::{
        models::{
            DeviceControl, DeviceControlPatch, IrrigationSchedule, SchedulePatch, Thresholds,
            ThresholdsPatch,
        },
        StoreError, TelemetryStore,
    },
    notify::Notifier,
};

/// Partial updates of the operator-editable rows. Each call is a single
/// write stamped with the current time; failures are reported, returned
/// and never retried.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn TelemetryStore>,
    notifier: Notifier,
}

impl SettingsService {
    pub fn new(store: Arc<dyn TelemetryStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
        expected_version: Option<i64>,
    ) -> Result<Thresholds, StoreError> {
        match self.store.update_thresholds(patch, expected_version, Utc::now()).await {
            Ok(row) => {
                info!(version = row.version, "Thresholds updated");
                self.notifier.success("Thresholds updated successfully").await;
                Ok(row)
            }
            Err(e) => {
                error!(error = %e, "Error updating thresholds");
                self.notifier.error("Failed to update thresholds").await;
                Err(e)
            }
        }
    }

    pub async fn update_schedule(
        &self,
        patch: &SchedulePatch,
        expected_version: Option<i64>,
    ) -> Result<IrrigationSchedule, StoreError> {
        match self.store.update_schedule(patch, expected_version, Utc::now()).await {
            Ok(row) => {
                info!(version = row.version, "Schedule updated");
                self.notifier.success("Schedule updated successfully").await;
                Ok(row)
            }
            Err(e) => {
                error!(error = %e, "Error updating schedule");
                self.notifier.error("Failed to update schedule").await;
                Err(e)
            }
        }
    }

    pub async fn update_device_control(
        &self,
        device_name: &str,
        patch: &DeviceControlPatch,
    ) -> Result<DeviceControl, StoreError> {
        match self.store.update_device_control(device_name, patch, Utc::now()).await {
            Ok(row) => {
                info!(device = device_name, ?patch, "Device updated");
                self.notifier.success(format!("Device {device_name} updated successfully")).await;
                Ok(row)
            }
            Err(e) => {
                error!(device = device_name, error = %e, "Error updating device");
                self.notifier.error(format!("Failed to update {device_name}")).await;
                Err(e)
            }
        }
    }

    /// Sets `auto_mode` on every device with one notification for the batch.
    /// Stops at the first failed write; devices written before it keep the
    /// new value.
    pub async fn set_auto_mode_all(&self, enabled: bool) -> Result<Vec<DeviceControl>, StoreError> {
        match self.write_auto_mode(enabled).await {
            Ok(rows) => {
                info!(enabled, devices = rows.len(), "Auto mode updated");
                let state = if enabled { "enabled" } else { "disabled" };
                self.notifier.success(format!("Auto mode {state}")).await;
                Ok(rows)
            }
            Err(e) => {
                error!(enabled, error = %e, "Error updating auto mode");
                self.notifier.error("Failed to update auto mode").await;
                Err(e)
            }
        }
    }

    async fn write_auto_mode(&self, enabled: bool) -> Result<Vec<DeviceControl>, StoreError> {
        let patch = DeviceControlPatch { auto_mode: Some(enabled), ..Default::default() };
        let now = Utc::now();
        let mut rows = Vec::new();
        for device in self.store.device_controls().await? {
            rows.push(self.store.update_device_control(&device.device_name, &patch, now).await?);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::{device, thresholds, MemoryStore},
        notify::Severity,
    };

    async fn service() -> (SettingsService, Arc<MemoryStore>, Notifier) {
        let store = Arc::new(MemoryStore::new());
        {
            let mut t = store.tables.write().await;
            t.thresholds = Some(thresholds(1, Utc::now() - chrono::Duration::days(1)));
            t.device_control.push(device("pump", false));
        }
        let notifier = Notifier::new();
        (SettingsService::new(store.clone(), notifier.clone()), store, notifier)
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields_and_stamps_time() {
        let (svc, _store, notifier) = service().await;
        let before = Utc::now();

        let patch = ThresholdsPatch { low_water_level: Some(25.0), ..Default::default() };
        let row = svc.update_thresholds(&patch, None).await.unwrap();

        assert_eq!(row.low_water_level, Some(25.0));
        assert_eq!(row.max_temperature, Some(30.0));
        assert_eq!(row.version, 2);
        assert!(row.updated_at.unwrap() >= before);

        let recent = notifier.recent().await;
        assert_eq!(recent[0].severity, Severity::Success);
        assert_eq!(recent[0].message, "Thresholds updated successfully");
    }

    #[tokio::test]
    async fn stale_version_is_rejected_and_reported() {
        let (svc, store, notifier) = service().await;

        let err = svc
            .update_thresholds(&ThresholdsPatch { max_temperature: Some(35.0), ..Default::default() }, Some(7))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 7, actual: 1, .. }));

        let held = store.tables.read().await.thresholds.clone().unwrap();
        assert_eq!(held.max_temperature, Some(30.0));
        assert_eq!(notifier.recent().await[0].message, "Failed to update thresholds");
    }

    #[tokio::test]
    async fn missing_schedule_row_is_not_found() {
        let (svc, _store, notifier) = service().await;
        let err = svc.update_schedule(&SchedulePatch::default(), None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(notifier.recent().await[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn device_update_by_name() {
        let (svc, _store, _notifier) = service().await;
        let patch = DeviceControlPatch { is_active: Some(true), ..Default::default() };

        let row = svc.update_device_control("pump", &patch).await.unwrap();
        assert_eq!(row.is_active, Some(true));
        assert_eq!(row.auto_mode, Some(true));

        assert!(matches!(
            svc.update_device_control("heater", &patch).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn auto_mode_applies_to_every_device_with_one_notification() {
        let (svc, store, notifier) = service().await;
        store.tables.write().await.device_control.push(device("fan", true));

        let rows = svc.set_auto_mode_all(false).await.unwrap();
        assert_eq!(rows.len(), 2);

        let held = store.tables.read().await.device_control.clone();
        assert!(held.iter().all(|d| d.auto_mode == Some(false)));
        assert!(held.iter().all(|d| d.last_updated.is_some()));

        let recent = notifier.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].severity, Severity::Success);
        assert_eq!(recent[0].message, "Auto mode disabled");

        svc.set_auto_mode_all(true).await.unwrap();
        assert_eq!(notifier.recent().await[0].message, "Auto mode enabled");
    }
}
