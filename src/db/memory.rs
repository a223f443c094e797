//! In-memory `TelemetryStore` used by hook and API tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::store::{Order, RangeQuery, StoreError, TelemetryStore};

#[derive(Default)]
pub(crate) struct Tables {
    pub sensor_readings: Vec<SensorReading>,
    pub energy_readings: Vec<EnergyReading>,
    pub energy_logs: Vec<EnergyLog>,
    pub irrigation_logs: Vec<IrrigationLog>,
    pub device_control: Vec<DeviceControl>,
    pub thresholds: Option<Thresholds>,
    pub schedule: Option<IrrigationSchedule>,
    pub daily: Vec<DailyEnergyConsumption>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read fail until switched back.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    /// Number of latest/range reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(AtomicOrdering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        self.reads.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

fn range<T: Clone>(rows: &[T], query: RangeQuery, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().filter(|r| created_at(r) >= query.since).cloned().collect();
    out.sort_by_key(|r| created_at(r));
    if query.order == Order::Desc {
        out.reverse();
    }
    if let Some(limit) = query.limit {
        out.truncate(limit as usize);
    }
    out
}

pub(crate) fn sensor(at: DateTime<Utc>) -> SensorReading {
    SensorReading {
        id: Uuid::new_v4(),
        created_at: at,
        temperature: None,
        humidity: None,
        soil_moisture: None,
        light_level: None,
        flow_rate: None,
        total_flow_volume: None,
        water_tank_level: None,
        vitamin_tank_level: None,
        water_temp: None,
        vitamin_temp: None,
    }
}

pub(crate) fn energy(at: DateTime<Utc>, power: f64) -> EnergyReading {
    EnergyReading {
        id: Uuid::new_v4(),
        created_at: at,
        device_name: "pump".to_owned(),
        voltage: Some(220.0),
        current: Some(power / 220.0),
        power: Some(power),
        energy: None,
        frequency: Some(50.0),
        power_factor: Some(0.9),
    }
}

pub(crate) fn thresholds(version: i64, at: DateTime<Utc>) -> Thresholds {
    Thresholds {
        id: SINGLETON_ID,
        version,
        low_water_level: Some(20.0),
        low_vitamin_level: Some(15.0),
        max_temperature: Some(30.0),
        min_soil_moisture: Some(40.0),
        min_light_level: Some(200.0),
        updated_at: Some(at),
    }
}

pub(crate) fn device(name: &str, active: bool) -> DeviceControl {
    DeviceControl {
        id: Uuid::new_v4(),
        device_name: name.to_owned(),
        is_active: Some(active),
        auto_mode: Some(true),
        last_updated: Some(Utc::now()),
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.sensor_readings.iter().max_by_key(|r| r.created_at).cloned())
    }

    async fn latest_energy_reading(&self) -> Result<Option<EnergyReading>, StoreError> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.energy_readings.iter().max_by_key(|r| r.created_at).cloned())
    }

    async fn device_controls(&self) -> Result<Vec<DeviceControl>, StoreError> {
        self.check()?;
        let mut rows = self.tables.read().await.device_control.clone();
        rows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(rows)
    }

    async fn thresholds(&self) -> Result<Option<Thresholds>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.thresholds.clone())
    }

    async fn irrigation_schedule(&self) -> Result<Option<IrrigationSchedule>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.schedule.clone())
    }

    async fn sensor_readings(&self, query: RangeQuery) -> Result<Vec<SensorReading>, StoreError> {
        self.check()?;
        Ok(range(&self.tables.read().await.sensor_readings, query, |r| r.created_at))
    }

    async fn energy_readings(&self, query: RangeQuery) -> Result<Vec<EnergyReading>, StoreError> {
        self.check()?;
        Ok(range(&self.tables.read().await.energy_readings, query, |r| r.created_at))
    }

    async fn irrigation_logs(&self, query: RangeQuery) -> Result<Vec<IrrigationLog>, StoreError> {
        self.check()?;
        Ok(range(&self.tables.read().await.irrigation_logs, query, |r| r.created_at))
    }

    async fn energy_logs(&self, query: RangeQuery) -> Result<Vec<EnergyLog>, StoreError> {
        self.check()?;
        Ok(range(&self.tables.read().await.energy_logs, query, |r| r.created_at))
    }

    async fn daily_energy_consumption(&self) -> Result<Vec<DailyEnergyConsumption>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.daily.clone())
    }

    async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<Thresholds, StoreError> {
        let mut t = self.tables.write().await;
        let row = t
            .thresholds
            .as_mut()
            .ok_or_else(|| StoreError::NotFound("thresholds".to_owned()))?;
        if let Some(expected) = expected_version {
            if row.version != expected {
                return Err(StoreError::VersionConflict {
                    table: "thresholds",
                    expected,
                    actual: row.version,
                });
            }
        }
        if let Some(v) = patch.low_water_level { row.low_water_level = Some(v); }
        if let Some(v) = patch.low_vitamin_level { row.low_vitamin_level = Some(v); }
        if let Some(v) = patch.max_temperature { row.max_temperature = Some(v); }
        if let Some(v) = patch.min_soil_moisture { row.min_soil_moisture = Some(v); }
        if let Some(v) = patch.min_light_level { row.min_light_level = Some(v); }
        row.updated_at = Some(at);
        row.version += 1;
        Ok(row.clone())
    }

    async fn update_schedule(
        &self,
        patch: &SchedulePatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<IrrigationSchedule, StoreError> {
        let mut t = self.tables.write().await;
        let row = t
            .schedule
            .as_mut()
            .ok_or_else(|| StoreError::NotFound("irrigation_schedule".to_owned()))?;
        if let Some(expected) = expected_version {
            if row.version != expected {
                return Err(StoreError::VersionConflict {
                    table: "irrigation_schedule",
                    expected,
                    actual: row.version,
                });
            }
        }
        if let Some(v) = patch.enabled { row.enabled = Some(v); }
        if let Some(v) = patch.morning_time { row.morning_time = Some(v); }
        if let Some(v) = patch.evening_time { row.evening_time = Some(v); }
        if let Some(v) = patch.tank_rotation { row.tank_rotation = Some(v); }
        if let Some(v) = patch.weekend_mode { row.weekend_mode = Some(v); }
        row.updated_at = Some(at);
        row.version += 1;
        Ok(row.clone())
    }

    async fn update_device_control(
        &self,
        device_name: &str,
        patch: &DeviceControlPatch,
        at: DateTime<Utc>,
    ) -> Result<DeviceControl, StoreError> {
        let mut t = self.tables.write().await;
        let row = t
            .device_control
            .iter_mut()
            .find(|d| d.device_name == device_name)
            .ok_or_else(|| StoreError::NotFound(format!("device {device_name:?}")))?;
        if let Some(v) = patch.is_active { row.is_active = Some(v); }
        if let Some(v) = patch.auto_mode { row.auto_mode = Some(v); }
        row.last_updated = Some(at);
        Ok(row.clone())
    }
}
