use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ChannelSpec, EventAction, ViewModel};
use crate::{
    db::{
        models::{EnergyLog, IrrigationLog, SensorReading},
        RangeQuery, StoreError, TelemetryStore,
    },
    realtime::{ChangeEvent, EventFilter, Subscription, Table},
};

const WINDOW_DAYS: i64 = 30;
const LOG_CAP: i64 = 50;
const SENSOR_CAP: i64 = 100;

const LOW_WATER_PERCENT: f64 = 20.0;
const LOW_VITAMIN_PERCENT: f64 = 15.0;
const HIGH_TEMPERATURE_C: f64 = 30.0;

const SYSTEM_USER: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Irrigation,
    Energy,
    Alert,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Irrigation => "irrigation",
            ActivityKind::Energy => "energy",
            ActivityKind::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Completed,
    Acknowledged,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Completed => "completed",
            ActivityStatus::Acknowledged => "acknowledged",
        }
    }
}

/// One line of the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActivityItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub action: String,
    pub details: String,
    pub duration: String,
    pub user: String,
    pub status: ActivityStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ActivityFeed {
    /// Newest first.
    pub activities: Vec<ActivityItem>,
}

fn minutes(seconds: Option<i32>) -> String {
    let secs = f64::from(seconds.unwrap_or(0).max(0));
    format!("{} min", (secs / 60.0).round())
}

fn value_or_dash(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

impl From<&IrrigationLog> for ActivityItem {
    fn from(log: &IrrigationLog) -> Self {
        Self {
            id: log.id.to_string(),
            timestamp: log.created_at,
            kind: ActivityKind::Irrigation,
            action: "Auto watering completed".to_owned(),
            details: format!(
                "{} - Tank: {} - Moisture: {}% → {}%",
                log.trigger_reason.as_deref().unwrap_or("Scheduled irrigation"),
                log.tank_type.as_deref().unwrap_or("Water"),
                value_or_dash(log.soil_moisture_before),
                value_or_dash(log.soil_moisture_after),
            ),
            duration: minutes(log.duration_seconds),
            user: SYSTEM_USER.to_owned(),
            status: ActivityStatus::Completed,
        }
    }
}

impl From<&EnergyLog> for ActivityItem {
    fn from(log: &EnergyLog) -> Self {
        Self {
            id: log.id.to_string(),
            timestamp: log.created_at,
            kind: ActivityKind::Energy,
            action: format!("{} operation", log.device_name),
            details: format!(
                "Power: {}W - Energy: {}kWh",
                value_or_dash(log.estimated_power_watts),
                value_or_dash(log.estimated_energy_kwh),
            ),
            duration: minutes(log.duration_seconds),
            user: SYSTEM_USER.to_owned(),
            status: ActivityStatus::Completed,
        }
    }
}

fn alert(reading: &SensorReading, suffix: &str, action: &str, details: String) -> ActivityItem {
    ActivityItem {
        id: format!("{}-{suffix}", reading.id),
        timestamp: reading.created_at,
        kind: ActivityKind::Alert,
        action: action.to_owned(),
        details,
        duration: "-".to_owned(),
        user: SYSTEM_USER.to_owned(),
        status: ActivityStatus::Acknowledged,
    }
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v}{unit}"))
}

/// Alerts raised by one reading. A value the controller did not report
/// counts as 0, so an unreported tank level reads as empty.
pub fn alerts_for(reading: &SensorReading) -> Vec<ActivityItem> {
    let mut out = Vec::new();
    if reading.water_tank_level.unwrap_or(0.0) < LOW_WATER_PERCENT {
        let details = format!("Water tank level: {}", with_unit(reading.water_tank_level, "%"));
        out.push(alert(reading, "water", "Low water level alert", details));
    }
    if reading.vitamin_tank_level.unwrap_or(0.0) < LOW_VITAMIN_PERCENT {
        let details = format!("Vitamin tank level: {}", with_unit(reading.vitamin_tank_level, "%"));
        out.push(alert(reading, "vitamin", "Low vitamin level alert", details));
    }
    if reading.temperature.unwrap_or(0.0) > HIGH_TEMPERATURE_C {
        let details = format!("Temperature: {}", with_unit(reading.temperature, "°C"));
        out.push(alert(reading, "temp", "High temperature alert", details));
    }
    out
}

impl ActivityFeed {
    pub fn build(
        irrigation: &[IrrigationLog],
        energy: &[EnergyLog],
        sensors: &[SensorReading],
    ) -> Self {
        let mut activities: Vec<ActivityItem> = irrigation
            .iter()
            .map(ActivityItem::from)
            .chain(energy.iter().map(ActivityItem::from))
            .chain(sensors.iter().flat_map(alerts_for))
            .collect();
        activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { activities }
    }
}

#[derive(Debug)]
pub struct ActivitySnapshot {
    feed: ActivityFeed,
}

/// Irrigation runs, device operations and threshold alerts of the last
/// thirty days.
#[derive(Debug, Clone)]
pub struct ActivityHistory {
    refresh: Duration,
}

impl ActivityHistory {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }
}

#[async_trait]
impl ViewModel for ActivityHistory {
    type Data = ActivityFeed;
    type Snapshot = ActivitySnapshot;

    fn name(&self) -> &'static str {
        "activity-history"
    }

    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::new(
                "history-irrigation-changes",
                vec![Subscription::new(Table::IrrigationLogs, EventFilter::Any)],
            ),
            ChannelSpec::new(
                "history-energy-changes",
                vec![Subscription::new(Table::EnergyLogs, EventFilter::Any)],
            ),
            ChannelSpec::new(
                "history-sensor-changes",
                vec![Subscription::new(Table::SensorReadings, EventFilter::Insert)],
            ),
        ]
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    async fn fetch(
        &self,
        store: &dyn TelemetryStore,
        now: DateTime<Utc>,
    ) -> Result<ActivitySnapshot, StoreError> {
        let since = now - ChronoDuration::days(WINDOW_DAYS);
        let (irrigation, energy, sensors) = tokio::try_join!(
            store.irrigation_logs(RangeQuery::newest(since, LOG_CAP)),
            store.energy_logs(RangeQuery::newest(since, LOG_CAP)),
            store.sensor_readings(RangeQuery::newest(since, SENSOR_CAP)),
        )?;
        Ok(ActivitySnapshot { feed: ActivityFeed::build(&irrigation, &energy, &sensors) })
    }

    fn apply_snapshot(&self, data: &mut ActivityFeed, snapshot: ActivitySnapshot) {
        *data = snapshot.feed;
    }

    fn apply_event(&self, _data: &mut ActivityFeed, _event: &ChangeEvent) -> EventAction {
        EventAction::Refetch
    }
}
