use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    stats::{average, percentage_change},
    ChannelSpec, EventAction, ViewModel,
};
use crate::{
    db::{
        models::{EnergyReading, SensorReading},
        RangeQuery, StoreError, TelemetryStore,
    },
    realtime::{ChangeEvent, EventFilter, Subscription, Table},
};

const WINDOW_DAYS: i64 = 30;
const RECENT_DAYS: i64 = 7;
const ROW_CAP: i64 = 100;

/// One sensor reading flattened for charting.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistoricalPoint {
    /// UTC calendar day of the reading.
    pub date: NaiveDate,
    /// `HH:MM`, UTC.
    pub time: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_level: f64,
    pub water_usage: f64,
    /// Mean power of that day's energy readings, in kW.
    pub energy_usage: f64,
    pub water_tank_level: f64,
    pub vitamin_tank_level: f64,
    pub flow_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct HistoricalStats {
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub avg_soil_moisture: f64,
    pub avg_light_level: f64,
    pub total_water_usage: f64,
}

impl HistoricalStats {
    pub fn over(points: &[HistoricalPoint]) -> Self {
        Self {
            avg_temperature: average(points.iter().map(|p| p.temperature)),
            avg_humidity: average(points.iter().map(|p| p.humidity)),
            avg_soil_moisture: average(points.iter().map(|p| p.soil_moisture)),
            avg_light_level: average(points.iter().map(|p| p.light_level)),
            total_water_usage: points.iter().map(|p| p.water_usage).sum(),
        }
    }
}

/// Percentage change of the last week against the whole window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct StatChanges {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_level: f64,
    pub water_usage: f64,
}

impl StatChanges {
    pub fn between(current: &HistoricalStats, previous: &HistoricalStats) -> Self {
        Self {
            temperature: percentage_change(current.avg_temperature, previous.avg_temperature),
            humidity: percentage_change(current.avg_humidity, previous.avg_humidity),
            soil_moisture: percentage_change(current.avg_soil_moisture, previous.avg_soil_moisture),
            light_level: percentage_change(current.avg_light_level, previous.avg_light_level),
            water_usage: percentage_change(current.total_water_usage, previous.total_water_usage),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct HistoricalView {
    /// Points of the last seven days.
    pub daily: Vec<HistoricalPoint>,
    /// Every point of the window, oldest first.
    pub weekly: Vec<HistoricalPoint>,
    /// Computed over `weekly`.
    pub stats: HistoricalStats,
    pub changes: StatChanges,
}

impl HistoricalView {
    pub fn build(
        sensors: &[SensorReading],
        energy: &[EnergyReading],
        now: DateTime<Utc>,
    ) -> Self {
        let weekly = to_points(sensors, energy);
        let cutoff = now - ChronoDuration::days(RECENT_DAYS);
        let daily: Vec<_> = weekly
            .iter()
            .filter(|p| p.date.and_hms_opt(0, 0, 0).map(|d| d.and_utc() >= cutoff).unwrap_or(false))
            .cloned()
            .collect();

        let stats = HistoricalStats::over(&weekly);
        let changes = StatChanges::between(&HistoricalStats::over(&daily), &stats);
        Self { daily, weekly, stats, changes }
    }
}

/// Joins every sensor reading with the mean power of its day.
pub fn to_points(sensors: &[SensorReading], energy: &[EnergyReading]) -> Vec<HistoricalPoint> {
    let mut per_day: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
    for reading in energy {
        let entry = per_day.entry(reading.created_at.date_naive()).or_default();
        entry.0 += reading.power.unwrap_or(0.0);
        entry.1 += 1;
    }

    sensors
        .iter()
        .map(|r| {
            let date = r.created_at.date_naive();
            let energy_usage = per_day
                .get(&date)
                .map(|(sum, n)| sum / *n as f64 / 1000.0)
                .unwrap_or(0.0);
            HistoricalPoint {
                date,
                time: r.created_at.format("%H:%M").to_string(),
                temperature: r.temperature.unwrap_or(0.0),
                humidity: r.humidity.unwrap_or(0.0),
                soil_moisture: r.soil_moisture.unwrap_or(0.0),
                light_level: r.light_level.unwrap_or(0.0),
                water_usage: r.flow_rate.unwrap_or(0.0),
                energy_usage,
                water_tank_level: r.water_tank_level.unwrap_or(0.0),
                vitamin_tank_level: r.vitamin_tank_level.unwrap_or(0.0),
                flow_rate: r.flow_rate.unwrap_or(0.0),
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct HistoricalSnapshot {
    view: HistoricalView,
}

/// Thirty-day sensor and energy trends.
#[derive(Debug, Clone)]
pub struct HistoricalData {
    refresh: Duration,
}

impl HistoricalData {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }
}

#[async_trait]
impl ViewModel for HistoricalData {
    type Data = HistoricalView;
    type Snapshot = HistoricalSnapshot;

    fn name(&self) -> &'static str {
        "historical-data"
    }

    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::new(
                "historical-sensor-changes",
                vec![Subscription::new(Table::SensorReadings, EventFilter::Insert)],
            ),
            ChannelSpec::new(
                "historical-energy-changes",
                vec![Subscription::new(Table::EnergyReadings, EventFilter::Insert)],
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
    ) -> Result<HistoricalSnapshot, StoreError> {
        let since = now - ChronoDuration::days(WINDOW_DAYS);
        let (mut sensors, mut energy) = tokio::try_join!(
            store.sensor_readings(RangeQuery::newest(since, ROW_CAP)),
            store.energy_readings(RangeQuery::newest(since, ROW_CAP)),
        )?;
        sensors.reverse();
        energy.reverse();

        Ok(HistoricalSnapshot { view: HistoricalView::build(&sensors, &energy, now) })
    }

    fn apply_snapshot(&self, data: &mut HistoricalView, snapshot: HistoricalSnapshot) {
        *data = snapshot.view;
    }

    fn apply_event(&self, _data: &mut HistoricalView, _event: &ChangeEvent) -> EventAction {
        EventAction::Refetch
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::{
        db::memory::{energy, sensor, MemoryStore},
        hooks::{
            testing::{wait_for, wait_ready},
            HookHandle,
        },
        realtime::{ChangeBus, ChangeKind},
    };

    fn reading(at: DateTime<Utc>, temperature: f64, flow: f64) -> SensorReading {
        let mut r = sensor(at);
        r.temperature = Some(temperature);
        r.flow_rate = Some(flow);
        r
    }

    #[test]
    fn points_carry_the_day_mean_power_in_kw() {
        let day = Utc.with_ymd_and_hms(2025, 3, 10, 8, 5, 0).unwrap();
        let points = to_points(
            &[reading(day, 25.0, 2.0)],
            &[
                energy(day, 1000.0),
                energy(day + ChronoDuration::hours(1), 3000.0),
                energy(day + ChronoDuration::days(1), 9000.0),
            ],
        );

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, "08:05");
        assert_eq!(points[0].energy_usage, 2.0);
        assert_eq!(points[0].humidity, 0.0);
    }

    #[test]
    fn daily_slice_and_changes() {
        let now = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        let sensors = vec![
            reading(now - ChronoDuration::days(20), 10.0, 1.0),
            reading(now - ChronoDuration::days(2), 30.0, 3.0),
        ];

        let view = HistoricalView::build(&sensors, &[], now);
        assert_eq!(view.weekly.len(), 2);
        assert_eq!(view.daily.len(), 1);
        assert_eq!(view.stats.avg_temperature, 20.0);
        assert_eq!(view.stats.total_water_usage, 4.0);
        // Daily 30 vs weekly 20.
        assert_eq!(view.changes.temperature, 50.0);
        // Humidity never reported: weekly average 0, change defined as 0.
        assert_eq!(view.changes.humidity, 0.0);
    }

    #[test]
    fn empty_window_has_zero_stats() {
        let view = HistoricalView::build(&[], &[], Utc::now());
        assert_eq!(view.stats, HistoricalStats::default());
        assert_eq!(view.changes, StatChanges::default());
    }

    #[tokio::test]
    async fn insert_triggers_a_refetch() {
        let store = Arc::new(MemoryStore::new());
        let bus = ChangeBus::new();
        let hook = HookHandle::spawn(HistoricalData::new(Duration::from_secs(300)), store.clone(), &bus);
        assert!(wait_ready(&hook).await.data.weekly.is_empty());

        let row = reading(Utc::now(), 22.0, 1.0);
        store.tables.write().await.sensor_readings.push(row.clone());
        bus.publish(ChangeEvent::new(Table::SensorReadings, ChangeKind::Insert, &row).unwrap());

        let state = wait_for(&hook, |s| !s.data.weekly.is_empty()).await;
        assert_eq!(state.data.weekly[0].temperature, 22.0);
        assert_eq!(state.data.daily.len(), 1);
    }

    #[tokio::test]
    async fn window_is_capped_and_ascending() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        {
            let mut t = store.tables.write().await;
            for i in 0..150 {
                t.sensor_readings.push(reading(now - ChronoDuration::minutes(i), i as f64, 0.0));
            }
        }

        let snapshot = HistoricalData::new(Duration::from_secs(300))
            .fetch(store.as_ref(), now)
            .await
            .unwrap();
        let weekly = snapshot.view.weekly;
        assert_eq!(weekly.len(), ROW_CAP as usize);
        // Newest 100 kept; the newest (i = 0) comes last.
        assert_eq!(weekly.last().map(|p| p.temperature), Some(0.0));
        assert_eq!(weekly.first().map(|p| p.temperature), Some(99.0));
    }
}
