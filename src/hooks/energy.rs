use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{
    series::{replace_latest, BoundedSeries},
    ChannelSpec, EventAction, ViewModel,
};
use crate::{
    db::{
        models::{DailyEnergyConsumption, EnergyReading},
        RangeQuery, StoreError, TelemetryStore,
    },
    realtime::{ChangeEvent, EventFilter, Subscription, Table},
};

/// Readings kept for the power chart.
pub const RECENT_CAP: usize = 100;

const RECENT_WINDOW_HOURS: i64 = 24;

/// Electrical values of the latest reading, 0 where the meter sent nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct EnergyMetrics {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    pub frequency: f64,
    pub power_factor: f64,
}

impl EnergyMetrics {
    pub fn from_reading(reading: Option<&EnergyReading>) -> Self {
        let Some(r) = reading else {
            return Self::default();
        };
        Self {
            voltage: r.voltage.unwrap_or(0.0),
            current: r.current.unwrap_or(0.0),
            power: r.power.unwrap_or(0.0),
            energy: r.energy.unwrap_or(0.0),
            frequency: r.frequency.unwrap_or(0.0),
            power_factor: r.power_factor.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EnergyView {
    pub latest: Option<EnergyReading>,
    /// Oldest first, at most [`RECENT_CAP`] entries.
    #[schema(value_type = Vec<EnergyReading>)]
    pub recent: BoundedSeries<EnergyReading>,
    pub daily: Vec<DailyEnergyConsumption>,
    pub metrics: EnergyMetrics,
    /// kWh across all devices.
    pub total_daily_energy: f64,
    pub average_power: f64,
    pub peak_power: f64,
}

impl Default for EnergyView {
    fn default() -> Self {
        Self {
            latest: None,
            recent: BoundedSeries::new(RECENT_CAP),
            daily: Vec::new(),
            metrics: EnergyMetrics::default(),
            total_daily_energy: 0.0,
            average_power: 0.0,
            peak_power: 0.0,
        }
    }
}

impl EnergyView {
    fn recompute(&mut self) {
        self.metrics = EnergyMetrics::from_reading(self.latest.as_ref());
        self.total_daily_energy = total_daily_energy(&self.daily);
        self.average_power = average_power(&self.daily);
        self.peak_power = peak_power(&self.daily);
    }
}

pub fn total_daily_energy(daily: &[DailyEnergyConsumption]) -> f64 {
    daily.iter().map(|d| d.total_energy).sum()
}

/// Mean of the per-device averages; 0 with no devices.
pub fn average_power(daily: &[DailyEnergyConsumption]) -> f64 {
    daily.iter().map(|d| d.avg_power).sum::<f64>() / daily.len().max(1) as f64
}

pub fn peak_power(daily: &[DailyEnergyConsumption]) -> f64 {
    daily.iter().map(|d| d.peak_power).fold(0.0, f64::max)
}

#[derive(Debug)]
pub struct EnergySnapshot {
    latest: Option<EnergyReading>,
    /// Oldest first.
    recent: Vec<EnergyReading>,
    /// `None` when the daily aggregate could not be read.
    daily: Option<Vec<DailyEnergyConsumption>>,
}

#[derive(Debug, Clone)]
pub struct EnergyMonitor {
    refresh: Duration,
}

impl EnergyMonitor {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }
}

#[async_trait]
impl ViewModel for EnergyMonitor {
    type Data = EnergyView;
    type Snapshot = EnergySnapshot;

    fn name(&self) -> &'static str {
        "energy-monitor"
    }

    fn channels(&self) -> Vec<ChannelSpec> {
        vec![ChannelSpec::new(
            "energy-readings-changes",
            vec![Subscription::new(Table::EnergyReadings, EventFilter::Insert)],
        )]
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    async fn fetch(
        &self,
        store: &dyn TelemetryStore,
        now: DateTime<Utc>,
    ) -> Result<EnergySnapshot, StoreError> {
        let since = now - ChronoDuration::hours(RECENT_WINDOW_HOURS);
        let (latest, mut recent) = tokio::try_join!(
            store.latest_energy_reading(),
            store.energy_readings(RangeQuery::newest(since, RECENT_CAP as i64)),
        )?;
        recent.reverse();

        let daily = match store.daily_energy_consumption().await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(error = %e, "Failed to read daily energy consumption");
                None
            }
        };

        Ok(EnergySnapshot { latest, recent, daily })
    }

    fn apply_snapshot(&self, data: &mut EnergyView, snapshot: EnergySnapshot) {
        data.latest = snapshot.latest;
        data.recent.replace(snapshot.recent);
        if let Some(daily) = snapshot.daily {
            data.daily = daily;
        }
        data.recompute();
    }

    fn apply_event(&self, data: &mut EnergyView, event: &ChangeEvent) -> EventAction {
        let Some(row) = event.record_as::<EnergyReading>() else {
            return EventAction::Ignored;
        };

        let mut changed = false;
        if !data.recent.iter().any(|r| r.id == row.id) {
            data.recent.push(row.clone());
            changed = true;
        }
        changed |= replace_latest(&mut data.latest, row, |r| r.created_at);

        if changed {
            data.recompute();
            EventAction::Applied
        } else {
            EventAction::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::memory::{energy, MemoryStore},
        hooks::{testing::wait_ready, HookHandle},
        realtime::{ChangeBus, ChangeKind},
    };

    fn daily(device: &str, total: f64, avg: f64, peak: f64) -> DailyEnergyConsumption {
        DailyEnergyConsumption {
            device_name: device.to_owned(),
            total_energy: total,
            avg_power: avg,
            peak_power: peak,
            runtime_hours: 1.0,
        }
    }

    fn insert(row: &EnergyReading) -> ChangeEvent {
        ChangeEvent::new(Table::EnergyReadings, ChangeKind::Insert, row).unwrap()
    }

    #[test]
    fn aggregates_over_devices() {
        let rows = vec![daily("pump", 1.5, 100.0, 300.0), daily("valve", 0.5, 20.0, 50.0)];
        assert_eq!(total_daily_energy(&rows), 2.0);
        assert_eq!(average_power(&rows), 60.0);
        assert_eq!(peak_power(&rows), 300.0);
    }

    #[test]
    fn aggregates_of_nothing_are_zero() {
        assert_eq!(total_daily_energy(&[]), 0.0);
        assert_eq!(average_power(&[]), 0.0);
        assert_eq!(peak_power(&[]), 0.0);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        assert_eq!(EnergyMetrics::from_reading(None), EnergyMetrics::default());

        let mut reading = energy(Utc::now(), 110.0);
        reading.frequency = None;
        let metrics = EnergyMetrics::from_reading(Some(&reading));
        assert_eq!(metrics.power, 110.0);
        assert_eq!(metrics.frequency, 0.0);
    }

    #[test]
    fn inserts_append_and_cap_the_series() {
        let model = EnergyMonitor::new(Duration::from_secs(60));
        let mut view = EnergyView::default();
        let start = Utc::now();

        for i in 0..(RECENT_CAP + 20) {
            let row = energy(start + ChronoDuration::seconds(i as i64), i as f64);
            assert_eq!(model.apply_event(&mut view, &insert(&row)), EventAction::Applied);
            assert!(view.recent.len() <= RECENT_CAP);
        }

        assert_eq!(view.recent.len(), RECENT_CAP);
        assert_eq!(view.recent.iter().next().and_then(|r| r.power), Some(20.0));
        assert_eq!(view.metrics.power, (RECENT_CAP + 19) as f64);
    }

    #[test]
    fn redelivered_insert_is_not_appended_twice() {
        let model = EnergyMonitor::new(Duration::from_secs(60));
        let mut view = EnergyView::default();
        let row = energy(Utc::now(), 42.0);

        assert_eq!(model.apply_event(&mut view, &insert(&row)), EventAction::Applied);
        // Same id and timestamp: the latest slot is rewritten, the series is not.
        model.apply_event(&mut view, &insert(&row));
        assert_eq!(view.recent.len(), 1);
    }

    #[test]
    fn failed_daily_read_keeps_previous_aggregate() {
        let model = EnergyMonitor::new(Duration::from_secs(60));
        let mut view = EnergyView::default();
        model.apply_snapshot(
            &mut view,
            EnergySnapshot { latest: None, recent: vec![], daily: Some(vec![daily("pump", 3.0, 10.0, 20.0)]) },
        );
        model.apply_snapshot(&mut view, EnergySnapshot { latest: None, recent: vec![], daily: None });

        assert_eq!(view.daily.len(), 1);
        assert_eq!(view.total_daily_energy, 3.0);
    }

    #[tokio::test]
    async fn reconciliation_without_new_rows_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        {
            let mut t = store.tables.write().await;
            for i in 0..5 {
                t.energy_readings.push(energy(now - ChronoDuration::minutes(i), 100.0 + i as f64));
            }
            // Outside the 24 h window.
            t.energy_readings.push(energy(now - ChronoDuration::hours(30), 1.0));
            t.daily.push(daily("pump", 1.2, 100.0, 104.0));
        }

        let model = EnergyMonitor::new(Duration::from_secs(60));
        let mut view = EnergyView::default();
        let first = model.fetch(store.as_ref(), now).await.unwrap();
        model.apply_snapshot(&mut view, first);
        let once = view.clone();

        let second = model.fetch(store.as_ref(), now).await.unwrap();
        model.apply_snapshot(&mut view, second);
        assert_eq!(view, once);

        assert_eq!(view.recent.len(), 5);
        // Ascending by time.
        let times: Vec<_> = view.recent.iter().map(|r| r.created_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(view.metrics.power, 100.0);
        assert_eq!(view.peak_power, 104.0);
    }

    #[tokio::test]
    async fn hook_reaches_ready_with_empty_tables() {
        let store = Arc::new(MemoryStore::new());
        let bus = ChangeBus::new();
        let hook = HookHandle::spawn(EnergyMonitor::new(Duration::from_secs(60)), store, &bus);

        let state = wait_ready(&hook).await;
        assert!(state.data.latest.is_none());
        assert!(state.data.recent.is_empty());
        assert_eq!(state.data.metrics, EnergyMetrics::default());
    }
}
