use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    series::replace_latest,
    status::{dashboard_alerts, DashboardAlert, DashboardStatus},
    ChannelSpec, EventAction, ViewModel,
};
use crate::{
    db::{
        models::{DeviceControl, EnergyReading, IrrigationSchedule, SensorReading, Thresholds},
        StoreError, TelemetryStore,
    },
    realtime::{ChangeEvent, EventFilter, Subscription, Table},
};

/// Current state of the installation as shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct DashboardView {
    pub sensor: Option<SensorReading>,
    pub energy: Option<EnergyReading>,
    /// Most recently updated first.
    pub devices: Vec<DeviceControl>,
    pub thresholds: Option<Thresholds>,
    pub schedule: Option<IrrigationSchedule>,
    pub alerts: Vec<DashboardAlert>,
    pub status: DashboardStatus,
}

impl DashboardView {
    /// Recomputes `alerts` and `status` from the held rows.
    fn refresh_status(&mut self) {
        self.alerts = dashboard_alerts(self.sensor.as_ref(), self.energy.as_ref(), self.thresholds.as_ref());
        self.status = DashboardStatus::derive(
            self.sensor.as_ref(),
            self.energy.as_ref(),
            &self.devices,
            self.thresholds.as_ref(),
        );
    }
}

/// Latest sensor / energy rows, device states and the two settings rows.
#[derive(Debug, Clone)]
pub struct LiveDashboard {
    refresh: Duration,
}

impl LiveDashboard {
    pub fn new(refresh: Duration) -> Self {
        Self { refresh }
    }
}

#[async_trait]
impl ViewModel for LiveDashboard {
    type Data = DashboardView;
    type Snapshot = DashboardView;

    fn name(&self) -> &'static str {
        "live-dashboard"
    }

    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::new(
                "sensor-changes",
                vec![
                    Subscription::new(Table::SensorReadings, EventFilter::Insert),
                    Subscription::new(Table::SensorReadings, EventFilter::Update),
                ],
            ),
            ChannelSpec::new(
                "energy-changes",
                vec![
                    Subscription::new(Table::EnergyReadings, EventFilter::Insert),
                    Subscription::new(Table::EnergyReadings, EventFilter::Update),
                ],
            ),
            ChannelSpec::new(
                "device-changes",
                vec![Subscription::new(Table::DeviceControl, EventFilter::Any)],
            ),
            ChannelSpec::new(
                "threshold-changes",
                vec![Subscription::new(Table::Thresholds, EventFilter::Any)],
            ),
            ChannelSpec::new(
                "schedule-changes",
                vec![Subscription::new(Table::IrrigationSchedule, EventFilter::Any)],
            ),
        ]
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    async fn fetch(
        &self,
        store: &dyn TelemetryStore,
        _now: DateTime<Utc>,
    ) -> Result<DashboardView, StoreError> {
        let (sensor, energy, devices, thresholds, schedule) = tokio::try_join!(
            store.latest_sensor_reading(),
            store.latest_energy_reading(),
            store.device_controls(),
            store.thresholds(),
            store.irrigation_schedule(),
        )?;
        let mut view = DashboardView { sensor, energy, devices, thresholds, schedule, ..Default::default() };
        view.refresh_status();
        Ok(view)
    }

    fn apply_snapshot(&self, data: &mut DashboardView, snapshot: DashboardView) {
        *data = snapshot;
        data.refresh_status();
    }

    fn apply_event(&self, data: &mut DashboardView, event: &ChangeEvent) -> EventAction {
        let changed = match event.table {
            // The device list is ordered by `last_updated`; re-read it whole.
            Table::DeviceControl => return EventAction::Refetch,
            Table::SensorReadings => event
                .record_as::<SensorReading>()
                .map(|row| replace_latest(&mut data.sensor, row, |r| r.created_at)),
            Table::EnergyReadings => event
                .record_as::<EnergyReading>()
                .map(|row| replace_latest(&mut data.energy, row, |r| r.created_at)),
            Table::Thresholds => event
                .record_as::<Thresholds>()
                .map(|row| replace_latest(&mut data.thresholds, row, |r| r.version)),
            Table::IrrigationSchedule => event
                .record_as::<IrrigationSchedule>()
                .map(|row| replace_latest(&mut data.schedule, row, |r| r.version)),
            _ => return EventAction::Ignored,
        };

        match changed {
            Some(true) => {
                data.refresh_status();
                EventAction::Applied
            }
            Some(false) => EventAction::Ignored,
            // Deleted singleton or a record we could not decode.
            None => EventAction::Refetch,
        }
    }
}
