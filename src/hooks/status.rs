//! Dashboard health derived from the latest readings and the configured
//! thresholds.

use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{DeviceControl, EnergyReading, SensorReading, Thresholds};

/// Power draw above which the installation is flagged, W.
pub const HIGH_POWER_WATTS: f64 = 1000.0;
/// Acceptable mains voltage, V.
pub const VOLTAGE_RANGE: (f64, f64) = (200.0, 250.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardAlert {
    pub level: AlertLevel,
    pub message: String,
}

impl DashboardAlert {
    fn info(message: &str) -> Self {
        Self { level: AlertLevel::Info, message: message.to_owned() }
    }

    fn warning(message: &str) -> Self {
        Self { level: AlertLevel::Warning, message: message.to_owned() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    #[default]
    Normal,
    Warning,
}

impl MetricStatus {
    fn warn_if(breached: bool) -> Self {
        if breached {
            MetricStatus::Warning
        } else {
            MetricStatus::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardStatus {
    /// Both a sensor and an energy reading are present.
    pub system_online: bool,
    /// Auto mode of the most recently updated device; on when there is none.
    pub auto_mode: bool,
    pub temperature: MetricStatus,
    pub soil_moisture: MetricStatus,
    pub light_level: MetricStatus,
    pub power: MetricStatus,
}

impl Default for DashboardStatus {
    fn default() -> Self {
        Self {
            system_online: false,
            auto_mode: true,
            temperature: MetricStatus::Normal,
            soil_moisture: MetricStatus::Normal,
            light_level: MetricStatus::Normal,
            power: MetricStatus::Normal,
        }
    }
}

fn above(value: Option<f64>, limit: Option<f64>) -> bool {
    matches!((value, limit), (Some(v), Some(l)) if v > l)
}

fn below(value: Option<f64>, limit: Option<f64>) -> bool {
    matches!((value, limit), (Some(v), Some(l)) if v < l)
}

impl DashboardStatus {
    pub fn derive(
        sensor: Option<&SensorReading>,
        energy: Option<&EnergyReading>,
        devices: &[DeviceControl],
        thresholds: Option<&Thresholds>,
    ) -> Self {
        let reading = |f: fn(&SensorReading) -> Option<f64>| sensor.and_then(f);
        let limit = |f: fn(&Thresholds) -> Option<f64>| thresholds.and_then(f);

        Self {
            system_online: sensor.is_some() && energy.is_some(),
            auto_mode: devices.first().and_then(|d| d.auto_mode).unwrap_or(true),
            temperature: MetricStatus::warn_if(above(
                reading(|s| s.temperature),
                limit(|t| t.max_temperature),
            )),
            soil_moisture: MetricStatus::warn_if(below(
                reading(|s| s.soil_moisture),
                limit(|t| t.min_soil_moisture),
            )),
            light_level: MetricStatus::warn_if(below(
                reading(|s| s.light_level),
                limit(|t| t.min_light_level),
            )),
            power: MetricStatus::warn_if(above(
                energy.and_then(|e| e.power),
                Some(HIGH_POWER_WATTS),
            )),
        }
    }
}

/// Alerts in display order: the online/offline line first, then threshold
/// breaches, then electrical warnings. Readings the controller did not
/// report and thresholds left unset raise nothing; a missing voltage on a
/// present energy reading counts as 0 V.
pub fn dashboard_alerts(
    sensor: Option<&SensorReading>,
    energy: Option<&EnergyReading>,
    thresholds: Option<&Thresholds>,
) -> Vec<DashboardAlert> {
    let mut alerts = Vec::new();

    if sensor.is_some() && energy.is_some() {
        alerts.push(DashboardAlert::info("System operating normally with real-time data"));
    } else {
        alerts.push(DashboardAlert::warning("Some sensors not responding - check connections"));
    }

    if let (Some(s), Some(t)) = (sensor, thresholds) {
        if below(s.soil_moisture, t.min_soil_moisture) {
            alerts.push(DashboardAlert::warning("Soil moisture below threshold - irrigation needed"));
        }
        if above(s.temperature, t.max_temperature) {
            alerts.push(DashboardAlert::warning("Temperature above safe level"));
        }
        if below(s.water_tank_level, t.low_water_level) {
            alerts.push(DashboardAlert::warning("Water tank level is low"));
        }
        if below(s.vitamin_tank_level, t.low_vitamin_level) {
            alerts.push(DashboardAlert::warning("Vitamin tank will need refill soon"));
        }
    }

    if let Some(e) = energy {
        if e.power.unwrap_or(0.0) > HIGH_POWER_WATTS {
            alerts.push(DashboardAlert::warning("High power consumption detected"));
        }
        let voltage = e.voltage.unwrap_or(0.0);
        if voltage < VOLTAGE_RANGE.0 || voltage > VOLTAGE_RANGE.1 {
            alerts.push(DashboardAlert::warning("Voltage outside normal range"));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::memory::{device, energy, sensor, thresholds};

    fn messages(alerts: &[DashboardAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.message.as_str()).collect()
    }

    #[test]
    fn offline_without_both_readings() {
        let s = sensor(Utc::now());
        let alerts = dashboard_alerts(Some(&s), None, None);
        assert_eq!(alerts, vec![DashboardAlert::warning("Some sensors not responding - check connections")]);
        assert!(!DashboardStatus::derive(Some(&s), None, &[], None).system_online);
    }

    #[test]
    fn threshold_breaches_raise_warnings() {
        let now = Utc::now();
        let mut s = sensor(now);
        s.temperature = Some(35.0);
        s.soil_moisture = Some(10.0);
        s.water_tank_level = Some(12.0);
        s.vitamin_tank_level = Some(50.0);
        let e = energy(now, 1500.0);
        let t = thresholds(1, now);

        let alerts = dashboard_alerts(Some(&s), Some(&e), Some(&t));
        assert_eq!(
            messages(&alerts),
            vec![
                "System operating normally with real-time data",
                "Soil moisture below threshold - irrigation needed",
                "Temperature above safe level",
                "Water tank level is low",
                "High power consumption detected",
            ]
        );
        assert_eq!(alerts[0].level, AlertLevel::Info);
        assert!(alerts[1..].iter().all(|a| a.level == AlertLevel::Warning));

        let status = DashboardStatus::derive(Some(&s), Some(&e), &[], Some(&t));
        assert!(status.system_online);
        assert_eq!(status.temperature, MetricStatus::Warning);
        assert_eq!(status.soil_moisture, MetricStatus::Warning);
        assert_eq!(status.light_level, MetricStatus::Normal);
        assert_eq!(status.power, MetricStatus::Warning);
    }

    #[test]
    fn missing_values_and_unset_thresholds_raise_nothing() {
        let now = Utc::now();
        let mut s = sensor(now);
        s.temperature = Some(45.0);
        let mut t = thresholds(1, now);
        t.max_temperature = None;

        let alerts = dashboard_alerts(Some(&s), None, Some(&t));
        assert_eq!(alerts.len(), 1);
        assert_eq!(DashboardStatus::derive(Some(&s), None, &[], Some(&t)).temperature, MetricStatus::Normal);
    }

    #[test]
    fn voltage_outside_range() {
        let now = Utc::now();
        let mut e = energy(now, 100.0);
        e.voltage = Some(260.0);
        assert!(messages(&dashboard_alerts(None, Some(&e), None)).contains(&"Voltage outside normal range"));

        e.voltage = None;
        assert!(messages(&dashboard_alerts(None, Some(&e), None)).contains(&"Voltage outside normal range"));

        e.voltage = Some(230.0);
        assert!(!messages(&dashboard_alerts(None, Some(&e), None)).contains(&"Voltage outside normal range"));
    }

    #[test]
    fn auto_mode_follows_the_most_recent_device() {
        assert!(DashboardStatus::derive(None, None, &[], None).auto_mode);

        let mut pump = device("pump", true);
        pump.auto_mode = Some(false);
        let devices = vec![pump, device("fan", false)];
        assert!(!DashboardStatus::derive(None, None, &devices, None).auto_mode);
    }
}
