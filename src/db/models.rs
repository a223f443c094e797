use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Primary key of the single row held by `thresholds` and `irrigation_schedule`.
pub const SINGLETON_ID: i16 = 1;

/// One snapshot pushed by the field controller. Rows are never mutated.
///
/// Every measurement is nullable: a reading carries whatever sensors the
/// controller had wired up at the time.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SensorReading {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Air temperature, °C.
    pub temperature: Option<f64>,
    /// Relative humidity, %.
    pub humidity: Option<f64>,
    /// Soil moisture, %.
    pub soil_moisture: Option<f64>,
    /// Light level, lux.
    pub light_level: Option<f64>,
    /// Flow rate, L/min.
    pub flow_rate: Option<f64>,
    /// Cumulative flow volume, L.
    pub total_flow_volume: Option<f64>,
    /// Water tank level, %.
    pub water_tank_level: Option<f64>,
    /// Nutrient ("vitamin") tank level, %.
    pub vitamin_tank_level: Option<f64>,
    pub water_temp: Option<f64>,
    pub vitamin_temp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EnergyReading {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub device_name: String,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    /// Watts.
    pub power: Option<f64>,
    /// Cumulative kWh counter of the meter.
    pub energy: Option<f64>,
    pub frequency: Option<f64>,
    pub power_factor: Option<f64>,
}

/// One completed pump / valve run as estimated by the controller.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EnergyLog {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub device_name: String,
    pub duration_seconds: Option<i32>,
    pub estimated_power_watts: Option<f64>,
    pub estimated_energy_kwh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct IrrigationLog {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub soil_moisture_before: Option<f64>,
    pub soil_moisture_after: Option<f64>,
    pub tank_type: Option<String>,
    pub trigger_reason: Option<String>,
}

/// Operator-controlled state of one actuator, keyed by `device_name`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct DeviceControl {
    pub id: Uuid,
    pub device_name: String,
    pub is_active: Option<bool>,
    pub auto_mode: Option<bool>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Thresholds {
    pub id: i16,
    /// Bumped by every update; used for optimistic concurrency.
    pub version: i64,
    pub low_water_level: Option<f64>,
    pub low_vitamin_level: Option<f64>,
    pub max_temperature: Option<f64>,
    pub min_soil_moisture: Option<f64>,
    pub min_light_level: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct IrrigationSchedule {
    pub id: i16,
    pub version: i64,
    pub enabled: Option<bool>,
    pub morning_time: Option<NaiveTime>,
    pub evening_time: Option<NaiveTime>,
    pub tank_rotation: Option<bool>,
    pub weekend_mode: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Row returned by the `get_daily_energy_consumption()` database function.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct DailyEnergyConsumption {
    pub device_name: String,
    pub total_energy: f64,
    pub avg_power: f64,
    pub peak_power: f64,
    pub runtime_hours: f64,
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdsPatch {
    pub low_water_level: Option<f64>,
    pub low_vitamin_level: Option<f64>,
    pub max_temperature: Option<f64>,
    pub min_soil_moisture: Option<f64>,
    pub min_light_level: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SchedulePatch {
    pub enabled: Option<bool>,
    pub morning_time: Option<NaiveTime>,
    pub evening_time: Option<NaiveTime>,
    pub tank_rotation: Option<bool>,
    pub weekend_mode: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceControlPatch {
    pub is_active: Option<bool>,
    pub auto_mode: Option<bool>,
}
