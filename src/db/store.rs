use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use super::models::{
    DailyEnergyConsumption, DeviceControl, DeviceControlPatch, EnergyLog, EnergyReading,
    IrrigationLog, IrrigationSchedule, SchedulePatch, SensorReading, Thresholds, ThresholdsPatch,
    SINGLETON_ID,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{table} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        table: &'static str,
        expected: i64,
        actual: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Time-bounded read over a series table: `created_at >= since`, sorted by
/// `created_at`, at most `limit` rows.
#[derive(Debug, Clone, Copy)]
pub struct RangeQuery {
    pub since: DateTime<Utc>,
    pub order: Order,
    pub limit: Option<i64>,
}

impl RangeQuery {
    /// Newest `limit` rows since `since`, newest first.
    pub fn newest(since: DateTime<Utc>, limit: i64) -> Self {
        Self { since, order: Order::Desc, limit: Some(limit) }
    }
}

/// Everything the hooks and the settings helper need from the backend.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError>;
    async fn latest_energy_reading(&self) -> Result<Option<EnergyReading>, StoreError>;
    /// All device rows, most recently updated first.
    async fn device_controls(&self) -> Result<Vec<DeviceControl>, StoreError>;
    async fn thresholds(&self) -> Result<Option<Thresholds>, StoreError>;
    async fn irrigation_schedule(&self) -> Result<Option<IrrigationSchedule>, StoreError>;

    async fn sensor_readings(&self, query: RangeQuery) -> Result<Vec<SensorReading>, StoreError>;
    async fn energy_readings(&self, query: RangeQuery) -> Result<Vec<EnergyReading>, StoreError>;
    async fn irrigation_logs(&self, query: RangeQuery) -> Result<Vec<IrrigationLog>, StoreError>;
    async fn energy_logs(&self, query: RangeQuery) -> Result<Vec<EnergyLog>, StoreError>;
    async fn daily_energy_consumption(&self) -> Result<Vec<DailyEnergyConsumption>, StoreError>;

    /// Applies `patch` to the thresholds row. With `expected_version` set,
    /// the update only goes through if the stored version still matches.
    async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<Thresholds, StoreError>;

    async fn update_schedule(
        &self,
        patch: &SchedulePatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<IrrigationSchedule, StoreError>;

    async fn update_device_control(
        &self,
        device_name: &str,
        patch: &DeviceControlPatch,
        at: DateTime<Utc>,
    ) -> Result<DeviceControl, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn range<T>(&self, table: &'static str, query: RangeQuery) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        // `table` and the direction are compile-time constants, never user input.
        let sql = format!(
            "SELECT * FROM {table} WHERE created_at >= $1 ORDER BY created_at {} LIMIT $2",
            query.order.as_sql()
        );
        let rows = sqlx::query_as::<_, T>(&sql)
            .bind(query.since)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn singleton_version(&self, table: &'static str) -> Result<Option<i64>, StoreError> {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        let version = sqlx::query_scalar::<_, i64>(&sql)
            .bind(SINGLETON_ID)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    /// Turns an update that matched no row into the right error.
    async fn explain_missed_update(
        &self,
        table: &'static str,
        expected_version: Option<i64>,
    ) -> StoreError {
        match (self.singleton_version(table).await, expected_version) {
            (Ok(Some(actual)), Some(expected)) => {
                StoreError::VersionConflict { table, expected, actual }
            }
            (Ok(_), _) => StoreError::NotFound(table.to_owned()),
            (Err(e), _) => e,
        }
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn latest_sensor_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        let row = sqlx::query_as::<_, SensorReading>(
            "SELECT * FROM sensor_readings ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_energy_reading(&self) -> Result<Option<EnergyReading>, StoreError> {
        let row = sqlx::query_as::<_, EnergyReading>(
            "SELECT * FROM energy_readings ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn device_controls(&self) -> Result<Vec<DeviceControl>, StoreError> {
        let rows = sqlx::query_as::<_, DeviceControl>(
            "SELECT * FROM device_control ORDER BY last_updated DESC NULLS LAST, device_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn thresholds(&self) -> Result<Option<Thresholds>, StoreError> {
        let row = sqlx::query_as::<_, Thresholds>("SELECT * FROM thresholds WHERE id = $1")
            .bind(SINGLETON_ID)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn irrigation_schedule(&self) -> Result<Option<IrrigationSchedule>, StoreError> {
        let row =
            sqlx::query_as::<_, IrrigationSchedule>("SELECT * FROM irrigation_schedule WHERE id = $1")
                .bind(SINGLETON_ID)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn sensor_readings(&self, query: RangeQuery) -> Result<Vec<SensorReading>, StoreError> {
        self.range("sensor_readings", query).await
    }

    async fn energy_readings(&self, query: RangeQuery) -> Result<Vec<EnergyReading>, StoreError> {
        self.range("energy_readings", query).await
    }

    async fn irrigation_logs(&self, query: RangeQuery) -> Result<Vec<IrrigationLog>, StoreError> {
        self.range("irrigation_logs", query).await
    }

    async fn energy_logs(&self, query: RangeQuery) -> Result<Vec<EnergyLog>, StoreError> {
        self.range("energy_logs", query).await
    }

    async fn daily_energy_consumption(&self) -> Result<Vec<DailyEnergyConsumption>, StoreError> {
        let rows = sqlx::query_as::<_, DailyEnergyConsumption>(
            "SELECT * FROM get_daily_energy_consumption()",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<Thresholds, StoreError> {
        let row = sqlx::query_as::<_, Thresholds>(
            r#"
            UPDATE thresholds SET
                low_water_level   = COALESCE($1, low_water_level),
                low_vitamin_level = COALESCE($2, low_vitamin_level),
                max_temperature   = COALESCE($3, max_temperature),
                min_soil_moisture = COALESCE($4, min_soil_moisture),
                min_light_level   = COALESCE($5, min_light_level),
                updated_at        = $6,
                version           = version + 1
            WHERE id = $7
              AND ($8::BIGINT IS NULL OR version = $8)
            RETURNING *
            "#,
        )
        .bind(patch.low_water_level)
        .bind(patch.low_vitamin_level)
        .bind(patch.max_temperature)
        .bind(patch.min_soil_moisture)
        .bind(patch.min_light_level)
        .bind(at)
        .bind(SINGLETON_ID)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => Err(self.explain_missed_update("thresholds", expected_version).await),
        }
    }

    async fn update_schedule(
        &self,
        patch: &SchedulePatch,
        expected_version: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<IrrigationSchedule, StoreError> {
        let row = sqlx::query_as::<_, IrrigationSchedule>(
            r#"
            UPDATE irrigation_schedule SET
                enabled       = COALESCE($1, enabled),
                morning_time  = COALESCE($2, morning_time),
                evening_time  = COALESCE($3, evening_time),
                tank_rotation = COALESCE($4, tank_rotation),
                weekend_mode  = COALESCE($5, weekend_mode),
                updated_at    = $6,
                version       = version + 1
            WHERE id = $7
              AND ($8::BIGINT IS NULL OR version = $8)
            RETURNING *
            "#,
        )
        .bind(patch.enabled)
        .bind(patch.morning_time)
        .bind(patch.evening_time)
        .bind(patch.tank_rotation)
        .bind(patch.weekend_mode)
        .bind(at)
        .bind(SINGLETON_ID)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => Err(self.explain_missed_update("irrigation_schedule", expected_version).await),
        }
    }

    async fn update_device_control(
        &self,
        device_name: &str,
        patch: &DeviceControlPatch,
        at: DateTime<Utc>,
    ) -> Result<DeviceControl, StoreError> {
        sqlx::query_as::<_, DeviceControl>(
            r#"
            UPDATE device_control SET
                is_active    = COALESCE($1, is_active),
                auto_mode    = COALESCE($2, auto_mode),
                last_updated = $3
            WHERE device_name = $4
            RETURNING *
            "#,
        )
        .bind(patch.is_active)
        .bind(patch.auto_mode)
        .bind(at)
        .bind(device_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("device {device_name:?}")))
    }
}

// ---------------------------------------------------------------------------
// Tests (need a live Postgres: `DATABASE_URL=... cargo test -- --ignored`)
// ---------------------------------------------------------------------------
