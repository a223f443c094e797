use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::info;
use utoipa::OpenApi;

use super::{
    dto::{AutoModeUpdate, CameraInfo, RefreshAccepted, ScheduleUpdate, ThresholdsUpdate},
    errors::{AppError, NotFound},
    AppState,
};
use crate::{
    db::models::{DeviceControl, DeviceControlPatch, IrrigationSchedule, Thresholds},
    hooks::{
        activity::ActivityFeed,
        energy::EnergyView,
        export::{export_csv, export_file_name},
        historical::HistoricalView,
        live::DashboardView,
        HookHandle, HookState,
    },
    notify::Notification,
    vision::{
        history::DetectionRecord, presets::ModelPreset, AnalysisOutcome, AnalyzeRequest, Panel,
    },
    weather::WeatherReport,
};

type Accepted = (StatusCode, Json<RefreshAccepted>);

async fn request_refetch<D>(hook: &HookHandle<D>) -> Result<Accepted, AppError>
where
    D: Clone + Default + Send + Sync + 'static,
{
    if !hook.refetch().await {
        return Err(anyhow!("{} has stopped", hook.name()).into());
    }
    info!(hook = hook.name(), "Refetch requested");
    Ok((StatusCode::ACCEPTED, Json(RefreshAccepted { hook: hook.name().to_owned() })))
}

// ---------------------------------------------------------------------------
// Hook views
// ---------------------------------------------------------------------------

/// Latest sensor and energy rows, device states and settings.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Live dashboard state", body = HookState<DashboardView>)),
    tag = "views"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Json<HookState<DashboardView>> {
    Json(state.dashboard.state())
}

#[utoipa::path(
    post,
    path = "/dashboard/refresh",
    responses((status = 202, description = "Refetch queued", body = RefreshAccepted)),
    tag = "views"
)]
pub async fn refresh_dashboard(State(state): State<AppState>) -> Result<Accepted, AppError> {
    request_refetch(&state.dashboard).await
}

/// Latest energy reading, recent readings and today's per-device totals.
#[utoipa::path(
    get,
    path = "/energy",
    responses((status = 200, description = "Energy monitor state", body = HookState<EnergyView>)),
    tag = "views"
)]
pub async fn get_energy(State(state): State<AppState>) -> Json<HookState<EnergyView>> {
    Json(state.energy.state())
}

#[utoipa::path(
    post,
    path = "/energy/refresh",
    responses((status = 202, description = "Refetch queued", body = RefreshAccepted)),
    tag = "views"
)]
pub async fn refresh_energy(State(state): State<AppState>) -> Result<Accepted, AppError> {
    request_refetch(&state.energy).await
}

/// Thirty-day chart points with week-over-week statistics.
#[utoipa::path(
    get,
    path = "/history",
    responses((status = 200, description = "Historical data state", body = HookState<HistoricalView>)),
    tag = "views"
)]
pub async fn get_history(State(state): State<AppState>) -> Json<HookState<HistoricalView>> {
    Json(state.history.state())
}

#[utoipa::path(
    post,
    path = "/history/refresh",
    responses((status = 202, description = "Refetch queued", body = RefreshAccepted)),
    tag = "views"
)]
pub async fn refresh_history(State(state): State<AppState>) -> Result<Accepted, AppError> {
    request_refetch(&state.history).await
}

/// Irrigation runs, device operations and alerts, newest first.
#[utoipa::path(
    get,
    path = "/activity",
    responses((status = 200, description = "Activity feed state", body = HookState<ActivityFeed>)),
    tag = "views"
)]
pub async fn get_activity(State(state): State<AppState>) -> Json<HookState<ActivityFeed>> {
    Json(state.activity.state())
}

#[utoipa::path(
    post,
    path = "/activity/refresh",
    responses((status = 202, description = "Refetch queued", body = RefreshAccepted)),
    tag = "views"
)]
pub async fn refresh_activity(State(state): State<AppState>) -> Result<Accepted, AppError> {
    request_refetch(&state.activity).await
}

/// The current activity feed as a CSV download.
#[utoipa::path(
    get,
    path = "/activity/export",
    responses(
        (status = 200, description = "CSV file", body = String, content_type = "text/csv"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "views"
)]
pub async fn export_activity(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let feed = state.activity.state().data;
    let csv = export_csv(&feed.activities)?;
    let file_name = export_file_name(Utc::now());
    info!(rows = feed.activities.len(), file = %file_name, "Activity exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        csv,
    ))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/settings/thresholds",
    request_body = ThresholdsUpdate,
    responses(
        (status = 200, description = "Updated thresholds", body = Thresholds),
        (status = 404, description = "Thresholds row missing"),
        (status = 409, description = "Row changed since `expected_version`"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "settings"
)]
pub async fn update_thresholds(
    State(state): State<AppState>,
    Json(body): Json<ThresholdsUpdate>,
) -> Result<Json<Thresholds>, AppError> {
    let row = state.settings.update_thresholds(&body.patch, body.expected_version).await?;
    Ok(Json(row))
}

#[utoipa::path(
    patch,
    path = "/settings/schedule",
    request_body = ScheduleUpdate,
    responses(
        (status = 200, description = "Updated irrigation schedule", body = IrrigationSchedule),
        (status = 404, description = "Schedule row missing"),
        (status = 409, description = "Row changed since `expected_version`"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "settings"
)]
pub async fn update_schedule(
    State(state): State<AppState>,
    Json(body): Json<ScheduleUpdate>,
) -> Result<Json<IrrigationSchedule>, AppError> {
    let row = state.settings.update_schedule(&body.patch, body.expected_version).await?;
    Ok(Json(row))
}

#[utoipa::path(
    patch,
    path = "/devices/{device_name}",
    params(("device_name" = String, Path, description = "Actuator name, e.g. `pump`")),
    request_body = DeviceControlPatch,
    responses(
        (status = 200, description = "Updated device", body = DeviceControl),
        (status = 404, description = "Unknown device"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "settings"
)]
pub async fn update_device(
    State(state): State<AppState>,
    Path(device_name): Path<String>,
    Json(patch): Json<DeviceControlPatch>,
) -> Result<Json<DeviceControl>, AppError> {
    let row = state.settings.update_device_control(&device_name, &patch).await?;
    Ok(Json(row))
}

#[utoipa::path(
    put,
    path = "/settings/auto-mode",
    request_body = AutoModeUpdate,
    responses(
        (status = 200, description = "Every device after the update", body = Vec<DeviceControl>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "settings"
)]
pub async fn set_auto_mode(
    State(state): State<AppState>,
    Json(body): Json<AutoModeUpdate>,
) -> Result<Json<Vec<DeviceControl>>, AppError> {
    let rows = state.settings.set_auto_mode_all(body.enabled).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/detections/{panel}/presets",
    params(("panel" = Panel, Path, description = "`ripeness` or `leaf_disease`")),
    responses((status = 200, description = "Model presets of the panel", body = Vec<ModelPreset>)),
    tag = "detections"
)]
pub async fn list_presets(
    State(state): State<AppState>,
    Path(panel): Path<Panel>,
) -> Json<&'static [ModelPreset]> {
    Json(state.detector(panel).presets())
}

/// Runs one image through the panel's inference model.
#[utoipa::path(
    post,
    path = "/detections/{panel}/analyze",
    params(("panel" = Panel, Path, description = "`ripeness` or `leaf_disease`")),
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Predictions with overlays", body = AnalysisOutcome),
        (status = 400, description = "No model selected or unreadable image"),
        (status = 502, description = "Image source or inference API failed"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "detections"
)]
pub async fn analyze(
    State(state): State<AppState>,
    Path(panel): Path<Panel>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisOutcome>, AppError> {
    let outcome = state.detector(panel).analyze(request).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/detections/{panel}/history",
    params(("panel" = Panel, Path, description = "`ripeness` or `leaf_disease`")),
    responses((status = 200, description = "Recent predictions, newest first", body = Vec<DetectionRecord>)),
    tag = "detections"
)]
pub async fn detection_history(
    State(state): State<AppState>,
    Path(panel): Path<Panel>,
) -> Json<Vec<DetectionRecord>> {
    Json(state.detector(panel).history().await)
}

#[utoipa::path(
    get,
    path = "/camera",
    responses(
        (status = 200, description = "Camera endpoints", body = CameraInfo),
        (status = 404, description = "No camera configured"),
    ),
    tag = "detections"
)]
pub async fn get_camera(State(state): State<AppState>) -> Result<Json<CameraInfo>, AppError> {
    let camera = state
        .camera
        .as_ref()
        .ok_or_else(|| NotFound("Camera address is not configured".to_owned()))?;
    Ok(Json(CameraInfo {
        capture_url: camera.capture_url(),
        stream_url: camera.stream_url(Utc::now()),
    }))
}

// ---------------------------------------------------------------------------
// Weather, notifications, health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/weather",
    responses(
        (status = 200, description = "Cached forecast with irrigation advice", body = WeatherReport),
        (status = 404, description = "No forecast fetched yet"),
    ),
    tag = "weather"
)]
pub async fn get_weather(State(state): State<AppState>) -> Result<Json<WeatherReport>, AppError> {
    let report = state
        .weather
        .report()
        .await
        .ok_or_else(|| NotFound("No weather data available".to_owned()))?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/weather/refresh",
    responses(
        (status = 200, description = "Freshly fetched forecast", body = WeatherReport),
        (status = 502, description = "Weather API failed"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "weather"
)]
pub async fn refresh_weather(State(state): State<AppState>) -> Result<Json<WeatherReport>, AppError> {
    Ok(Json(state.weather.refresh().await?))
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses((status = 200, description = "Recent notifications, newest first", body = Vec<Notification>)),
    tag = "notifications"
)]
pub async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifier.recent().await)
}

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "health"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec struct (used in api/mod.rs)
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_dashboard,
        refresh_dashboard,
        get_energy,
        refresh_energy,
        get_history,
        refresh_history,
        get_activity,
        refresh_activity,
        export_activity,
        update_thresholds,
        update_schedule,
        update_device,
        set_auto_mode,
        list_presets,
        analyze,
        detection_history,
        get_camera,
        get_weather,
        refresh_weather,
        list_notifications,
        health,
    ),
    components(schemas(
        ThresholdsUpdate,
        ScheduleUpdate,
        DeviceControlPatch,
        AutoModeUpdate,
        CameraInfo,
        RefreshAccepted,
        Panel,
        AnalyzeRequest,
        AnalysisOutcome,
        WeatherReport,
        Notification,
    )),
    tags(
        (name = "views", description = "Aggregated telemetry views"),
        (name = "settings", description = "Thresholds, schedule and device control"),
        (name = "detections", description = "Fruit ripeness and leaf disease analysis"),
        (name = "weather", description = "Forecast and irrigation advice"),
        (name = "notifications", description = "Recent success and failure messages"),
        (name = "health", description = "Liveness"),
    ),
    info(
        title = "Smart Irrigation Service API",
        version = "0.1.0",
        description = "Telemetry views, settings and image analysis for a smart irrigation installation"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
