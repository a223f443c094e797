pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    hooks::{
        activity::ActivityFeed, energy::EnergyView, historical::HistoricalView,
        live::DashboardView, HookHandle,
    },
    notify::Notifier,
    settings::SettingsService,
    vision::{camera::CameraClient, DetectionService, Panel},
    weather::WeatherService,
};

/// Everything the handlers read from or act on.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<HookHandle<DashboardView>>,
    pub energy: Arc<HookHandle<EnergyView>>,
    pub history: Arc<HookHandle<HistoricalView>>,
    pub activity: Arc<HookHandle<ActivityFeed>>,
    pub settings: SettingsService,
    pub ripeness: DetectionService,
    pub leaf_disease: DetectionService,
    pub camera: Option<CameraClient>,
    pub weather: WeatherService,
    pub notifier: Notifier,
}

impl AppState {
    pub fn detector(&self, panel: Panel) -> &DetectionService {
        match panel {
            Panel::Ripeness => &self.ripeness,
            Panel::LeafDisease => &self.leaf_disease,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/dashboard/refresh", post(handlers::refresh_dashboard))
        .route("/energy", get(handlers::get_energy))
        .route("/energy/refresh", post(handlers::refresh_energy))
        .route("/history", get(handlers::get_history))
        .route("/history/refresh", post(handlers::refresh_history))
        .route("/activity", get(handlers::get_activity))
        .route("/activity/refresh", post(handlers::refresh_activity))
        .route("/activity/export", get(handlers::export_activity))
        .route("/settings/thresholds", patch(handlers::update_thresholds))
        .route("/settings/schedule", patch(handlers::update_schedule))
        .route("/settings/auto-mode", put(handlers::set_auto_mode))
        .route("/devices/{device_name}", patch(handlers::update_device))
        .route("/detections/{panel}/presets", get(handlers::list_presets))
        .route("/detections/{panel}/analyze", post(handlers::analyze))
        .route("/detections/{panel}/history", get(handlers::detection_history))
        .route("/camera", get(handlers::get_camera))
        .route("/weather", get(handlers::get_weather))
        .route("/weather/refresh", post(handlers::refresh_weather))
        .route("/notifications", get(handlers::list_notifications))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
