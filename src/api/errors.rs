use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{db::StoreError, vision::VisionError, weather::WeatherError};

/// A resource the handler looked for does not exist yet (no weather data,
/// no camera).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotFound(pub String);

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is::<NotFound>() {
            return StatusCode::NOT_FOUND;
        }
        if let Some(e) = self.0.downcast_ref::<StoreError>() {
            return match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::VersionConflict { .. } => StatusCode::CONFLICT,
                StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if let Some(e) = self.0.downcast_ref::<VisionError>() {
            return match e {
                VisionError::InvalidRequest(_)
                | VisionError::InvalidImage(_)
                | VisionError::CameraNotConfigured => StatusCode::BAD_REQUEST,
                VisionError::Fetch { .. }
                | VisionError::Camera(_)
                | VisionError::Api { .. }
                | VisionError::Http(_)
                | VisionError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
                VisionError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if let Some(e) = self.0.downcast_ref::<WeatherError>() {
            return match e {
                WeatherError::Api { .. } | WeatherError::Http(_) => StatusCode::BAD_GATEWAY,
                WeatherError::MissingApiKey | WeatherError::Url(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
