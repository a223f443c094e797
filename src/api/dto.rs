use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{SchedulePatch, ThresholdsPatch};

/// Body of `PATCH /settings/thresholds`. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ThresholdsUpdate {
    #[serde(flatten)]
    pub patch: ThresholdsPatch,
    /// Version the caller last saw; the write is rejected with 409 if the
    /// row has moved on since.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScheduleUpdate {
    #[serde(flatten)]
    pub patch: SchedulePatch,
    pub expected_version: Option<i64>,
}

/// Body of `PUT /settings/auto-mode`; applies to every device.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AutoModeUpdate {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CameraInfo {
    pub capture_url: String,
    /// Cache-busted MJPEG stream URL.
    pub stream_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshAccepted {
    pub hook: String,
}
