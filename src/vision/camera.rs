use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::info;

use super::{
    source::{fetch_image, ImagePayload},
    VisionError,
};

/// ESP32-CAM style camera: `/capture` returns a JPEG snapshot, `/stream`
/// an MJPEG stream.
#[derive(Debug, Clone)]
pub struct CameraClient {
    http: Client,
    address: String,
}

impl CameraClient {
    pub fn new(http: Client, address: &str) -> Self {
        Self { http, address: address.trim().trim_end_matches('/').to_owned() }
    }

    pub fn capture_url(&self) -> String {
        format!("http://{}/capture", self.address)
    }

    /// Cache-busting stream URL for clients that render the stream.
    pub fn stream_url(&self, now: DateTime<Utc>) -> String {
        format!("http://{}/stream?t={}", self.address, now.timestamp_millis())
    }

    pub async fn capture(&self) -> Result<ImagePayload, VisionError> {
        if self.address.is_empty() {
            return Err(VisionError::CameraNotConfigured);
        }
        let payload = fetch_image(&self.http, &self.capture_url())
            .await
            .map_err(|e| VisionError::Camera(e.to_string()))?;
        info!(camera = %self.address, "Image captured from camera");
        Ok(payload)
    }
}
