use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;

use super::{camera::CameraClient, VisionError};

const DEFAULT_MIME: &str = "image/jpeg";

/// Where the image to analyse comes from.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    /// `data:<mime>;base64,<payload>`
    DataUri(String),
    /// Any fetchable image URL.
    Url(String),
    /// Snapshot from the camera at this address (`host` or `host:port`).
    Camera(String),
}

/// Base64 image bytes plus their media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub base64: String,
}

impl ImagePayload {
    pub fn from_bytes(mime: Option<&str>, bytes: &[u8]) -> Self {
        Self {
            mime: mime.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MIME).to_owned(),
            base64: STANDARD.encode(bytes),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

impl ImageSource {
    pub async fn resolve(&self, http: &Client) -> Result<ImagePayload, VisionError> {
        match self {
            ImageSource::DataUri(uri) => parse_data_uri(uri),
            ImageSource::Url(url) => fetch_image(http, url).await,
            ImageSource::Camera(ip) => CameraClient::new(http.clone(), ip).capture().await,
        }
    }
}

/// Splits at the first comma. Non-base64 data URIs are encoded here.
pub fn parse_data_uri(uri: &str) -> Result<ImagePayload, VisionError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| VisionError::InvalidImage("not a data URI".to_owned()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| VisionError::InvalidImage("data URI has no payload".to_owned()))?;

    let mut parts = header.split(';');
    let mime = parts.next().filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MIME);
    if parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        Ok(ImagePayload { mime: mime.to_owned(), base64: data.to_owned() })
    } else {
        Ok(ImagePayload::from_bytes(Some(mime), data.as_bytes()))
    }
}

pub(crate) async fn fetch_image(http: &Client, url: &str) -> Result<ImagePayload, VisionError> {
    debug!(url = %url, "Fetching image");
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(VisionError::Fetch { url: url.to_owned(), status: status.as_u16() });
    }

    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_owned());
    let bytes = response.bytes().await?;
    Ok(ImagePayload::from_bytes(mime.as_deref(), &bytes))
}

#[cfg(test)]
mod tests {
    use axum::{http::header, routing::get, Router};

    use super::*;
    use crate::stub::serve;

    #[test]
    fn base64_data_uri_is_split_at_first_comma() {
        let p = parse_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(p.mime, "image/png");
        assert_eq!(p.base64, "iVBORw0KGgo=");
        assert_eq!(p.data_uri(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn plain_data_uri_is_encoded() {
        let p = parse_data_uri("data:,hello").unwrap();
        assert_eq!(p.mime, "image/jpeg");
        assert_eq!(p.base64, "aGVsbG8=");
    }

    #[test]
    fn malformed_data_uri() {
        assert!(matches!(parse_data_uri("image/png;base64"), Err(VisionError::InvalidImage(_))));
        assert!(matches!(parse_data_uri("data:image/png;base64"), Err(VisionError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn url_source_is_fetched_and_encoded() {
        let app = Router::new().route(
            "/leaf.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], "hello") }),
        );
        let base = serve(app).await;

        let payload = ImageSource::Url(format!("{base}/leaf.png"))
            .resolve(&Client::new())
            .await
            .unwrap();
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.base64, "aGVsbG8=");
    }

    #[tokio::test]
    async fn missing_image_is_a_fetch_error() {
        let base = serve(Router::new()).await;
        let err = fetch_image(&Client::new(), &format!("{base}/nope.jpg")).await.unwrap_err();
        assert!(matches!(err, VisionError::Fetch { status: 404, .. }));
    }
}
