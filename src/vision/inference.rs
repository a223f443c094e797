use std::sync::Arc;

use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::VisionError;

/// Classification scores at or below this are dropped.
const MIN_CLASS_CONFIDENCE: f64 = 0.01;

/// One detected object (centre-based box) or one classification score
/// (all geometry 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prediction {
    pub class: String,
    pub confidence: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnalysisResult {
    pub predictions: Vec<Prediction>,
    /// The model answered with class scores instead of boxes.
    pub is_classification: bool,
    pub time: Option<f64>,
    pub inference_time: Option<f64>,
    pub image: Option<ImageSize>,
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    api_key: String,
}

impl InferenceClient {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                api_key: api_key.to_owned(),
            }),
        }
    }

    /// Posts a base64 image to `<base>/<project>/<version>`. `params` are
    /// appended to the query after the API key.
    pub async fn analyze(
        &self,
        project: &str,
        version: &str,
        params: &[(&str, String)],
        image_base64: &str,
    ) -> Result<AnalysisResult, VisionError> {
        if self.inner.api_key.is_empty() {
            return Err(VisionError::MissingApiKey);
        }

        let endpoint = format!("{}/{project}/{version}", self.inner.base_url);
        let query = std::iter::once(("api_key", self.inner.api_key.as_str()))
            .chain(params.iter().map(|(k, v)| (*k, v.as_str())));
        let url = Url::parse_with_params(&endpoint, query)
            .map_err(|e| VisionError::InvalidRequest(format!("bad inference URL {endpoint}: {e}")))?;
        debug!(endpoint = %endpoint, "Sending image for inference");

        let response = self
            .inner
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(image_base64.to_owned())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Inference API returned error status");
            return Err(VisionError::Api { status: status.as_u16(), body });
        }

        let body: Value = response.json().await?;
        parse_response(body)
    }
}

/// Normalizes both response shapes into a list of predictions.
pub fn parse_response(mut body: Value) -> Result<AnalysisResult, VisionError> {
    let (predictions, is_classification) = match body.get_mut("predictions").map(Value::take) {
        Some(Value::Array(items)) => {
            let predictions = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<Prediction>, _>>()
                .map_err(|e| VisionError::InvalidResponse(e.to_string()))?;
            (predictions, false)
        }
        Some(Value::Object(scores)) => {
            let mut predictions: Vec<Prediction> = scores
                .into_iter()
                .map(|(name, data)| class_score(&name, &data))
                .filter(|p| p.confidence > MIN_CLASS_CONFIDENCE)
                .collect();
            predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            (predictions, true)
        }
        Some(Value::Null) | None => (Vec::new(), false),
        Some(other) => {
            return Err(VisionError::InvalidResponse(format!(
                "unexpected predictions value: {other}"
            )))
        }
    };

    Ok(AnalysisResult {
        predictions,
        is_classification,
        time: body.get("time").and_then(Value::as_f64),
        inference_time: body.get("inference_time").and_then(Value::as_f64),
        image: body
            .get("image")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok()),
    })
}

/// `data` is either `{confidence, ...}` or a bare score.
fn class_score(name: &str, data: &Value) -> Prediction {
    let field = |key: &str| data.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let confidence = data
        .get("confidence")
        .and_then(Value::as_f64)
        .or_else(|| data.as_f64())
        .unwrap_or(0.0);

    Prediction {
        class: clean_class_name(name),
        confidence,
        x: field("x"),
        y: field("y"),
        width: field("width"),
        height: field("height"),
    }
}

/// `Tomato___Early_blight` → `Early blight`.
pub fn clean_class_name(raw: &str) -> String {
    let stripped = match raw.find('_') {
        Some(i) if i > 0 && raw[i..].starts_with("___") => &raw[i + 3..],
        _ => raw,
    };
    stripped.replace('_', " ")
}
