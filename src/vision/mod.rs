//! Fruit-ripeness and leaf-disease analysis: image acquisition, hosted
//! inference, overlay rendering and a rolling detection history.

pub mod annotate;
pub mod camera;
pub mod classes;
pub mod history;
pub mod inference;
pub mod presets;
pub mod source;

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use utoipa::ToSchema;

use crate::notify::Notifier;

use self::{
    annotate::Overlay,
    history::{DetectionHistory, DetectionRecord},
    inference::{AnalysisResult, InferenceClient},
    presets::ModelPreset,
    source::ImageSource,
};

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Inference API key is not configured")]
    MissingApiKey,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("failed to fetch image from {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("Failed to capture image from camera: {0}")]
    Camera(String),

    #[error("Camera address is not configured")]
    CameraNotConfigured,

    #[error("API Error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected inference response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Ripeness,
    LeafDisease,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Panel::Ripeness => "ripeness",
            Panel::LeafDisease => "leaf_disease",
        })
    }
}

impl Panel {
    /// Query parameters sent with every request of this panel unless the
    /// caller overrides them.
    fn default_thresholds(self) -> (Option<u8>, Option<u8>) {
        match self {
            Panel::Ripeness => (None, None),
            Panel::LeafDisease => (Some(40), Some(30)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub source: ImageSource,
    /// Key of a model preset; takes precedence over `project_id`/`version`.
    pub preset: Option<String>,
    pub project_id: Option<String>,
    pub version: Option<String>,
    /// Minimum confidence, percent.
    pub confidence: Option<u8>,
    /// Maximum box overlap, percent.
    pub overlap: Option<u8>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalysisOutcome {
    pub panel: Panel,
    pub project_id: String,
    pub version: String,
    pub result: AnalysisResult,
    /// Empty for classification models.
    pub overlays: Vec<Overlay>,
    /// The analysed image with overlays, for detection models.
    pub annotated_svg: Option<String>,
    /// Predictions per lower-cased class.
    pub class_counts: BTreeMap<String, usize>,
    pub analyzed_at: DateTime<Utc>,
}

/// One analysis panel: its inference endpoint, presets and history.
#[derive(Debug, Clone)]
pub struct DetectionService {
    panel: Panel,
    http: Client,
    client: InferenceClient,
    history: Arc<RwLock<DetectionHistory>>,
    notifier: Notifier,
}

impl DetectionService {
    pub fn new(panel: Panel, http: Client, base_url: &str, api_key: &str, notifier: Notifier) -> Self {
        Self {
            panel,
            client: InferenceClient::new(http.clone(), base_url, api_key),
            http,
            history: Arc::new(RwLock::new(DetectionHistory::default())),
            notifier,
        }
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn presets(&self) -> &'static [ModelPreset] {
        presets::presets(self.panel)
    }

    /// Newest first.
    pub async fn history(&self) -> Vec<DetectionRecord> {
        self.history.read().await.to_vec()
    }

    fn model_for(&self, request: &AnalyzeRequest) -> Result<(String, String), VisionError> {
        if let Some(key) = request.preset.as_deref() {
            let preset = presets::find(self.panel, key).ok_or_else(|| {
                VisionError::InvalidRequest(format!("unknown {} preset {key:?}", self.panel))
            })?;
            return Ok((preset.project_id.to_owned(), preset.version.to_owned()));
        }
        match (request.project_id.as_deref(), request.version.as_deref()) {
            (Some(project), Some(version)) if !project.is_empty() && !version.is_empty() => {
                Ok((project.to_owned(), version.to_owned()))
            }
            _ => Err(VisionError::InvalidRequest(
                "Please provide a preset or a project ID and version".to_owned(),
            )),
        }
    }

    /// Loads the image, runs inference and records the predictions. Both
    /// outcomes raise a notification; nothing is retried.
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisOutcome, VisionError> {
        match self.run(request).await {
            Ok(outcome) => {
                let n = outcome.result.predictions.len();
                let message = if outcome.result.is_classification {
                    format!("Classification complete! Found {n} classes")
                } else {
                    format!("Detection complete! Found {n} detections")
                };
                self.notifier.success(message).await;
                Ok(outcome)
            }
            Err(e) => {
                self.notifier.error(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run(&self, request: AnalyzeRequest) -> Result<AnalysisOutcome, VisionError> {
        let (project_id, version) = self.model_for(&request)?;
        let image = request.source.resolve(&self.http).await?;

        let (default_confidence, default_overlap) = self.panel.default_thresholds();
        let mut params = Vec::new();
        if let Some(c) = request.confidence.or(default_confidence) {
            params.push(("confidence", c.to_string()));
        }
        if let Some(o) = request.overlap.or(default_overlap) {
            params.push(("overlap", o.to_string()));
        }

        let result = self.client.analyze(&project_id, &version, &params, &image.base64).await?;
        let analyzed_at = Utc::now();
        info!(
            panel = %self.panel,
            project = %project_id,
            version = %version,
            predictions = result.predictions.len(),
            classification = result.is_classification,
            "Image analysed"
        );

        self.history.write().await.record(&result.predictions, analyzed_at);

        let overlays = annotate::overlays(&result.predictions, result.is_classification);
        let annotated_svg = (!result.is_classification)
            .then(|| annotate::render_svg(&image, result.image, &overlays));

        Ok(AnalysisOutcome {
            panel: self.panel,
            project_id,
            version,
            class_counts: classes::class_counts(&result.predictions),
            overlays,
            annotated_svg,
            result,
            analyzed_at,
        })
    }
}
