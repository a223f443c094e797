//! Transient user-facing notifications ("toasts") raised by mutations and
//! outbound calls. Every notification is logged and the most recent ones are
//! kept for the API.

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};
use utoipa::ToSchema;

const RECENT_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    recent: Arc<RwLock<VecDeque<Notification>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.push(Severity::Success, message.into()).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message.into()).await;
    }

    /// Newest first.
    pub async fn recent(&self) -> Vec<Notification> {
        self.recent.read().await.iter().cloned().collect()
    }

    async fn push(&self, severity: Severity, message: String) {
        match severity {
            Severity::Success => info!(notification = %message, "Notify"),
            Severity::Error => error!(notification = %message, "Notify"),
        }

        let mut recent = self.recent.write().await;
        recent.push_front(Notification { severity, message, at: Utc::now() });
        recent.truncate(RECENT_CAP);
    }
}
