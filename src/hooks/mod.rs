//! View-model hooks: each hook reads an initial window from the store,
//! follows realtime channels, reconciles on a timer, and publishes derived
//! state for the API.

pub mod activity;
mod actor;
pub mod energy;
pub mod export;
pub mod historical;
pub mod live;
pub mod series;
pub mod stats;
pub mod status;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    db::{StoreError, TelemetryStore},
    realtime::{ChangeEvent, Subscription},
};

pub use actor::HookHandle;

/// `Idle → Loading → {Ready, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// What a hook publishes after every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct HookState<T> {
    pub status: LoadStatus,
    /// Message of the failed read while `status` is `error`.
    pub error: Option<String>,
    pub data: T,
    pub last_update: Option<DateTime<Utc>>,
}

/// Outcome of feeding one realtime event to a view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// State changed in place.
    Applied,
    /// The view needs a full re-read.
    Refetch,
    /// Nothing to do (stale, undecodable or irrelevant event).
    Ignored,
}

/// A named realtime channel a hook opens on spawn.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub subscriptions: Vec<Subscription>,
}

impl ChannelSpec {
    pub fn new(name: &'static str, subscriptions: Vec<Subscription>) -> Self {
        Self { name, subscriptions }
    }
}

/// The per-hook logic driven by [`HookHandle`]. Implementations are pure
/// apart from `fetch`.
#[async_trait]
pub trait ViewModel: Send + Sync + 'static {
    type Data: Clone + Default + Send + Sync + 'static;
    type Snapshot: Send + 'static;

    fn name(&self) -> &'static str;

    fn channels(&self) -> Vec<ChannelSpec>;

    /// Period of the reconciliation read.
    fn refresh_interval(&self) -> Duration;

    /// The full initial read. Also used for reconciliation and refetches.
    async fn fetch(
        &self,
        store: &dyn TelemetryStore,
        now: DateTime<Utc>,
    ) -> Result<Self::Snapshot, StoreError>;

    fn apply_snapshot(&self, data: &mut Self::Data, snapshot: Self::Snapshot);

    fn apply_event(&self, data: &mut Self::Data, event: &ChangeEvent) -> EventAction;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::{HookHandle, HookState, LoadStatus};

    /// Waits (bounded) until the hook publishes a state matching `pred`.
    pub async fn wait_for<D, F>(handle: &HookHandle<D>, pred: F) -> HookState<D>
    where
        D: Clone + Default + Send + Sync + 'static,
        F: FnMut(&HookState<D>) -> bool,
    {
        let mut rx = handle.watch();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("timed out waiting for hook state")
            .expect("hook stopped");
        state.clone()
    }

    pub async fn wait_ready<D>(handle: &HookHandle<D>) -> HookState<D>
    where
        D: Clone + Default + Send + Sync + 'static,
    {
        wait_for(handle, |s| s.status == LoadStatus::Ready).await
    }
}
