use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_stream::{StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{EventAction, HookState, LoadStatus, ViewModel};
use crate::{
    db::TelemetryStore,
    realtime::{ChangeBus, ChangeEvent, EventStream},
};

#[derive(Debug)]
enum Command {
    Refetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    Initial,
    Manual,
    Reconcile,
    EventRefetch,
}

impl LoadKind {
    /// Initial and manual reads drive the `Loading → Ready | Error`
    /// transition; the others refresh a view that is already up.
    fn is_user_visible(self) -> bool {
        matches!(self, LoadKind::Initial | LoadKind::Manual)
    }
}

/// Owner-side handle of a running hook.
///
/// Every producer (realtime channels, reconciliation timer, refetch
/// commands) is serialized through a single task; readers get snapshots
/// through a `watch` channel. Dropping the handle tears the hook down.
pub struct HookHandle<D> {
    name: &'static str,
    state: watch::Receiver<HookState<D>>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<D> HookHandle<D>
where
    D: Clone + Default + Send + Sync + 'static,
{
    /// Opens the model's channels on `bus` and spawns its actor. Channels
    /// are open before this returns, so no event published afterwards is
    /// missed.
    pub fn spawn<M>(model: M, store: Arc<dyn TelemetryStore>, bus: &ChangeBus) -> Self
    where
        M: ViewModel<Data = D>,
    {
        let name = model.name();

        let mut events = StreamMap::new();
        for spec in model.channels() {
            events.insert(spec.name, bus.channel(spec.name, spec.subscriptions).into_stream());
        }

        let (state_tx, state_rx) = watch::channel(HookState::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let actor = HookActor {
            model,
            store,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(actor.run(events, cmd_rx));

        Self {
            name,
            state: state_rx,
            commands: cmd_tx,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current published state.
    pub fn state(&self) -> HookState<D> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<HookState<D>> {
        self.state.clone()
    }

    /// Requests a full re-read (`→ Loading → Ready | Error`). Returns
    /// `false` once the hook has stopped.
    pub async fn refetch(&self) -> bool {
        self.commands.send(Command::Refetch).await.is_ok()
    }

    /// Closes every channel, stops the timer, cancels an in-flight read and
    /// waits for the actor to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(hook = self.name, error = %e, "Hook task panicked");
            }
        }
    }
}

impl<D> Drop for HookHandle<D> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct HookActor<M: ViewModel> {
    model: M,
    store: Arc<dyn TelemetryStore>,
    state: watch::Sender<HookState<M::Data>>,
    cancel: CancellationToken,
}

impl<M: ViewModel> HookActor<M> {
    async fn run(
        self,
        mut events: StreamMap<&'static str, EventStream>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let name = self.model.name();
        let period = self.model.refresh_interval();
        info!(
            hook = name,
            channels = events.len(),
            refresh_secs = period.as_secs(),
            "Hook started"
        );

        self.load(LoadKind::Initial).await;

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(command) = commands.recv() => match command {
                    Command::Refetch => self.load(LoadKind::Manual).await,
                },
                Some((channel, event)) = events.next(), if !events.is_empty() => {
                    self.on_event(channel, event).await;
                }
                _ = ticker.tick() => self.reconcile().await,
            }
        }

        for channel in events.keys() {
            debug!(hook = name, channel = *channel, "Closing realtime channel");
        }
        drop(events);
        info!(hook = name, "Hook stopped");
    }

    fn status(&self) -> LoadStatus {
        self.state.borrow().status
    }

    async fn load(&self, kind: LoadKind) {
        let name = self.model.name();

        if kind.is_user_visible() {
            self.state.send_modify(|s| {
                s.status = LoadStatus::Loading;
                s.error = None;
            });
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = self.model.fetch(self.store.as_ref(), Utc::now()) => result,
        };

        match result {
            Ok(snapshot) => {
                self.state.send_modify(|s| {
                    self.model.apply_snapshot(&mut s.data, snapshot);
                    s.status = LoadStatus::Ready;
                    s.error = None;
                    s.last_update = Some(Utc::now());
                });
                debug!(hook = name, kind = ?kind, "Hook data loaded");
            }
            Err(e) if kind.is_user_visible() => {
                error!(hook = name, error = %e, "Initial read failed");
                self.state.send_modify(|s| {
                    s.status = LoadStatus::Error;
                    s.error = Some(e.to_string());
                });
            }
            Err(e) => {
                warn!(hook = name, kind = ?kind, error = %e, "Refresh failed; keeping previous data");
            }
        }
    }

    /// Timer-driven re-read. A hook in `Error` waits for a manual refetch.
    async fn reconcile(&self) {
        if self.status() == LoadStatus::Error {
            debug!(hook = self.model.name(), "Skipping reconciliation while in error state");
            return;
        }
        debug!(hook = self.model.name(), "Reconciling");
        self.load(LoadKind::Reconcile).await;
    }

    async fn on_event(&self, channel: &str, event: ChangeEvent) {
        let mut action = EventAction::Ignored;
        self.state.send_if_modified(|s| {
            action = self.model.apply_event(&mut s.data, &event);
            if action == EventAction::Applied {
                s.last_update = Some(Utc::now());
                true
            } else {
                false
            }
        });

        debug!(
            hook = self.model.name(),
            channel,
            table = %event.table,
            kind = ?event.kind,
            action = ?action,
            "Change event handled"
        );

        if action == EventAction::Refetch && self.status() != LoadStatus::Error {
            self.load(LoadKind::EventRefetch).await;
        }
    }
}
