//! Per-table change events and the in-process bus that fans them out to
//! hook channels.

pub mod listener;

use std::{fmt, pin::Pin};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::{debug, warn};

/// Number of events a slow channel may fall behind before it starts
/// dropping them.
const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    SensorReadings,
    EnergyReadings,
    EnergyLogs,
    IrrigationLogs,
    DeviceControl,
    Thresholds,
    IrrigationSchedule,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Table::SensorReadings => "sensor_readings",
            Table::EnergyReadings => "energy_readings",
            Table::EnergyLogs => "energy_logs",
            Table::IrrigationLogs => "irrigation_logs",
            Table::DeviceControl => "device_control",
            Table::Thresholds => "thresholds",
            Table::IrrigationSchedule => "irrigation_schedule",
        };
        f.write_str(s)
    }
}

/// Mirrors `TG_OP` of the notify trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants; `Any` is the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Insert,
    Update,
    Delete,
    Any,
}

impl EventFilter {
    pub fn matches(self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (EventFilter::Any, _)
                | (EventFilter::Insert, ChangeKind::Insert)
                | (EventFilter::Update, ChangeKind::Update)
                | (EventFilter::Delete, ChangeKind::Delete)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub table: Table,
    pub filter: EventFilter,
}

impl Subscription {
    pub const fn new(table: Table, filter: EventFilter) -> Self {
        Self { table, filter }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table == event.table && self.filter.matches(event.kind)
    }
}

/// One row change as published by the `notify_table_change()` trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// New row; absent for deletes.
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    /// Previous row; absent for inserts.
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Builds an event carrying `row` as its new record.
    pub fn new<T: Serialize>(table: Table, kind: ChangeKind, row: &T) -> serde_json::Result<Self> {
        Ok(Self {
            table,
            kind,
            record: Some(serde_json::to_value(row)?),
            old_record: None,
        })
    }

    /// Decodes the new record into a typed row. Returns `None` (and logs)
    /// when there is no record or it does not match `T`.
    pub fn record_as<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.record.clone()?;
        match serde_json::from_value(value) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(table = %self.table, error = %e, "Discarding undecodable change record");
                None
            }
        }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Broadcast hub every change event passes through. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Delivers `event` to every open channel. Returns how many receivers
    /// saw it (0 when nobody is subscribed).
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Opens a named channel receiving every event matched by at least one
    /// of `subscriptions`.
    pub fn channel(&self, name: &str, subscriptions: Vec<Subscription>) -> Channel {
        debug!(channel = %name, "Opening realtime channel");
        Channel {
            name: name.to_owned(),
            subscriptions,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of channels currently open.
    pub fn open_channels(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Channel {
    name: String,
    subscriptions: Vec<Subscription>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Channel {
    /// Turns the channel into a stream of matching events. Lagged receivers
    /// skip the dropped events; the owning hook's reconciliation read covers
    /// the gap.
    pub fn into_stream(self) -> EventStream {
        let Channel { name, subscriptions, rx } = self;
        let stream = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(event) if subscriptions.iter().any(|s| s.matches(&event)) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(channel = %name, skipped, "Realtime channel lagged; events dropped");
                None
            }
        });
        Box::pin(stream)
    }
}
