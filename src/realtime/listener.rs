use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgListener, PgPool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ChangeBus, ChangeEvent};

/// NOTIFY channel written by the `notify_table_change()` trigger.
pub const CHANGE_CHANNEL: &str = "table_changes";

/// Pause before retrying after the listener connection fails.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Forwards Postgres change notifications onto `bus` until `cancel` fires.
/// Connection failures are logged and retried every [`RETRY_DELAY`]; the
/// hooks' reconciliation timers cover whatever is missed meanwhile. Spawn
/// this via `tokio::spawn`.
pub async fn run(pool: PgPool, bus: ChangeBus, cancel: CancellationToken) {
    let Some(mut listener) = connect(&pool, &cancel).await else {
        info!("Realtime listener stopped before connecting");
        return;
    };
    info!(channel = CHANGE_CHANNEL, "Realtime listener started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = listener.recv() => match received {
                Ok(notification) => forward(&bus, notification.payload()),
                Err(e) => {
                    // PgListener reconnects on the next recv.
                    error!(error = %e, "Realtime listener connection failed");
                    if !pause(&cancel).await {
                        break;
                    }
                }
            }
        }
    }

    info!("Realtime listener stopped");
}

/// Opens the LISTEN connection, retrying until it works. `None` once
/// `cancel` fires.
async fn connect(pool: &PgPool, cancel: &CancellationToken) -> Option<PgListener> {
    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return None,
            attempt = open(pool) => attempt,
        };
        match attempt {
            Ok(listener) => return Some(listener),
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    retry_secs = RETRY_DELAY.as_secs(),
                    "Failed to start realtime listener"
                );
                if !pause(cancel).await {
                    return None;
                }
            }
        }
    }
}

async fn open(pool: &PgPool) -> Result<PgListener> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .context("Failed to open LISTEN connection")?;
    listener
        .listen(CHANGE_CHANNEL)
        .await
        .with_context(|| format!("Failed to LISTEN on {CHANGE_CHANNEL}"))?;
    Ok(listener)
}

/// Waits out the retry delay. `false` if cancelled meanwhile.
async fn pause(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(RETRY_DELAY) => true,
    }
}

fn forward(bus: &ChangeBus, payload: &str) {
    match serde_json::from_str::<ChangeEvent>(payload) {
        Ok(event) => {
            let table = event.table;
            let kind = event.kind;
            let receivers = bus.publish(event);
            debug!(%table, ?kind, receivers, "Change event published");
        }
        Err(e) => warn!(error = %e, "Ignoring malformed change notification"),
    }
}
