//! Debounced write-through of the local player's row
//!
//! The game loop publishes every local move into a watch channel, which only
//! ever holds the newest row. A background writer wakes on a fixed interval
//! and upserts that row if it changed since the last write, so a burst of
//! moves between two wakes costs a single request.

use crate::database::PlayerStore;
use log::{debug, error};
use shared::PlayerRow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub struct PositionSync {
    latest: watch::Sender<PlayerRow>,
    stop: oneshot::Sender<()>,
    writer: JoinHandle<()>,
}

impl PositionSync {
    /// Starts the writer; `initial` is treated as already written.
    pub fn start<S: PlayerStore>(
        runtime: &Handle,
        store: Arc<S>,
        initial: PlayerRow,
        write_interval: Duration,
    ) -> Self {
        let (latest, rx) = watch::channel(initial);
        let (stop, stop_rx) = oneshot::channel();
        let writer = runtime.spawn(run_writer(store, rx, stop_rx, write_interval));
        Self {
            latest,
            stop,
            writer,
        }
    }

    /// Replaces the pending row; only the newest one is ever written.
    pub fn publish(&self, row: PlayerRow) {
        self.latest.send_replace(row);
    }

    /// Stops the writer, letting an in-flight upsert finish first.
    ///
    /// Anything published but not yet written is dropped.
    pub async fn shutdown(self) {
        let Self { stop, writer, .. } = self;
        let _ = stop.send(());
        if let Err(e) = writer.await {
            if !e.is_cancelled() {
                error!("Position writer ended abnormally: {}", e);
            }
        }
    }

    /// Stops the writer immediately.
    pub fn abort(self) {
        self.writer.abort();
    }
}

async fn run_writer<S: PlayerStore>(
    store: Arc<S>,
    mut rx: watch::Receiver<PlayerRow>,
    mut stop: oneshot::Receiver<()>,
    write_interval: Duration,
) {
    let mut ticker = interval(write_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut retry = false;

    loop {
        // Stop wins over an overdue tick.
        tokio::select! {
            biased;
            _ = &mut stop => {
                debug!("Position writer stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        let changed = match rx.has_changed() {
            Ok(changed) => changed,
            Err(_) => return,
        };
        if !changed && !retry {
            continue;
        }

        let row = rx.borrow_and_update().clone();
        match store.upsert_player(&row).await {
            Ok(()) => retry = false,
            Err(e) => {
                error!("Failed to update player position: {}", e);
                retry = true;
            }
        }
    }
}
