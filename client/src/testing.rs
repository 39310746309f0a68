//! In-memory [`PlayerStore`] for unit tests.

use crate::database::PlayerStore;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use shared::PlayerRow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PlayerRow>>,
    written: Mutex<Vec<PlayerRow>>,
    removed: Mutex<Vec<Uuid>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    upsert_delay: Option<Duration>,
    remove_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn with_rows(rows: Vec<PlayerRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    /// Fails the next `times` upserts.
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Default::default()
        }
    }

    /// Each upsert takes `delay` before it lands.
    pub fn with_upsert_delay(mut self, delay: Duration) -> Self {
        self.upsert_delay = Some(delay);
        self
    }

    /// Each removal takes `delay` before it lands.
    pub fn with_remove_delay(mut self, delay: Duration) -> Self {
        self.remove_delay = Some(delay);
        self
    }

    pub fn written(&self) -> Vec<PlayerRow> {
        self.written.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        self.removed.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn upsert_player(&self, row: &PlayerRow) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(ClientError::Timeout);
        }
        if let Some(delay) = self.upsert_delay {
            tokio::time::sleep(delay).await;
        }

        self.written.lock().unwrap().push(row.clone());
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(())
    }

    async fn remove_player(&self, id: Uuid) -> Result<()> {
        if let Some(delay) = self.remove_delay {
            tokio::time::sleep(delay).await;
        }
        self.removed.lock().unwrap().push(id);
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn fetch_players(&self) -> Result<Vec<PlayerRow>> {
        Ok(self.rows.lock().unwrap().clone())
    }
}
