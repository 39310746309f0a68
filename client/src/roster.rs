//! Local copy of the players table, keyed by row identity

use crate::realtime::ChangeEvent;
use log::{debug, warn};
use shared::{PlayerRow, Position};
use uuid::Uuid;

/// Every known player in join order.
///
/// The local player's row is owned by this client: remote echoes of it are
/// dropped so a stale write never pulls the square back.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    players: Vec<PlayerRow>,
    local_id: Option<Uuid>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRow> {
        self.players.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&PlayerRow> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn local_id(&self) -> Option<Uuid> {
        self.local_id
    }

    pub fn local(&self) -> Option<&PlayerRow> {
        self.local_id.and_then(|id| self.get(id))
    }

    pub fn is_local(&self, id: Uuid) -> bool {
        self.local_id == Some(id)
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    fn upsert(&mut self, row: PlayerRow) {
        match self.index_of(row.id) {
            Some(index) => self.players[index] = row,
            None => self.players.push(row),
        }
    }

    /// Replaces the roster with a fresh table read, keeping the local row as we have it.
    pub fn replace_all(&mut self, rows: Vec<PlayerRow>) {
        let local = self.local().cloned();
        self.players = rows;

        if let Some(local) = local {
            self.upsert(local);
        }
    }

    /// Applies one change-feed event.
    pub fn apply(&mut self, change: ChangeEvent) {
        let id = change.id();
        if self.is_local(id) {
            match change {
                ChangeEvent::Deleted(_) => warn!("Own row {} was deleted remotely", id),
                _ => debug!("Ignoring echo of own row {}", id),
            }
            return;
        }

        match change {
            ChangeEvent::Inserted(row) => {
                if self.index_of(row.id).is_none() {
                    self.players.push(row);
                }
            }
            ChangeEvent::Updated(row) => self.upsert(row),
            ChangeEvent::Deleted(id) => self.players.retain(|p| p.id != id),
        }
    }

    /// Marks `row` as this client's player and inserts it.
    pub fn set_local(&mut self, row: PlayerRow) {
        self.local_id = Some(row.id);
        self.upsert(row);
    }

    /// Moves the local player; returns the updated row for publishing.
    pub fn move_local(&mut self, position: Position) -> Option<PlayerRow> {
        let id = self.local_id?;
        let index = self.index_of(id)?;
        let row = &mut self.players[index];
        row.set_position(position);
        Some(row.clone())
    }

    /// Forgets the local player and drops its row.
    pub fn clear_local(&mut self) {
        if let Some(id) = self.local_id.take() {
            self.players.retain(|p| p.id != id);
        }
    }
}
