//! Session state: joining, playing and leaving the shared field
//!
//! Everything here runs on the render thread once per frame. Network work is
//! spawned onto the tokio runtime and reports back through channels that the
//! frame update drains without blocking.

use crate::config::{BackendConfig, SyncSettings};
use crate::database::PlayerStore;
use crate::error::{ClientError, Result};
use crate::game::LocalMover;
use crate::input::{Controls, HeldKeys};
use crate::login::LoginForm;
use crate::realtime::{run_roster_feed, FeedEvent};
use crate::roster::Roster;
use crate::sync::PositionSync;
use log::{error, info, warn};
use shared::{random_color, PlayerRow};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const JOIN_FAILED: &str = "Failed to join game. Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Everything sampled from the user for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub keys: HeldKeys,
    pub controls: Controls,
    /// Validated name submitted from the login form this frame.
    pub join_name: Option<String>,
}

pub struct App<S: PlayerStore> {
    runtime: Handle,
    store: Arc<S>,
    backend: Option<BackendConfig>,
    settings: SyncSettings,

    screen: Screen,
    login: LoginForm,
    roster: Roster,
    mover: LocalMover,

    feed_rx: Option<mpsc::UnboundedReceiver<FeedEvent>>,
    feed_task: Option<JoinHandle<()>>,
    feed_status: FeedStatus,

    pending_join: Option<oneshot::Receiver<Result<PlayerRow>>>,
    sync: Option<PositionSync>,
    leaving: Vec<JoinHandle<()>>,
}

impl<S: PlayerStore> App<S> {
    pub fn new(runtime: Handle, store: Arc<S>, settings: SyncSettings) -> Self {
        let mover = LocalMover::new(settings.tick);
        Self {
            runtime,
            store,
            backend: None,
            settings,
            screen: Screen::Login,
            login: LoginForm::new(),
            roster: Roster::new(),
            mover,
            feed_rx: None,
            feed_task: None,
            feed_status: FeedStatus::Loading,
            pending_join: None,
            sync: None,
            leaving: Vec::new(),
        }
    }

    /// Connects the roster to the hosted change feed.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = Some(backend);
        self.start_feed();
        self
    }

    pub fn with_login(mut self, login: LoginForm) -> Self {
        self.login = login;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn feed_status(&self) -> &FeedStatus {
        &self.feed_status
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn login(&self) -> &LoginForm {
        &self.login
    }

    pub fn login_mut(&mut self) -> &mut LoginForm {
        &mut self.login
    }

    /// Uses `events` as the roster source instead of the hosted feed.
    pub fn attach_feed(&mut self, events: mpsc::UnboundedReceiver<FeedEvent>) {
        if let Some(task) = self.feed_task.take() {
            task.abort();
        }
        self.feed_rx = Some(events);
        self.feed_status = FeedStatus::Loading;
    }

    /// (Re)starts the background feed task.
    pub fn start_feed(&mut self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.attach_feed(rx);

        info!("Starting change feed for table '{}'", backend.table);
        let task = self.runtime.spawn(run_roster_feed(
            Arc::clone(&self.store),
            backend,
            self.settings.clone(),
            tx,
        ));
        self.feed_task = Some(task);
    }

    fn drain_feed(&mut self) {
        let Some(rx) = self.feed_rx.as_mut() else {
            return;
        };

        while let Ok(event) = rx.try_recv() {
            match event {
                FeedEvent::Snapshot(rows) => {
                    self.roster.replace_all(rows);
                    self.feed_status = FeedStatus::Ready;
                }
                FeedEvent::Change(change) => self.roster.apply(change),
                FeedEvent::Failed(message) => {
                    self.feed_status = FeedStatus::Failed(message);
                }
            }
        }
    }

    fn begin_join(&mut self, name: String) {
        let row = PlayerRow::join(name, random_color());
        info!("Joining as '{}' ({})", row.name, row.id);

        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let result = store.upsert_player(&row).await.map(|_| row);
            let _ = tx.send(result);
        });
        self.pending_join = Some(rx);
    }

    fn poll_join(&mut self) {
        let Some(mut rx) = self.pending_join.take() else {
            return;
        };

        match rx.try_recv() {
            Ok(Ok(row)) => self.enter_field(row),
            Ok(Err(e)) => {
                error!("Failed to join game: {}", e);
                self.login.fail(JOIN_FAILED);
            }
            Err(oneshot::error::TryRecvError::Empty) => self.pending_join = Some(rx),
            Err(oneshot::error::TryRecvError::Closed) => {
                error!("Join task ended without a result");
                self.login.fail(JOIN_FAILED);
            }
        }
    }

    fn enter_field(&mut self, row: PlayerRow) {
        info!("Joined the field as {}", row.id);
        self.sync = Some(PositionSync::start(
            &self.runtime,
            Arc::clone(&self.store),
            row.clone(),
            self.settings.write_interval,
        ));
        self.roster.set_local(row);
        self.mover.reset();
        self.login.reset();
        self.screen = Screen::Playing;
    }

    /// Leaves the field: stops position writes, then deletes the row remotely.
    ///
    /// Returns false when there is no local player. The removal keeps running
    /// in the background; [`App::close`] waits for it.
    pub fn leave(&mut self) -> bool {
        let Some(id) = self.roster.local_id() else {
            return false;
        };
        info!("Leaving the field ({})", id);

        let sync = self.sync.take();
        self.roster.clear_local();
        self.screen = Screen::Login;

        let store = Arc::clone(&self.store);
        let removal = self.runtime.spawn(async move {
            if let Some(sync) = sync {
                sync.shutdown().await;
            }
            if let Err(e) = store.remove_player(id).await {
                error!("Failed to remove player: {}", e);
            }
        });

        self.leaving.retain(|task| !task.is_finished());
        self.leaving.push(removal);
        true
    }

    /// Advances one frame.
    pub fn update(&mut self, now: Instant, input: FrameInput) {
        self.drain_feed();
        self.poll_join();

        match self.screen {
            Screen::Login => {
                if let Some(name) = input.join_name {
                    if self.pending_join.is_none() {
                        self.begin_join(name);
                    }
                }
            }
            Screen::Playing => {
                if input.controls.leave {
                    self.leave();
                    return;
                }

                if input.controls.retry && matches!(self.feed_status, FeedStatus::Failed(_)) {
                    self.start_feed();
                }

                self.move_local(now, input.keys);
            }
        }
    }

    fn move_local(&mut self, now: Instant, keys: HeldKeys) {
        let Some(current) = self.roster.local().map(PlayerRow::position) else {
            return;
        };

        if let Some(next) = self.mover.tick(now, keys, current) {
            if let Some(row) = self.roster.move_local(next) {
                if let Some(sync) = &self.sync {
                    sync.publish(row);
                }
            }
        }
    }

    /// Final cleanup before the process exits.
    ///
    /// Finishes removals started by [`App::leave`] and removes the current
    /// local row, all bounded by the leave timeout.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.feed_task.take() {
            task.abort();
        }

        let leaving = std::mem::take(&mut self.leaving);
        let local = self.roster.local_id();
        if leaving.is_empty() && local.is_none() {
            return Ok(());
        }

        let sync = self.sync.take();
        self.roster.clear_local();

        let store = Arc::clone(&self.store);
        let cleanup = async move {
            for task in leaving {
                if let Err(e) = task.await {
                    error!("Player removal ended abnormally: {}", e);
                }
            }
            if let Some(sync) = sync {
                sync.shutdown().await;
            }
            match local {
                Some(id) => store.remove_player(id).await,
                None => Ok(()),
            }
        };

        match tokio::time::timeout(self.settings.leave_timeout, cleanup).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out removing player on exit");
                Err(ClientError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeEvent;
    use crate::testing::MemoryStore;
    use shared::{CENTER_X, CENTER_Y, MOVEMENT_SPEED};
    use std::time::Duration;

    fn app(store: Arc<MemoryStore>) -> (App<MemoryStore>, mpsc::UnboundedSender<FeedEvent>) {
        let mut app = App::new(Handle::current(), store, SyncSettings::default());
        let (tx, rx) = mpsc::unbounded_channel();
        app.attach_feed(rx);
        (app, tx)
    }

    fn join_input(name: &str) -> FrameInput {
        FrameInput {
            join_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn joined(
        store: Arc<MemoryStore>,
    ) -> (App<MemoryStore>, mpsc::UnboundedSender<FeedEvent>) {
        let (mut app, tx) = app(store);
        app.update(Instant::now(), join_input("Alice"));
        settle().await;
        app.update(Instant::now(), FrameInput::default());
        assert_eq!(app.screen(), Screen::Playing);
        (app, tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_upserts_row_at_center() {
        let store = Arc::new(MemoryStore::default());
        let (app, _tx) = joined(store.clone()).await;

        let written = store.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].name, "Alice");
        assert_eq!((written[0].x, written[0].y), (CENTER_X, CENTER_Y));

        let local = app.roster().local().unwrap();
        assert_eq!(local.id, written[0].id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_join_returns_to_login() {
        let store = Arc::new(MemoryStore::failing(1));
        let (mut app, _tx) = app(store);
        app.login_mut().type_char('A');
        app.login_mut().type_char('l');
        let name = app.login_mut().submit();

        app.update(Instant::now(), FrameInput {
            join_name: name,
            ..Default::default()
        });
        settle().await;
        app.update(Instant::now(), FrameInput::default());

        assert_eq!(app.screen(), Screen::Login);
        assert!(!app.login().is_busy());
        assert!(app.login().error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_events_drive_roster() {
        let store = Arc::new(MemoryStore::default());
        let (mut app, tx) = app(store);
        assert_eq!(app.feed_status(), &FeedStatus::Loading);

        let bob = PlayerRow::join("Bob", "#4ECDC4");
        tx.send(FeedEvent::Snapshot(vec![bob.clone()])).unwrap();
        app.update(Instant::now(), FrameInput::default());
        assert_eq!(app.feed_status(), &FeedStatus::Ready);
        assert_eq!(app.roster().len(), 1);

        tx.send(FeedEvent::Change(ChangeEvent::Deleted(bob.id))).unwrap();
        app.update(Instant::now(), FrameInput::default());
        assert!(app.roster().is_empty());

        tx.send(FeedEvent::Failed("boom".to_string())).unwrap();
        app.update(Instant::now(), FrameInput::default());
        assert_eq!(app.feed_status(), &FeedStatus::Failed("boom".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_movement_is_written_through() {
        let store = Arc::new(MemoryStore::default());
        let (mut app, _tx) = joined(store.clone()).await;

        let keys = HeldKeys {
            right: true,
            ..Default::default()
        };
        let start = Instant::now();
        app.update(start, FrameInput { keys, ..Default::default() });
        app.update(start + Duration::from_millis(16), FrameInput { keys, ..Default::default() });

        let local = app.roster().local().unwrap().clone();
        assert_eq!(local.x, CENTER_X + 2.0 * MOVEMENT_SPEED);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let last = store.written().last().cloned().unwrap();
        assert_eq!(last.id, local.id);
        assert_eq!(last.x, local.x);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_removes_row() {
        let store = Arc::new(MemoryStore::default());
        let (mut app, _tx) = joined(store.clone()).await;
        let id = app.roster().local_id().unwrap();

        assert!(app.leave());
        settle().await;

        assert_eq!(app.screen(), Screen::Login);
        assert!(app.roster().local().is_none());
        assert_eq!(store.removed(), vec![id]);
        assert!(!app.leave());
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_leaves_field() {
        let store = Arc::new(MemoryStore::default());
        let (mut app, _tx) = joined(store.clone()).await;

        app.update(Instant::now(), FrameInput {
            controls: Controls {
                leave: true,
                retry: false,
            },
            ..Default::default()
        });
        settle().await;

        assert_eq!(app.screen(), Screen::Login);
        assert_eq!(store.removed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_removes_local_row() {
        let store = Arc::new(MemoryStore::default());
        let (mut app, _tx) = joined(store.clone()).await;
        let id = app.roster().local_id().unwrap();

        app.close().await.unwrap();
        assert_eq!(store.removed(), vec![id]);

        // Nothing left to clean up the second time.
        app.close().await.unwrap();
        assert_eq!(store.removed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_pending_leave() {
        let store = Arc::new(MemoryStore::default().with_remove_delay(Duration::from_millis(300)));
        let (mut app, _tx) = joined(store.clone()).await;
        let id = app.roster().local_id().unwrap();

        assert!(app.leave());
        assert!(store.removed().is_empty());

        app.close().await.unwrap();
        assert_eq!(store.removed(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_gives_up_after_leave_timeout() {
        let store = Arc::new(MemoryStore::default().with_remove_delay(Duration::from_secs(3600)));
        let (mut app, _tx) = joined(store.clone()).await;

        let started = tokio::time::Instant::now();
        let result = app.close().await;

        assert!(matches!(result, Err(ClientError::Timeout)));
        assert!(started.elapsed() >= SyncSettings::default().leave_timeout);
        assert!(store.removed().is_empty());
    }

    #[tokio::test]
    async fn test_retry_restarts_failed_feed() {
        let store = Arc::new(MemoryStore::default());
        let mut app = App::new(Handle::current(), store, SyncSettings::default())
            .with_backend(BackendConfig::new("http://127.0.0.1:1", "anon"));

        app.update(Instant::now(), join_input("Alice"));
        wait_for_failed_feed(&mut app).await;
        assert_eq!(app.screen(), Screen::Playing);

        app.update(Instant::now(), FrameInput {
            controls: Controls {
                leave: false,
                retry: true,
            },
            ..Default::default()
        });
        assert_eq!(app.feed_status(), &FeedStatus::Loading);

        wait_for_failed_feed(&mut app).await;
    }

    async fn wait_for_failed_feed(app: &mut App<MemoryStore>) {
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.update(Instant::now(), FrameInput::default());
            if matches!(app.feed_status(), FeedStatus::Failed(_)) {
                return;
            }
        }
        panic!("feed never reported a failure");
    }
}
