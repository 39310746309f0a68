//! Change feed over the hosted service's realtime websocket
//!
//! The service speaks Phoenix channels with JSON frames. A client joins a
//! `realtime:<channel>` topic asking for `postgres_changes` on the players
//! table, keeps the socket alive with heartbeats on the `phoenix` topic, and
//! receives one `postgres_changes` frame per committed row change.

use crate::config::{BackendConfig, SyncSettings};
use crate::database::PlayerStore;
use crate::error::{ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::PlayerRow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const HEARTBEAT_TOPIC: &str = "phoenix";

/// One frame of the Phoenix channel protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// Row change delivered by the feed, keyed by row identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(PlayerRow),
    Updated(PlayerRow),
    Deleted(Uuid),
}

impl ChangeEvent {
    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Inserted(row) | ChangeEvent::Updated(row) => row.id,
            ChangeEvent::Deleted(id) => *id,
        }
    }
}

/// What the background feed task reports to the game loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full table contents; replaces the roster.
    Snapshot(Vec<PlayerRow>),
    Change(ChangeEvent),
    /// The feed could not be started at all.
    Failed(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct RowIdentity {
    id: Uuid,
}

/// Builds the `phx_join` frame subscribing to every change on `table`.
pub fn join_message(
    topic: &str,
    table: &str,
    access_token: &str,
    join_ref: &str,
) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token,
        }),
        msg_ref: Some(join_ref.to_string()),
        join_ref: Some(join_ref.to_string()),
    }
}

pub fn heartbeat_message(msg_ref: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: HEARTBEAT_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: None,
    }
}

/// Extracts a row change from a `postgres_changes` frame.
///
/// Returns `None` for every other frame, for changes on other tables, and for
/// payloads that do not decode.
pub fn decode_change(message: &PhoenixMessage, table: &str) -> Option<ChangeEvent> {
    if message.event != "postgres_changes" {
        return None;
    }

    let payload: ChangePayload = match serde_json::from_value(message.payload.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Skipping undecodable change payload: {}", e);
            return None;
        }
    };

    let data = payload.data;
    if data.table.as_deref().is_some_and(|t| t != table) {
        return None;
    }

    let decoded = match data.kind {
        ChangeKind::Insert => data
            .record
            .map(serde_json::from_value::<PlayerRow>)
            .transpose()
            .map(|row| row.map(ChangeEvent::Inserted)),
        ChangeKind::Update => data
            .record
            .map(serde_json::from_value::<PlayerRow>)
            .transpose()
            .map(|row| row.map(ChangeEvent::Updated)),
        ChangeKind::Delete => data
            .old_record
            .map(serde_json::from_value::<RowIdentity>)
            .transpose()
            .map(|row| row.map(|r| ChangeEvent::Deleted(r.id))),
    };

    match decoded {
        Ok(event) => event,
        Err(e) => {
            warn!("Skipping change with malformed row: {}", e);
            None
        }
    }
}

/// Next protocol frame; `FeedClosed` once the socket ends.
async fn recv_frame(stream: &mut WsStream) -> Result<PhoenixMessage> {
    loop {
        let msg = match stream.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ClientError::FeedClosed),
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<PhoenixMessage>(text.as_str()) {
                Ok(message) => return Ok(message),
                Err(e) => warn!("Skipping malformed feed frame: {}", e),
            },
            Message::Close(frame) => {
                debug!("Change feed sent close frame: {:?}", frame);
                return Err(ClientError::FeedClosed);
            }
            _ => {}
        }
    }
}

/// A joined change-feed channel.
pub struct ChangeFeed {
    stream: WsStream,
    topic: String,
    table: String,
    next_ref: u64,
    heartbeat: Interval,
    closed: bool,
}

impl ChangeFeed {
    /// Connects, joins a fresh channel and waits for the join to be accepted.
    pub async fn subscribe(config: &BackendConfig, heartbeat: Duration) -> Result<Self> {
        let url = config.realtime_endpoint()?;
        debug!("Connecting to change feed at {}", url.path());

        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        let mut heartbeat = interval_at(Instant::now() + heartbeat, heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut feed = Self {
            stream,
            topic: format!("realtime:{}-{}", config.table, Uuid::new_v4()),
            table: config.table.clone(),
            next_ref: 1,
            heartbeat,
            closed: false,
        };

        timeout(JOIN_TIMEOUT, feed.join(&config.anon_key))
            .await
            .map_err(|_| ClientError::Timeout)??;

        info!("Subscribed to changes on table '{}'", feed.table);
        Ok(feed)
    }

    fn take_ref(&mut self) -> String {
        let r = self.next_ref.to_string();
        self.next_ref += 1;
        r
    }

    async fn send(&mut self, message: &PhoenixMessage) -> Result<()> {
        if self.closed {
            return Err(ClientError::FeedClosed);
        }
        let text = serde_json::to_string(message)?;
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn join(&mut self, access_token: &str) -> Result<()> {
        let join_ref = self.take_ref();
        let message = join_message(&self.topic, &self.table, access_token, &join_ref);
        self.send(&message).await?;

        loop {
            let reply = recv_frame(&mut self.stream).await?;
            if reply.event != "phx_reply" || reply.msg_ref.as_deref() != Some(join_ref.as_str()) {
                continue;
            }

            let status = reply.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                return Ok(());
            }

            let response = reply
                .payload
                .get("response")
                .map(Value::to_string)
                .unwrap_or_default();
            return Err(ClientError::ChannelJoin(response));
        }
    }

    /// Waits for the next row change, sending heartbeats while idle.
    pub async fn next_change(&mut self) -> Result<ChangeEvent> {
        loop {
            tokio::select! {
                _ = self.heartbeat.tick() => {
                    let r = self.take_ref();
                    self.send(&heartbeat_message(&r)).await?;
                }
                message = recv_frame(&mut self.stream) => {
                    let message = message?;
                    if message.topic == self.topic
                        && (message.event == "phx_error" || message.event == "phx_close")
                    {
                        warn!("Change feed channel ended with {}", message.event);
                        return Err(ClientError::FeedClosed);
                    }
                    if let Some(change) = decode_change(&message, &self.table) {
                        return Ok(change);
                    }
                }
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.close(None).await?;
        Ok(())
    }
}

async fn open_with_snapshot<S: PlayerStore>(
    store: &S,
    config: &BackendConfig,
    settings: &SyncSettings,
    events: &mpsc::UnboundedSender<FeedEvent>,
) -> Result<Option<ChangeFeed>> {
    // Subscribe before reading so no change between the two is missed.
    let feed = ChangeFeed::subscribe(config, settings.heartbeat).await?;
    let rows = store.fetch_players().await?;
    info!("Loaded {} players", rows.len());

    if events.send(FeedEvent::Snapshot(rows)).is_err() {
        return Ok(None);
    }
    Ok(Some(feed))
}

/// Keeps the roster fed: snapshot, then changes, reconnecting after losses.
///
/// Returns when the receiving side is dropped, or after reporting
/// [`FeedEvent::Failed`] if the very first connection attempt fails.
pub async fn run_roster_feed<S: PlayerStore>(
    store: Arc<S>,
    config: BackendConfig,
    settings: SyncSettings,
    events: mpsc::UnboundedSender<FeedEvent>,
) {
    let mut established = false;

    loop {
        let mut feed = match open_with_snapshot(store.as_ref(), &config, &settings, &events).await {
            Ok(Some(feed)) => feed,
            Ok(None) => return,
            Err(e) if !established => {
                error!("Failed to initialize players: {}", e);
                let _ = events.send(FeedEvent::Failed(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(
                    "Change feed reconnect failed: {}; retrying in {:?}",
                    e, settings.reconnect_delay
                );
                sleep(settings.reconnect_delay).await;
                continue;
            }
        };
        established = true;

        loop {
            match feed.next_change().await {
                Ok(change) => {
                    debug!("Feed change for {}", change.id());
                    if events.send(FeedEvent::Change(change)).is_err() {
                        let _ = feed.close().await;
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        "Change feed lost: {}; reconnecting in {:?}",
                        e, settings.reconnect_delay
                    );
                    break;
                }
            }
        }

        sleep(settings.reconnect_delay).await;
    }
}
