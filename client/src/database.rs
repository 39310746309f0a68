//! Remote players table accessed over the hosted REST interface.

use crate::config::BackendConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Response, Url};
use shared::PlayerRow;
use std::time::Duration;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Row-level operations the game needs from the shared table.
///
/// Upserts are keyed by row identity, so joining and moving use the same call.
#[async_trait]
pub trait PlayerStore: Send + Sync + 'static {
    async fn upsert_player(&self, row: &PlayerRow) -> Result<()>;

    async fn remove_player(&self, id: Uuid) -> Result<()>;

    async fn fetch_players(&self) -> Result<Vec<PlayerRow>>;
}

/// [`PlayerStore`] backed by the hosted table's REST endpoint.
#[derive(Debug, Clone)]
pub struct PlayerTable {
    http: reqwest::Client,
    endpoint: Url,
    anon_key: String,
}

impl PlayerTable {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.rest_endpoint()?,
            anon_key: config.anon_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.endpoint.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { status, body })
    }

    /// Plain insert without conflict handling.
    pub async fn insert_player(&self, row: &PlayerRow) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Confirms the table exists and is readable with the configured key.
    pub async fn probe(&self) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for PlayerTable {
    async fn upsert_player(&self, row: &PlayerRow) -> Result<()> {
        debug!("Upserting player {} at ({:.1}, {:.1})", row.id, row.x, row.y);

        let response = self
            .request(reqwest::Method::POST)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;

        Self::check(response).await.map(|_| ()).inspect_err(|e| {
            error!("Error upserting player {}: {}", row.id, e);
        })
    }

    async fn remove_player(&self, id: Uuid) -> Result<()> {
        debug!("Removing player {}", id);

        let response = self
            .request(reqwest::Method::DELETE)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        Self::check(response).await.map(|_| ()).inspect_err(|e| {
            error!("Error removing player {}: {}", id, e);
        })
    }

    async fn fetch_players(&self) -> Result<Vec<PlayerRow>> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*")])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body = response.text().await?;
        let players: Vec<PlayerRow> = serde_json::from_str(&body)?;
        debug!("Fetched {} players", players.len());
        Ok(players)
    }
}
