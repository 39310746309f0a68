//! Error types for the field client.

use thiserror::Error;

/// Errors raised while talking to the hosted table or its change feed.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The table endpoint answered with a non-success status.
    #[error("request failed with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The change feed refused the channel subscription.
    #[error("channel join rejected: {0}")]
    ChannelJoin(String),

    /// The change feed socket closed.
    #[error("change feed closed")]
    FeedClosed,

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("operation timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ClientError>;
