use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Subscription cancelled by server: {0}")]
    Cancelled(String),

    #[error("Auth token revoked or expired")]
    AuthRevoked,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),
}
