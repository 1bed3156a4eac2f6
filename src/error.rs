//! Error handling for the dropshop client

use dropshop_database::DatabaseError;
use dropshop_realtime::RealtimeError;
use std::fmt;
use thiserror::Error;

/// Unified error type for the dropshop client
#[derive(Error, Debug)]
pub enum Error {
    /// Database read or write errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Live subscription errors
    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new invalid-input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
