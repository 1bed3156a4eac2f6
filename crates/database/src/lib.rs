//! REST client for the dropshop realtime document store
//!
//! This crate provides read and write access to the JSON tree held by the
//! hosted realtime database, addressed by slash-separated paths.
//!
//! # Features
//!
//! - `get` a node and deserialize it
//! - `set` (replace), `update` (merge) and `remove` a node
//! - `push` a record under a collection and receive the backend-assigned id

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Characters the backend refuses inside a key.
const FORBIDDEN_KEY_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// エラー型
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("API error: {message} (Status: {status})")]
    ApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error body returned by the backend on rejected requests.
#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    error: String,
}

/// Response to a `push`: the generated child key.
#[derive(Deserialize, Debug)]
struct PushResponse {
    name: String,
}

/// Client for the realtime database REST surface
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    base_url: String,
    auth_token: Option<String>,
    http_client: Client,
}

impl DatabaseClient {
    /// Create a new client for the database at `base_url`
    pub fn new(base_url: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.to_string(),
            auth_token: None,
            http_client,
        }
    }

    /// Attach an auth token, sent as the `auth` query parameter
    pub fn with_auth(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    /// The database base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The configured auth token, if any
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Get a reference to the node at `path`
    pub fn reference(&self, path: &str) -> Result<Reference<'_>> {
        let segments = split_path(path)?;
        Ok(Reference {
            client: self,
            segments,
        })
    }

    /// Build the `.json` endpoint URL for a node
    pub fn node_url(&self, segments: &[String]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| DatabaseError::InvalidPath(self.base_url.clone()))?;
            path.pop_if_empty();
            if let Some((last, parents)) = segments.split_last() {
                path.extend(parents);
                path.push(&format!("{}.json", last));
            } else {
                path.push(".json");
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers
    }
}

/// A node in the database tree
#[derive(Debug, Clone)]
pub struct Reference<'a> {
    client: &'a DatabaseClient,
    segments: Vec<String>,
}

impl<'a> Reference<'a> {
    /// Slash-joined path of this node
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Reference to a child of this node
    pub fn child(&self, path: &str) -> Result<Reference<'a>> {
        let mut segments = self.segments.clone();
        segments.extend(split_path(path)?);
        Ok(Reference {
            client: self.client,
            segments,
        })
    }

    /// Read the node. Absent nodes come back as JSON `null`.
    pub async fn get<T: DeserializeOwned>(&self) -> Result<T> {
        let url = self.client.node_url(&self.segments)?;
        debug!("GET {}", self.path());

        let response = self
            .client
            .http_client
            .get(url)
            .headers(self.client.headers())
            .send()
            .await?;

        let body = read_body(response).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Replace the node with `value`
    pub async fn set<T: Serialize>(&self, value: &T) -> Result<()> {
        let url = self.client.node_url(&self.segments)?;
        debug!("PUT {}", self.path());

        let response = self
            .client
            .http_client
            .put(url)
            .headers(self.client.headers())
            .json(value)
            .send()
            .await?;

        read_body(response).await?;
        Ok(())
    }

    /// Append `value` as a new child and return its generated key
    pub async fn push<T: Serialize>(&self, value: &T) -> Result<String> {
        let url = self.client.node_url(&self.segments)?;
        debug!("POST {}", self.path());

        let response = self
            .client
            .http_client
            .post(url)
            .headers(self.client.headers())
            .json(value)
            .send()
            .await?;

        let body = read_body(response).await?;
        let pushed: PushResponse = serde_json::from_value(body)?;
        debug!("Pushed {}/{}", self.path(), pushed.name);
        Ok(pushed.name)
    }

    /// Merge the fields of `partial` into the node
    pub async fn update<T: Serialize>(&self, partial: &T) -> Result<()> {
        let url = self.client.node_url(&self.segments)?;
        debug!("PATCH {}", self.path());

        let response = self
            .client
            .http_client
            .patch(url)
            .headers(self.client.headers())
            .json(partial)
            .send()
            .await?;

        read_body(response).await?;
        Ok(())
    }

    /// Delete the node
    pub async fn remove(&self) -> Result<()> {
        let url = self.client.node_url(&self.segments)?;
        debug!("DELETE {}", self.path());

        let response = self
            .client
            .http_client
            .delete(url)
            .headers(self.client.headers())
            .send()
            .await?;

        read_body(response).await?;
        Ok(())
    }
}

/// Split a slash-separated path into validated keys
pub fn split_path(path: &str) -> Result<Vec<String>> {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return Err(DatabaseError::InvalidPath(path.to_string()));
    }
    for segment in &segments {
        if segment.contains(FORBIDDEN_KEY_CHARS) {
            return Err(DatabaseError::InvalidPath(path.to_string()));
        }
    }
    Ok(segments)
}

async fn read_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body_text = response.text().await?;

    if !status.is_success() {
        let message = match serde_json::from_str::<ApiErrorBody>(&body_text) {
            Ok(body) => body.error,
            Err(_) => body_text,
        };
        warn!("Request rejected with status {}: {}", status, message);
        return Err(DatabaseError::ApiError { message, status });
    }

    if body_text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        Ok(serde_json::from_str(&body_text)?)
    }
}
