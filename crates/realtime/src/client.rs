use crate::error::RealtimeError;
use crate::sse::{SseParser, StreamEvent};
use crate::subscription::{Listener, ListenerSlot, SnapshotEvent, SnapshotSource, Subscription};
use crate::tree;
use futures_util::StreamExt;
use log::{debug, error, info, trace, warn};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use url::Url;

/// Options for the streaming client
#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: Option<u32>,
    /// Initial reconnect delay in milliseconds
    pub reconnect_interval: u64,
    pub reconnect_backoff_factor: f64,
    /// Upper bound for the reconnect delay in milliseconds
    pub max_reconnect_interval: u64,
    /// The server sends `keep-alive` every 30 seconds; a stream silent for
    /// longer than this (milliseconds) is treated as dead.
    pub keep_alive_timeout: u64,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_attempts: None, // Infinite attempts
            reconnect_interval: 1000,
            reconnect_backoff_factor: 1.5,
            max_reconnect_interval: 30000,
            keep_alive_timeout: 60000,
        }
    }
}

impl RealtimeClientOptions {
    /// Delay before reconnect attempt number `attempt` (1-based)
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.reconnect_interval as f64 * self.reconnect_backoff_factor.powi(exponent);
        let capped = millis.min(self.max_reconnect_interval as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Streaming client over the database's server-sent-event feed.
///
/// Every subscription owns one background task holding an open
/// `text/event-stream` request. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct StreamingClient {
    pub(crate) url: String,
    pub(crate) auth_token: Option<String>,
    pub(crate) http_client: Client,
    pub(crate) options: RealtimeClientOptions,
}

impl StreamingClient {
    /// デフォルトオプションで新しいクライアントを作成
    pub fn new(url: &str, http_client: Client) -> Self {
        Self::new_with_options(url, http_client, RealtimeClientOptions::default())
    }

    /// カスタムオプションで新しいクライアントを作成
    pub fn new_with_options(url: &str, http_client: Client, options: RealtimeClientOptions) -> Self {
        Self {
            url: url.to_string(),
            auth_token: None,
            http_client,
            options,
        }
    }

    /// Attach an auth token, sent as the `auth` query parameter
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        info!("Setting auth token (is_some: {})", token.is_some());
        self.auth_token = token;
        self
    }

    pub fn options(&self) -> &RealtimeClientOptions {
        &self.options
    }

    /// Build the stream URL for `path`
    pub fn stream_url(&self, path: &str) -> Result<Url, RealtimeError> {
        let segments = tree::split_path(path);
        let mut url = Url::parse(&self.url)?;
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| RealtimeError::InvalidPath(self.url.clone()))?;
            parts.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    parts.extend(parents);
                    parts.push(&format!("{}.json", last));
                }
                None => {
                    parts.push(".json");
                }
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

impl SnapshotSource for StreamingClient {
    fn subscribe(&self, path: &str, listener: Listener) -> Subscription {
        let slot = ListenerSlot::new(path, listener);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Cannot subscribe to '{}' outside a tokio runtime: {}", path, e);
                slot.deliver(SnapshotEvent::Error(format!("no async runtime: {}", e)));
                return Subscription::new(slot, || {});
            }
        };

        let task = handle.spawn(run_subscription(self.clone(), slot.clone()));
        Subscription::new(slot, move || task.abort())
    }
}

/// Keep a stream open for the slot, reconnecting per the options.
async fn run_subscription(client: StreamingClient, slot: Arc<ListenerSlot>) {
    let mut attempts: u32 = 0;
    loop {
        if !slot.is_active() {
            return;
        }

        let mut connected = false;
        let result = stream_once(&client, &slot, &mut connected).await;
        if connected {
            attempts = 0;
        }

        match result {
            Err(RealtimeError::Cancelled(reason)) => {
                warn!("Stream for '{}' cancelled: {}", slot.path(), reason);
                slot.deliver(SnapshotEvent::Error(reason));
                return;
            }
            Err(e) => {
                warn!("Stream for '{}' failed: {}", slot.path(), e);
                slot.deliver(SnapshotEvent::Error(e.to_string()));
            }
            Ok(()) => {
                debug!("Stream for '{}' ended", slot.path());
                slot.deliver(SnapshotEvent::Error("stream closed by server".to_string()));
            }
        }

        if !client.options.auto_reconnect {
            return;
        }
        attempts += 1;
        if let Some(max) = client.options.max_reconnect_attempts {
            if attempts > max {
                error!("Giving up on '{}' after {} reconnect attempts", slot.path(), max);
                return;
            }
        }
        let delay = client.options.reconnect_delay(attempts);
        info!("Reconnecting '{}' in {:?} (attempt {})", slot.path(), delay, attempts);
        sleep(delay).await;
    }
}

/// Run one connection until it fails or the server closes it.
async fn stream_once(
    client: &StreamingClient,
    slot: &ListenerSlot,
    connected: &mut bool,
) -> Result<(), RealtimeError> {
    let url = client.stream_url(slot.path())?;
    debug!("Opening stream for '{}'", slot.path());

    let response = client
        .http_client
        .get(url)
        .header("Accept", "text/event-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RealtimeError::ConnectionError(format!(
            "stream request failed with status {}: {}",
            status, body
        )));
    }
    *connected = true;

    let idle = Duration::from_millis(client.options.keep_alive_timeout);
    let mut body = response.bytes_stream();
    let mut parser = SseParser::new();
    // Each connection starts from an empty tree; the first `put` carries the
    // full value.
    let mut root = Value::Null;

    loop {
        let chunk = match timeout(idle, body.next()).await {
            Ok(Some(chunk)) => chunk?,
            Ok(None) => return Ok(()),
            Err(_) => {
                return Err(RealtimeError::StreamError(format!(
                    "no data for {:?}",
                    idle
                )))
            }
        };

        for raw in parser.feed(&chunk) {
            let event = match StreamEvent::try_from(raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Dropping malformed event on '{}': {}", slot.path(), e);
                    continue;
                }
            };
            trace!("Stream event on '{}': {:?}", slot.path(), event);

            match event {
                StreamEvent::Put { path, data } => {
                    tree::set(&mut root, &tree::split_path(&path), data);
                }
                StreamEvent::Patch { path, data } => {
                    let Value::Object(members) = data else {
                        warn!("Ignoring non-object patch on '{}'", slot.path());
                        continue;
                    };
                    tree::merge(&mut root, &tree::split_path(&path), members);
                }
                StreamEvent::KeepAlive => continue,
                StreamEvent::Cancel(reason) => return Err(RealtimeError::Cancelled(reason)),
                StreamEvent::AuthRevoked => return Err(RealtimeError::AuthRevoked),
                StreamEvent::Unknown(name) => {
                    debug!("Ignoring unknown event '{}'", name);
                    continue;
                }
            }

            if !slot.deliver(SnapshotEvent::Snapshot(root.clone())) {
                return Ok(());
            }
        }
    }
}
