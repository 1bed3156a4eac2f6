//! Configuration options for the dropshop client

use crate::error::{Error, Result};
use crate::timers::PopupTimings;
use dropshop_realtime::RealtimeClientOptions;
use std::env;
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "DROPSHOP_DATABASE_URL";
pub const ENV_AUTH_TOKEN: &str = "DROPSHOP_AUTH_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "DROPSHOP_REQUEST_TIMEOUT_SECS";
pub const ENV_AUTO_RECONNECT: &str = "DROPSHOP_AUTO_RECONNECT";

/// Configuration options for the dropshop client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Token passed to the database as the `auth` parameter
    pub auth_token: Option<String>,

    /// The request timeout for reads and writes
    pub request_timeout: Option<Duration>,

    /// Reconnect behaviour of live subscriptions
    pub realtime: RealtimeClientOptions,

    /// Banner carousel advance period
    pub carousel_period: Duration,

    /// Fake-purchase popup schedule
    pub popup: PopupTimings,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            request_timeout: Some(Duration::from_secs(30)),
            realtime: RealtimeClientOptions::default(),
            carousel_period: Duration::from_secs(5),
            popup: PopupTimings::default(),
        }
    }
}

impl ClientOptions {
    /// Read options from the environment, starting from the defaults.
    ///
    /// Unset variables keep their default; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(token) = env::var(ENV_AUTH_TOKEN) {
            if !token.trim().is_empty() {
                options.auth_token = Some(token);
            }
        }

        if let Ok(secs) = env::var(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::config(format!("{} must be a whole number of seconds", ENV_REQUEST_TIMEOUT_SECS))
            })?;
            options.request_timeout = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }

        if let Ok(flag) = env::var(ENV_AUTO_RECONNECT) {
            options.realtime.auto_reconnect = parse_flag(&flag)
                .ok_or_else(|| Error::config(format!("{} must be true or false", ENV_AUTO_RECONNECT)))?;
        }

        Ok(options)
    }

    /// Set the auth token
    pub fn with_auth_token(mut self, value: Option<String>) -> Self {
        self.auth_token = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the realtime reconnect options
    pub fn with_realtime(mut self, value: RealtimeClientOptions) -> Self {
        self.realtime = value;
        self
    }

    /// Set the carousel period
    pub fn with_carousel_period(mut self, value: Duration) -> Self {
        self.carousel_period = value;
        self
    }

    /// Set the popup schedule
    pub fn with_popup(mut self, value: PopupTimings) -> Self {
        self.popup = value;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
