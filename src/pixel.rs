//! Conversion pixel tracking
//!
//! The pixel is configured from the live settings record. Until a pixel id
//! is present every `track` call is dropped.

use crate::error::Result;
use crate::models::{Product, Settings};
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Currency reported with every event
pub const CURRENCY: &str = "INR";

const NOSCRIPT_BASE: &str = "https://www.facebook.com/tr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEvent {
    PageView,
    ViewContent,
    AddToCart,
    Purchase,
}

impl PixelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PixelEvent::PageView => "PageView",
            PixelEvent::ViewContent => "ViewContent",
            PixelEvent::AddToCart => "AddToCart",
            PixelEvent::Purchase => "Purchase",
        }
    }
}

impl fmt::Display for PixelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters sent with product events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventParams {
    pub content_name: String,
    pub content_category: String,
    pub content_ids: Vec<String>,
    pub value: f64,
    pub currency: &'static str,
}

impl EventParams {
    /// `value` is the unit price times `quantity`
    pub fn for_product(id: &str, product: &Product, quantity: u32) -> Self {
        Self {
            content_name: product.name.clone(),
            content_category: product.category.clone(),
            content_ids: vec![id.to_string()],
            value: product.price * f64::from(quantity),
            currency: CURRENCY,
        }
    }
}

/// Where pixel calls end up
pub trait PixelTransport: Send + Sync {
    fn init(&self, pixel_id: &str);
    fn track(&self, pixel_id: &str, event: PixelEvent, params: Option<&EventParams>);
}

/// Logs pixel calls at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl PixelTransport for LogTransport {
    fn init(&self, pixel_id: &str) {
        info!("Pixel {} initialised", pixel_id);
    }

    fn track(&self, pixel_id: &str, event: PixelEvent, params: Option<&EventParams>) {
        match params.map(serde_json::to_string) {
            Some(Ok(params)) => info!("Pixel {} track {} {}", pixel_id, event, params),
            _ => info!("Pixel {} track {}", pixel_id, event),
        }
    }
}

/// A pixel call captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum PixelCall {
    Init(String),
    Track {
        pixel_id: String,
        event: PixelEvent,
        params: Option<EventParams>,
    },
}

/// Keeps every call; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<PixelCall>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PixelCall> {
        lock(&self.calls).clone()
    }

    /// Tracked events in order, without init calls
    pub fn events(&self) -> Vec<PixelEvent> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                PixelCall::Track { event, .. } => Some(*event),
                PixelCall::Init(_) => None,
            })
            .collect()
    }
}

impl PixelTransport for RecordingTransport {
    fn init(&self, pixel_id: &str) {
        lock(&self.calls).push(PixelCall::Init(pixel_id.to_string()));
    }

    fn track(&self, pixel_id: &str, event: PixelEvent, params: Option<&EventParams>) {
        lock(&self.calls).push(PixelCall::Track {
            pixel_id: pixel_id.to_string(),
            event,
            params: params.cloned(),
        });
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Pixel<T: PixelTransport = LogTransport> {
    transport: T,
    pixel_id: Mutex<Option<String>>,
}

impl<T: PixelTransport> Pixel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pixel_id: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Currently configured pixel id
    pub fn pixel_id(&self) -> Option<String> {
        lock(&self.pixel_id).clone()
    }

    /// Follow the settings record.
    ///
    /// A new pixel id is initialised and gets one `PageView`; seeing the same
    /// id again does nothing. Absent settings or a blank id switch tracking off.
    pub fn configure(&self, settings: Option<&Settings>) {
        let next = settings.and_then(Settings::pixel_id);
        let mut current = lock(&self.pixel_id);
        if current.as_deref() == next {
            return;
        }

        match next {
            Some(id) => {
                debug!("Configuring pixel {}", id);
                self.transport.init(id);
                self.transport.track(id, PixelEvent::PageView, None);
                *current = Some(id.to_string());
            }
            None => {
                debug!("Pixel tracking disabled");
                *current = None;
            }
        }
    }

    /// Send `event` if a pixel is configured
    pub fn track(&self, event: PixelEvent, params: Option<&EventParams>) {
        let current = lock(&self.pixel_id);
        if let Some(id) = current.as_deref() {
            self.transport.track(id, event, params);
        }
    }

    /// Product detail was viewed
    pub fn view_content(&self, id: &str, product: &Product) {
        self.track(PixelEvent::ViewContent, Some(&EventParams::for_product(id, product, 1)));
    }

    pub fn add_to_cart(&self, id: &str, product: &Product, quantity: u32) {
        self.track(PixelEvent::AddToCart, Some(&EventParams::for_product(id, product, quantity)));
    }

    /// Only call once the order write has succeeded
    pub fn purchase(&self, id: &str, product: &Product, quantity: u32) {
        self.track(PixelEvent::Purchase, Some(&EventParams::for_product(id, product, quantity)));
    }
}

impl Default for Pixel<LogTransport> {
    fn default() -> Self {
        Self::new(LogTransport)
    }
}

/// Image URL that records a `PageView` for clients without scripting
pub fn noscript_url(pixel_id: &str) -> Result<Url> {
    let mut url = Url::parse(NOSCRIPT_BASE)?;
    url.query_pairs_mut()
        .append_pair("id", pixel_id)
        .append_pair("ev", "PageView")
        .append_pair("noscript", "1");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pixel_id: Option<&str>) -> Settings {
        Settings {
            facebook_pixel_id: pixel_id.map(str::to_string),
            ..Settings::default()
        }
    }

    fn lamp() -> Product {
        Product {
            name: "Lamp".to_string(),
            category: "Home".to_string(),
            price: 250.0,
            ..Product::default()
        }
    }

    #[test]
    fn test_track_without_pixel_is_dropped() {
        let pixel = Pixel::new(RecordingTransport::new());
        pixel.view_content("p1", &lamp());
        pixel.configure(Some(&settings(None)));
        pixel.add_to_cart("p1", &lamp(), 2);
        assert!(pixel.transport().calls().is_empty());
    }

    #[test]
    fn test_configure_once_per_id() {
        let pixel = Pixel::new(RecordingTransport::new());
        pixel.configure(Some(&settings(Some("123"))));
        pixel.configure(Some(&settings(Some("123"))));
        pixel.configure(Some(&settings(Some("456"))));

        assert_eq!(
            pixel.transport().calls(),
            vec![
                PixelCall::Init("123".to_string()),
                PixelCall::Track {
                    pixel_id: "123".to_string(),
                    event: PixelEvent::PageView,
                    params: None
                },
                PixelCall::Init("456".to_string()),
                PixelCall::Track {
                    pixel_id: "456".to_string(),
                    event: PixelEvent::PageView,
                    params: None
                },
            ]
        );

        pixel.configure(None);
        assert_eq!(pixel.pixel_id(), None);
    }

    #[test]
    fn test_event_params_shape() {
        let params = EventParams::for_product("p1", &lamp(), 3);
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({
                "content_name": "Lamp",
                "content_category": "Home",
                "content_ids": ["p1"],
                "value": 750.0,
                "currency": "INR"
            })
        );
    }

    #[test]
    fn test_noscript_url() {
        let url = noscript_url("123 45").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.facebook.com/tr?id=123+45&ev=PageView&noscript=1"
        );
    }
}
