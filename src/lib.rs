//! DropShop storefront data layer
//!
//! Live, typed views over a realtime JSON database (products, categories,
//! banners, orders and settings), pure derived views for every storefront
//! and admin screen, fire-and-forget admin writes, and the small timers and
//! tracking hooks the storefront runs alongside them.

pub mod checkout;
pub mod commands;
pub mod config;
pub mod error;
pub mod live;
pub mod memo;
pub mod models;
pub mod pixel;
pub mod timers;
pub mod views;

use std::env;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::commands::{Commands, Notifier, WriteTarget};
use crate::config::{ClientOptions, ENV_DATABASE_URL};
use crate::error::{Error, Result};
use crate::live::{LiveCollection, LiveData};
use crate::models::{Banner, Category, DataPath, Order, Product, Settings};
use crate::timers::{Carousel, PurchasePopup};

pub use dropshop_database::DatabaseClient;
pub use dropshop_realtime::{MemoryStore, SnapshotEvent, SnapshotSource, StreamingClient, Subscription};

/// The main entry point: one backend for reads and writes
pub struct Storefront {
    /// The database URL, absent for in-memory stores
    url: Option<String>,
    source: Arc<dyn SnapshotSource>,
    writer: Arc<dyn WriteTarget>,
    options: ClientOptions,
}

impl fmt::Debug for Storefront {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storefront")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Connect to the database at `database_url`
    ///
    /// # Example
    ///
    /// ```
    /// use dropshop::Storefront;
    ///
    /// let shop = Storefront::new("https://dropshop-demo.firebaseio.com").unwrap();
    /// assert_eq!(shop.url(), Some("https://dropshop-demo.firebaseio.com"));
    /// ```
    pub fn new(database_url: &str) -> Result<Self> {
        Self::new_with_options(database_url, ClientOptions::default())
    }

    /// Connect with custom options
    ///
    /// Reads and writes share a client with the request timeout; live
    /// streams get their own client without one.
    pub fn new_with_options(database_url: &str, options: ClientOptions) -> Result<Self> {
        Url::parse(database_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(Error::config)?;
        let stream_client = Client::builder().build().map_err(Error::config)?;

        let mut database = DatabaseClient::new(database_url, http_client);
        if let Some(token) = &options.auth_token {
            database = database.with_auth(token);
        }
        let streaming = StreamingClient::new_with_options(database_url, stream_client, options.realtime.clone())
            .with_auth(options.auth_token.clone());

        info!("Storefront connected to {}", database_url);
        Ok(Self {
            url: Some(database_url.to_string()),
            source: Arc::new(streaming),
            writer: Arc::new(database),
            options,
        })
    }

    /// Connect using `DROPSHOP_DATABASE_URL` and the other `DROPSHOP_*`
    /// variables, loading a `.env` file first if there is one
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let url = env::var(ENV_DATABASE_URL)
            .map_err(|_| Error::config(format!("{} is not set", ENV_DATABASE_URL)))?;
        Self::new_with_options(url.trim(), ClientOptions::from_env()?)
    }

    /// Run against an in-memory store
    ///
    /// # Example
    ///
    /// ```
    /// use dropshop::{MemoryStore, Storefront};
    /// use dropshop::config::ClientOptions;
    /// use serde_json::json;
    ///
    /// let store = MemoryStore::with_data(json!({
    ///     "products": { "p1": { "name": "Lamp", "isActive": true } }
    /// }));
    /// let shop = Storefront::in_memory(store.clone(), ClientOptions::default());
    ///
    /// let products = shop.products();
    /// store.run_pending();
    /// assert_eq!(products.data().unwrap()["p1"].name, "Lamp");
    /// ```
    pub fn in_memory(store: MemoryStore, options: ClientOptions) -> Self {
        debug!("Storefront running on an in-memory store");
        Self {
            url: None,
            source: Arc::new(store.clone()),
            writer: Arc::new(store),
            options,
        }
    }

    /// Assemble from any backend pair
    pub fn from_parts(source: Arc<dyn SnapshotSource>, writer: Arc<dyn WriteTarget>, options: ClientOptions) -> Self {
        Self {
            url: None,
            source,
            writer,
            options,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The backend live views subscribe to
    pub fn source(&self) -> &Arc<dyn SnapshotSource> {
        &self.source
    }

    /// Subscribe to a top-level node. Each call is an independent subscription.
    pub fn live<T: DeserializeOwned + Send + Sync + 'static>(&self, path: DataPath) -> LiveData<T> {
        LiveData::subscribe(self.source.as_ref(), path.as_str())
    }

    pub fn products(&self) -> LiveCollection<Product> {
        self.live(DataPath::Products)
    }

    pub fn categories(&self) -> LiveCollection<Category> {
        self.live(DataPath::Categories)
    }

    pub fn banners(&self) -> LiveCollection<Banner> {
        self.live(DataPath::Banners)
    }

    pub fn orders(&self) -> LiveCollection<Order> {
        self.live(DataPath::Orders)
    }

    pub fn settings(&self) -> LiveData<Settings> {
        self.live(DataPath::Settings)
    }

    /// Write commands reporting to `notifier`
    pub fn commands(&self, notifier: Arc<dyn Notifier>) -> Commands {
        Commands::new(self.writer.clone(), notifier)
    }

    pub fn carousel(&self) -> Carousel {
        Carousel::new(self.options.carousel_period)
    }

    /// Purchase popup seeded from the OS
    pub fn purchase_popup(&self) -> PurchasePopup<StdRng> {
        PurchasePopup::new(self.options.popup, StdRng::from_entropy())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::Storefront;
    pub use crate::checkout::{place_order, OrderForm, ProductDetail, Quantity};
    pub use crate::commands::{AdminCollection, Commands, LogNotifier, Notice, NoticeLog, Notifier};
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::live::{LiveCollection, LiveData, LiveState};
    pub use crate::models::{Banner, Category, Collection, DataPath, Order, OrderStatus, Product, Settings};
    pub use crate::pixel::{Pixel, PixelTransport};
    pub use crate::timers::{Carousel, Clock, PurchasePopup, SystemClock};
    pub use crate::views::{Lookup, PriceRange, ProductQuery, SortMode};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AdminCollection, Notice, NoticeLog};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Keeps every write instead of storing it
    #[derive(Default)]
    struct JournalWriter {
        writes: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait::async_trait]
    impl WriteTarget for JournalWriter {
        async fn push(&self, path: &str, value: Value) -> Result<String> {
            self.writes.lock().unwrap().push((path.to_string(), value));
            Ok("j1".to_string())
        }

        async fn update(&self, path: &str, partial: Value) -> Result<()> {
            self.writes.lock().unwrap().push((path.to_string(), partial));
            Ok(())
        }

        async fn remove(&self, path: &str) -> Result<()> {
            self.writes.lock().unwrap().push((path.to_string(), Value::Null));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_from_parts_splits_reads_and_writes() {
        let store = MemoryStore::with_data(json!({ "categories": { "c1": { "name": "Home", "isActive": true } } }));
        let writer = Arc::new(JournalWriter::default());
        let shop = Storefront::from_parts(Arc::new(store.clone()), writer.clone(), ClientOptions::default());
        assert_eq!(shop.url(), None);

        let categories = shop.categories();
        store.run_pending();
        assert_eq!(categories.data().unwrap()["c1"].name, "Home");

        let notices = NoticeLog::new();
        let commands = shop.commands(Arc::new(notices.clone()));
        commands.set_active(AdminCollection::Categories, "c1", false).await.unwrap();

        let writes = writer.writes.lock().unwrap().clone();
        assert_eq!(writes, vec![("categories/c1".to_string(), json!({ "isActive": false }))]);
        // Reads come from the store, which never saw the write
        assert_eq!(store.pending_count(), 0);
        assert_eq!(notices.take(), vec![Notice::Success("Category deactivated successfully!".to_string())]);
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(Storefront::new("not a url"), Err(Error::UrlParse(_))));
    }

    #[test]
    fn test_each_view_is_its_own_subscription() {
        let store = MemoryStore::with_data(json!({ "settings": { "siteName": "Shop" } }));
        let shop = Storefront::in_memory(store.clone(), ClientOptions::default());

        let first = shop.settings();
        let second = shop.settings();
        assert_ne!(first.subscription_id(), second.subscription_id());
        assert_eq!(store.subscriber_count(), 2);

        drop(first);
        assert_eq!(store.subscriber_count(), 1);
        store.run_pending();
        assert_eq!(second.data().unwrap().site_name, "Shop");
    }

    #[test]
    fn test_timers_use_options() {
        let options = ClientOptions::default().with_carousel_period(std::time::Duration::from_secs(2));
        let shop = Storefront::in_memory(MemoryStore::new(), options);
        let mut carousel = shop.carousel();
        carousel.sync(2, std::time::Duration::ZERO);
        assert_eq!(carousel.next_deadline(), Some(std::time::Duration::from_secs(2)));
        assert_eq!(shop.purchase_popup().phase(), crate::timers::PopupPhase::Idle);
    }
}
