//! Storefront records as stored in the database
//!
//! Records are camelCase JSON objects keyed by id inside their collection;
//! the id is never a field of the record itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A collection snapshot: id → record.
///
/// Keys are backend push ids, which sort chronologically, so iteration order
/// is insertion order.
pub type Collection<T> = BTreeMap<String, T>;

/// Current time as epoch milliseconds, the unit of every `createdAt`
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Top-level database nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataPath {
    Products,
    Categories,
    Banners,
    Orders,
    Settings,
}

impl DataPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataPath::Products => "products",
            DataPath::Categories => "categories",
            DataPath::Banners => "banners",
            DataPath::Orders => "orders",
            DataPath::Settings => "settings",
        }
    }

    /// Path of one record inside this collection
    pub fn record(&self, id: &str) -> String {
        format!("{}/{}", self.as_str(), id)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records that can be hidden from the storefront without being deleted
pub trait Activatable {
    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub name: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub category: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    pub stock: u32,
    pub fake_buy_count: u32,
    pub rating: f64,
    pub reviews: u32,
    pub is_active: bool,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl Activatable for Product {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl Activatable for Category {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Banner {
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub is_active: bool,
    pub order: i64,
}

impl Activatable for Banner {
    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status '{}'", s))
    }
}

/// A placed order. `product_name` and `total_amount` are frozen at checkout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub product_id: String,
    pub product_name: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub address: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub status: OrderStatus,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Site-wide settings, a single record at `settings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_pixel_id: Option<String>,
    pub show_fake_purchase: bool,
    pub site_name: String,
    pub site_description: String,
    pub contact_email: String,
    pub contact_phone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            facebook_pixel_id: None,
            show_fake_purchase: true,
            site_name: "DropShop".to_string(),
            site_description:
                "Your trusted dropshipping partner for quality products at amazing prices."
                    .to_string(),
            contact_email: "support@dropshop.com".to_string(),
            contact_phone: "+91 9876543210".to_string(),
        }
    }
}

impl Settings {
    /// Values for the settings form: the stored record, or the defaults when
    /// the node is absent
    pub fn or_default(stored: Option<&Settings>) -> Settings {
        stored.cloned().unwrap_or_default()
    }

    /// Pixel id, ignoring blank values left by the settings form
    pub fn pixel_id(&self) -> Option<&str> {
        self.facebook_pixel_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_round_trips_camel_case() {
        let value = json!({
            "name": "Lamp",
            "price": 750.0,
            "originalPrice": 1000.0,
            "category": "Home",
            "imageUrl": "https://img/lamp.png",
            "description": "Warm light",
            "stock": 4,
            "fakeBuyCount": 12,
            "rating": 4.5,
            "reviews": 10,
            "isActive": true,
            "createdAt": 1_700_000_000_000i64
        });
        let product: Product = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(product.original_price, Some(1000.0));
        assert_eq!(product.fake_buy_count, 12);
        assert!(product.images.is_none());
        assert_eq!(serde_json::to_value(&product).unwrap(), value);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let product: Product = serde_json::from_value(json!({ "name": "Bare" })).unwrap();
        assert!(!product.is_active);
        assert_eq!(product.stock, 0);

        let settings: Settings = serde_json::from_value(json!({ "siteName": "Shop" })).unwrap();
        assert_eq!(settings.site_name, "Shop");
        assert!(settings.show_fake_purchase);
        assert_eq!(settings.contact_email, "support@dropshop.com");
    }

    #[test]
    fn test_order_status_strings() {
        let order: Order = serde_json::from_value(json!({ "status": "shipped" })).unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!("cancelled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_blank_pixel_id_is_none() {
        let settings = Settings {
            facebook_pixel_id: Some("  ".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.pixel_id(), None);
    }

    #[test]
    fn test_absent_settings_fall_back_to_defaults() {
        assert_eq!(Settings::or_default(None).site_name, "DropShop");
        let stored = Settings {
            show_fake_purchase: false,
            ..Settings::default()
        };
        assert!(!Settings::or_default(Some(&stored)).show_fake_purchase);
    }

    #[test]
    fn test_record_path() {
        assert_eq!(DataPath::Orders.record("o1"), "orders/o1");
        assert_eq!(DataPath::Settings.to_string(), "settings");
    }
}
