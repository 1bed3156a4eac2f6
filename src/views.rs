//! Derived views over collection snapshots
//!
//! Every function here is pure: same snapshot and parameters, same output.
//! An absent snapshot (`None`) yields an empty list or a zero aggregate.
//! Outputs borrow from the snapshot and keep its iteration order except
//! where a sort is applied; all sorts are stable.

use crate::models::{Activatable, Banner, Category, Collection, Order, OrderStatus, Product};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A record together with its id
pub type Entry<'a, T> = (&'a str, &'a T);

/// Number of products on the home page
pub const FEATURED_LIMIT: usize = 8;
/// Number of categories in navigation and on the home page
pub const NAV_CATEGORY_LIMIT: usize = 6;
/// Number of orders on the dashboard
pub const RECENT_ORDERS_LIMIT: usize = 5;
/// Category selector value that disables category filtering
pub const ALL_CATEGORIES: &str = "all";
/// Stock below which a product shows as running low
pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// All records in snapshot order
pub fn entries<T>(snapshot: Option<&Collection<T>>) -> Vec<Entry<'_, T>> {
    snapshot
        .map(|records| records.iter().map(|(id, record)| (id.as_str(), record)).collect())
        .unwrap_or_default()
}

/// Records visible on the storefront
pub fn active<T: Activatable>(snapshot: Option<&Collection<T>>) -> Vec<Entry<'_, T>> {
    retain_active(entries(snapshot))
}

/// Drop inactive records from an already derived list
pub fn retain_active<T: Activatable>(mut list: Vec<Entry<'_, T>>) -> Vec<Entry<'_, T>> {
    list.retain(|(_, record)| record.is_active());
    list
}

/// Products whose category equals `category` exactly; `"all"` keeps everything
pub fn in_category<'a>(mut products: Vec<Entry<'a, Product>>, category: &str) -> Vec<Entry<'a, Product>> {
    if category != ALL_CATEGORIES {
        products.retain(|(_, product)| product.category == category);
    }
    products
}

/// Price filter buckets.
///
/// `From500To1000` is closed at 1000 and `From1000To2000` opens just above
/// it, so every price falls in exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriceRange {
    #[default]
    All,
    Under500,
    From500To1000,
    From1000To2000,
    Above2000,
}

impl PriceRange {
    pub const BUCKETS: [PriceRange; 4] = [
        PriceRange::Under500,
        PriceRange::From500To1000,
        PriceRange::From1000To2000,
        PriceRange::Above2000,
    ];

    pub fn contains(&self, price: f64) -> bool {
        match self {
            PriceRange::All => true,
            PriceRange::Under500 => price < 500.0,
            PriceRange::From500To1000 => (500.0..=1000.0).contains(&price),
            PriceRange::From1000To2000 => price > 1000.0 && price <= 2000.0,
            PriceRange::Above2000 => price > 2000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceRange::All => "all",
            PriceRange::Under500 => "under-500",
            PriceRange::From500To1000 => "500-1000",
            PriceRange::From1000To2000 => "1000-2000",
            PriceRange::Above2000 => "above-2000",
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PriceRange::All),
            "under-500" => Ok(PriceRange::Under500),
            "500-1000" => Ok(PriceRange::From500To1000),
            "1000-2000" => Ok(PriceRange::From1000To2000),
            "above-2000" => Ok(PriceRange::Above2000),
            other => Err(format!("unknown price range '{}'", other)),
        }
    }
}

pub fn in_price_range<'a>(mut products: Vec<Entry<'a, Product>>, range: PriceRange) -> Vec<Entry<'a, Product>> {
    products.retain(|(_, product)| range.contains(product.price));
    products
}

/// Product list orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMode {
    /// Highest rated first
    #[default]
    Featured,
    PriceLow,
    PriceHigh,
    Rating,
    Newest,
}

impl SortMode {
    pub const ALL: [SortMode; 5] = [
        SortMode::Featured,
        SortMode::PriceLow,
        SortMode::PriceHigh,
        SortMode::Rating,
        SortMode::Newest,
    ];

    /// Parse a selector value; anything unrecognised sorts as featured.
    pub fn parse(s: &str) -> Self {
        match s {
            "price-low" => SortMode::PriceLow,
            "price-high" => SortMode::PriceHigh,
            "rating" => SortMode::Rating,
            "newest" => SortMode::Newest,
            _ => SortMode::Featured,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Featured => "featured",
            SortMode::PriceLow => "price-low",
            SortMode::PriceHigh => "price-high",
            SortMode::Rating => "rating",
            SortMode::Newest => "newest",
        }
    }

    fn compare(&self, a: &Product, b: &Product) -> Ordering {
        match self {
            SortMode::Featured | SortMode::Rating => number(b.rating).total_cmp(&number(a.rating)),
            SortMode::PriceLow => number(a.price).total_cmp(&number(b.price)),
            SortMode::PriceHigh => number(b.price).total_cmp(&number(a.price)),
            SortMode::Newest => b.created_at.cmp(&a.created_at),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// NaN sorts as zero rather than jumping to one end.
fn number(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Stable sort in place
pub fn sort_products(products: &mut [Entry<'_, Product>], mode: SortMode) {
    products.sort_by(|(_, a), (_, b)| mode.compare(a, b));
}

/// Products page selection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub category: String,
    pub price_range: PriceRange,
    pub sort: SortMode,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            price_range: PriceRange::All,
            sort: SortMode::Featured,
        }
    }
}

impl ProductQuery {
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn price_range(mut self, range: PriceRange) -> Self {
        self.price_range = range;
        self
    }

    pub fn sort(mut self, mode: SortMode) -> Self {
        self.sort = mode;
        self
    }

    /// active → category → price → sort
    pub fn apply<'a>(&self, products: Option<&'a Collection<Product>>) -> Vec<Entry<'a, Product>> {
        let filtered = in_category(active(products), &self.category);
        let mut filtered = in_price_range(filtered, self.price_range);
        sort_products(&mut filtered, self.sort);
        filtered
    }
}

/// Home page products: the highest rated active ones
pub fn featured_products(products: Option<&Collection<Product>>) -> Vec<Entry<'_, Product>> {
    let mut list = active(products);
    sort_products(&mut list, SortMode::Featured);
    list.truncate(FEATURED_LIMIT);
    list
}

/// Categories for navigation, in snapshot order
pub fn nav_categories(categories: Option<&Collection<Category>>) -> Vec<Entry<'_, Category>> {
    let mut list = active(categories);
    list.truncate(NAV_CATEGORY_LIMIT);
    list
}

/// Carousel slides by ascending `order`, ties in snapshot order
pub fn carousel_banners(banners: Option<&Collection<Banner>>) -> Vec<Entry<'_, Banner>> {
    let mut list = active(banners);
    list.sort_by_key(|(_, banner)| banner.order);
    list
}

/// Result of resolving an id against live data
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The first snapshot has not arrived yet
    Loading,
    NotFound,
    Found(T),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }
}

/// Find a record by id. While `loading` and nothing has arrived the answer
/// is `Loading`; afterwards a missing id is `NotFound`.
pub fn lookup<'a, T>(snapshot: Option<&'a Collection<T>>, loading: bool, id: &str) -> Lookup<Entry<'a, T>> {
    match snapshot {
        Some(records) => match records.get_key_value(id) {
            Some((key, record)) => Lookup::Found((key.as_str(), record)),
            None => Lookup::NotFound,
        },
        None if loading => Lookup::Loading,
        None => Lookup::NotFound,
    }
}

/// A category with the active products filed under its name
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPage<'a> {
    pub category: Entry<'a, Category>,
    pub products: Vec<Entry<'a, Product>>,
}

/// Resolve a category page by category id
pub fn category_products<'a>(
    categories: Option<&'a Collection<Category>>,
    products: Option<&'a Collection<Product>>,
    loading: bool,
    category_id: &str,
) -> Lookup<CategoryPage<'a>> {
    match lookup(categories, loading, category_id) {
        Lookup::Found(category) => Lookup::Found(CategoryPage {
            category,
            products: in_category(active(products), &category.1.name),
        }),
        Lookup::Loading => Lookup::Loading,
        Lookup::NotFound => Lookup::NotFound,
    }
}

/// Admin dashboard figures, recomputed from scratch per snapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardStats {
    pub active_products: usize,
    pub total_orders: usize,
    /// Sum of `total_amount` over all orders, whatever their status
    pub total_revenue: f64,
    pub pending_orders: usize,
    status_counts: HashMap<OrderStatus, usize>,
}

impl DashboardStats {
    pub fn compute(products: Option<&Collection<Product>>, orders: Option<&Collection<Order>>) -> Self {
        let orders = entries(orders);
        let mut status_counts = HashMap::new();
        for (_, order) in &orders {
            *status_counts.entry(order.status).or_insert(0) += 1;
        }

        Self {
            active_products: active(products).len(),
            total_orders: orders.len(),
            total_revenue: orders.iter().map(|(_, order)| order.total_amount).sum(),
            pending_orders: status_counts.get(&OrderStatus::Pending).copied().unwrap_or(0),
            status_counts,
        }
    }

    /// Number of orders with `status`
    pub fn count(&self, status: OrderStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}

/// All orders, newest first
pub fn orders_newest_first(orders: Option<&Collection<Order>>) -> Vec<Entry<'_, Order>> {
    let mut list = entries(orders);
    list.sort_by(|(_, a), (_, b)| b.created_at.cmp(&a.created_at));
    list
}

/// Admin banner list: inactive banners included, ascending `order`
pub fn banners_by_order(banners: Option<&Collection<Banner>>) -> Vec<Entry<'_, Banner>> {
    let mut list = entries(banners);
    list.sort_by_key(|(_, banner)| banner.order);
    list
}

/// The `limit` newest orders
pub fn recent_orders(orders: Option<&Collection<Order>>, limit: usize) -> Vec<Entry<'_, Order>> {
    let mut list = orders_newest_first(orders);
    list.truncate(limit);
    list
}

/// Whole-percent discount of `price` against `original_price`; 0 unless the
/// original is present and above the price.
pub fn discount_percentage(price: f64, original_price: Option<f64>) -> u32 {
    match original_price {
        Some(original) if original.is_finite() && price.is_finite() && original > price && original > 0.0 => {
            (((original - price) / original) * 100.0).round().clamp(0.0, 100.0) as u32
        }
        _ => 0,
    }
}

impl Product {
    pub fn discount_percentage(&self) -> u32 {
        discount_percentage(self.price, self.original_price)
    }

    pub fn stock_level(&self) -> StockLevel {
        match self.stock {
            0 => StockLevel::OutOfStock,
            n if n < LOW_STOCK_THRESHOLD => StockLevel::Low(n),
            _ => StockLevel::InStock,
        }
    }
}

/// Gallery images, falling back to the main image
pub fn product_images(product: &Product) -> Vec<&str> {
    match &product.images {
        Some(images) if !images.is_empty() => images.iter().map(String::as_str).collect(),
        _ => vec![product.image_url.as_str()],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    OutOfStock,
    /// Fewer than ten left
    Low(u32),
    InStock,
}

/// Products the purchase popup may advertise
pub fn popup_candidates(products: Option<&Collection<Product>>) -> Vec<Entry<'_, Product>> {
    let mut list = active(products);
    list.retain(|(_, product)| product.fake_buy_count > 0);
    list
}

/// Ids of a derived list, for caching in a [`crate::memo::Memo`]
pub fn ids<T>(list: &[Entry<'_, T>]) -> Vec<String> {
    list.iter().map(|(id, _)| id.to_string()).collect()
}
