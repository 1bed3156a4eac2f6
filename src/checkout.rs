//! Product detail and checkout

use crate::commands::{Commands, Notice};
use crate::error::{Error, Result};
use crate::live::LiveState;
use crate::models::{now_millis, Collection, Order, OrderStatus, Product};
use crate::pixel::{Pixel, PixelTransport};
use crate::views::{self, Lookup, StockLevel};
use log::{error, info};
use serde::{Deserialize, Serialize};

/// Everything the detail page shows for one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetail<'a> {
    pub id: &'a str,
    pub product: &'a Product,
    pub discount_percentage: u32,
    pub images: Vec<&'a str>,
    pub stock_level: StockLevel,
}

impl<'a> ProductDetail<'a> {
    /// Resolve `id` against the live products state
    pub fn resolve(state: &'a LiveState<Collection<Product>>, id: &str) -> Lookup<ProductDetail<'a>> {
        match views::lookup(state.get(), state.loading, id) {
            Lookup::Found((id, product)) => Lookup::Found(ProductDetail {
                id,
                product,
                discount_percentage: product.discount_percentage(),
                images: views::product_images(product),
                stock_level: product.stock_level(),
            }),
            Lookup::Loading => Lookup::Loading,
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn can_purchase(&self) -> bool {
        self.product.stock > 0
    }
}

/// Quantity stepper: never below one, never above stock when stock is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    value: u32,
    max: Option<u32>,
}

impl Quantity {
    pub fn new(stock: u32) -> Self {
        Self {
            value: 1,
            max: (stock > 0).then_some(stock),
        }
    }

    pub fn for_product(product: &Product) -> Self {
        Self::new(product.stock)
    }

    pub fn get(&self) -> u32 {
        self.value
    }

    pub fn can_increment(&self) -> bool {
        self.max.map_or(true, |max| self.value < max)
    }

    pub fn increment(&mut self) {
        if self.can_increment() {
            self.value += 1;
        }
    }

    pub fn decrement(&mut self) {
        self.value = self.value.saturating_sub(1).max(1);
    }

    /// Set directly, clamped into range
    pub fn set(&mut self, value: u32) {
        let value = value.max(1);
        self.value = match self.max {
            Some(max) => value.min(max),
            None => value,
        };
    }
}

/// Customer details collected at checkout
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub address: String,
}

impl OrderForm {
    /// All fields are required
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("customer name", &self.customer_name),
            ("customer email", &self.customer_email),
            ("customer phone", &self.customer_phone),
            ("address", &self.address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::invalid_input(format!("{} is required", field)));
            }
        }

        match self.customer_email.trim().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(Error::invalid_input("customer email is not an email address")),
        }
    }
}

/// Build the order record. Product name and total are copied now and do not
/// follow later edits to the product.
pub fn build_order(product_id: &str, product: &Product, quantity: u32, form: &OrderForm, created_at: i64) -> Order {
    Order {
        product_id: product_id.to_string(),
        product_name: product.name.clone(),
        customer_name: form.customer_name.trim().to_string(),
        customer_email: form.customer_email.trim().to_string(),
        customer_phone: form.customer_phone.trim().to_string(),
        address: form.address.trim().to_string(),
        quantity,
        total_amount: product.price * f64::from(quantity),
        status: OrderStatus::Pending,
        created_at,
    }
}

/// Track the cart addition and confirm it
pub fn add_to_cart<T: PixelTransport>(commands: &Commands, pixel: &Pixel<T>, id: &str, product: &Product, quantity: Quantity) {
    pixel.add_to_cart(id, product, quantity.get());
    commands.notify(Notice::Success(format!("{} added to cart!", product.name)));
}

/// Write the order. The purchase event fires only after the write succeeds.
pub async fn place_order<T: PixelTransport>(
    commands: &Commands,
    pixel: &Pixel<T>,
    id: &str,
    product: &Product,
    quantity: Quantity,
    form: &OrderForm,
) -> Result<String> {
    match submit_order(commands, id, product, quantity, form).await {
        Ok(order_id) => {
            info!("Order {} placed for product {}", order_id, id);
            pixel.purchase(id, product, quantity.get());
            commands.notify(Notice::Success("Order placed successfully!".to_string()));
            Ok(order_id)
        }
        Err(e) => {
            error!("Error placing order for product {}: {}", id, e);
            commands.notify(Notice::Error("Error placing order".to_string()));
            Err(e)
        }
    }
}

async fn submit_order(
    commands: &Commands,
    id: &str,
    product: &Product,
    quantity: Quantity,
    form: &OrderForm,
) -> Result<String> {
    if product.stock == 0 {
        return Err(Error::invalid_input(format!("product {} is out of stock", id)));
    }
    form.validate()?;
    let order = build_order(id, product, quantity.get(), form, now_millis());
    commands.create_order(&order).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::NoticeLog;
    use crate::pixel::{PixelEvent, RecordingTransport};
    use crate::models::Settings;
    use dropshop_realtime::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn lamp(stock: u32) -> Product {
        Product {
            name: "Lamp".to_string(),
            category: "Home".to_string(),
            price: 250.0,
            stock,
            is_active: true,
            ..Product::default()
        }
    }

    fn form() -> OrderForm {
        OrderForm {
            customer_name: "Asha".to_string(),
            customer_email: "asha@example.com".to_string(),
            customer_phone: "+91 90000 00000".to_string(),
            address: "12 MG Road".to_string(),
        }
    }

    fn setup(store: &MemoryStore) -> (Commands, NoticeLog, Pixel<RecordingTransport>) {
        let notices = NoticeLog::new();
        let commands = Commands::new(Arc::new(store.clone()), Arc::new(notices.clone()));
        let pixel = Pixel::new(RecordingTransport::new());
        pixel.configure(Some(&Settings {
            facebook_pixel_id: Some("px".to_string()),
            ..Settings::default()
        }));
        (commands, notices, pixel)
    }

    #[test]
    fn test_quantity_stepper() {
        let mut quantity = Quantity::new(2);
        quantity.decrement();
        assert_eq!(quantity.get(), 1);
        quantity.increment();
        quantity.increment();
        assert_eq!(quantity.get(), 2);
        assert!(!quantity.can_increment());

        quantity.set(0);
        assert_eq!(quantity.get(), 1);
        quantity.set(50);
        assert_eq!(quantity.get(), 2);

        let mut unbounded = Quantity::new(0);
        unbounded.set(7);
        assert_eq!(unbounded.get(), 7);
    }

    #[test]
    fn test_form_validation() {
        assert!(form().validate().is_ok());
        let mut blank = form();
        blank.address = "  ".to_string();
        assert!(matches!(blank.validate(), Err(Error::InvalidInput(_))));
        let mut bad_email = form();
        bad_email.customer_email = "asha".to_string();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_build_order_freezes_name_and_total() {
        let order = build_order("p1", &lamp(5), 3, &form(), 42);
        assert_eq!(order.product_name, "Lamp");
        assert_eq!(order.total_amount, 750.0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, 42);
    }

    #[test]
    fn test_resolve_detail() {
        let mut state = LiveState::<Collection<Product>>::default();
        assert_eq!(ProductDetail::resolve(&state, "p1"), Lookup::Loading);

        let mut product = lamp(3);
        product.original_price = Some(1000.0);
        product.price = 750.0;
        state.data = Some(Arc::new([("p1".to_string(), product)].into_iter().collect()));
        state.loading = false;

        let detail = ProductDetail::resolve(&state, "p1").found().unwrap();
        assert_eq!(detail.discount_percentage, 25);
        assert_eq!(detail.stock_level, StockLevel::Low(3));
        assert!(detail.can_purchase());
        assert!(ProductDetail::resolve(&state, "p2").is_not_found());
    }

    #[tokio::test]
    async fn test_place_order_success() {
        let store = MemoryStore::new();
        let (commands, notices, pixel) = setup(&store);

        let mut quantity = Quantity::new(5);
        quantity.increment();
        let order_id = place_order(&commands, &pixel, "p1", &lamp(5), quantity, &form())
            .await
            .unwrap();

        let stored = store.snapshot(&format!("orders/{}", order_id));
        assert_eq!(stored["productName"], json!("Lamp"));
        assert_eq!(stored["totalAmount"], json!(500.0));
        assert_eq!(stored["status"], json!("pending"));
        assert_eq!(
            pixel.transport().events(),
            vec![PixelEvent::PageView, PixelEvent::Purchase]
        );
        assert_eq!(
            notices.take(),
            vec![Notice::Success("Order placed successfully!".to_string())]
        );
    }

    #[tokio::test]
    async fn test_place_order_failure_fires_nothing() {
        let store = MemoryStore::new();
        let (commands, notices, pixel) = setup(&store);
        store.fail_next_write("permission_denied");

        let result = place_order(&commands, &pixel, "p1", &lamp(5), Quantity::new(5), &form()).await;

        assert!(result.is_err());
        assert_eq!(pixel.transport().events(), vec![PixelEvent::PageView]);
        assert_eq!(notices.take(), vec![Notice::Error("Error placing order".to_string())]);
        assert_eq!(store.snapshot("orders"), json!(null));
    }

    #[tokio::test]
    async fn test_out_of_stock_is_rejected() {
        let store = MemoryStore::new();
        let (commands, notices, pixel) = setup(&store);

        let result = place_order(&commands, &pixel, "p1", &lamp(0), Quantity::new(0), &form()).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(notices.take().len(), 1);
        assert_eq!(store.snapshot("orders"), json!(null));
    }

    #[test]
    fn test_add_to_cart_notifies() {
        let store = MemoryStore::new();
        let (commands, notices, pixel) = setup(&store);

        let mut quantity = Quantity::new(5);
        quantity.set(2);
        add_to_cart(&commands, &pixel, "p1", &lamp(5), quantity);

        assert_eq!(notices.take()[0].message(), "Lamp added to cart!");
        match pixel.transport().calls().last() {
            Some(crate::pixel::PixelCall::Track { event, params: Some(params), .. }) => {
                assert_eq!(*event, PixelEvent::AddToCart);
                assert_eq!(params.value, 500.0);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
