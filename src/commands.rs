//! Admin write commands
//!
//! Every command performs one write and reports exactly one notice, success
//! or error. Failures are also returned to the caller. Nothing is retried and
//! no local state is changed optimistically: the result shows up through the
//! live subscriptions once the backend has applied it.

use crate::error::{Error, Result};
use crate::models::{DataPath, Order, OrderStatus, Settings};
use dropshop_database::DatabaseClient;
use dropshop_realtime::MemoryStore;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Backend that accepts writes
#[async_trait::async_trait]
pub trait WriteTarget: Send + Sync {
    /// Append `value` under `path`, returning the generated id
    async fn push(&self, path: &str, value: Value) -> Result<String>;

    /// Merge the members of `partial` into the node at `path`
    async fn update(&self, path: &str, partial: Value) -> Result<()>;

    /// Delete the node at `path`
    async fn remove(&self, path: &str) -> Result<()>;
}

#[async_trait::async_trait]
impl WriteTarget for DatabaseClient {
    async fn push(&self, path: &str, value: Value) -> Result<String> {
        Ok(self.reference(path)?.push(&value).await?)
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        Ok(self.reference(path)?.update(&partial).await?)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        Ok(self.reference(path)?.remove().await?)
    }
}

#[async_trait::async_trait]
impl WriteTarget for MemoryStore {
    async fn push(&self, path: &str, value: Value) -> Result<String> {
        Ok(MemoryStore::push(self, path, value)?)
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        Ok(MemoryStore::update(self, path, partial)?)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        Ok(MemoryStore::remove(self, path)?)
    }
}

/// User-facing outcome of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(message) | Notice::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Receives command notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => info!("{}", message),
            Notice::Error(message) => warn!("{}", message),
        }
    }
}

/// Keeps notices in memory until taken
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far
    pub fn notices(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    /// Remove and return all notices
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notice>> {
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.lock().push(notice);
    }
}

/// Collections managed from the admin console.
///
/// Orders are absent on purpose: they are created by checkout and never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCollection {
    Products,
    Categories,
    Banners,
}

impl AdminCollection {
    pub fn path(&self) -> DataPath {
        match self {
            AdminCollection::Products => DataPath::Products,
            AdminCollection::Categories => DataPath::Categories,
            AdminCollection::Banners => DataPath::Banners,
        }
    }

    /// Capitalised record name used in notices
    pub fn label(&self) -> &'static str {
        match self {
            AdminCollection::Products => "Product",
            AdminCollection::Categories => "Category",
            AdminCollection::Banners => "Banner",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            AdminCollection::Products => "product",
            AdminCollection::Categories => "category",
            AdminCollection::Banners => "banner",
        }
    }
}

/// Record ids are single path segments
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.chars().any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']')) {
        return Err(Error::invalid_input(format!("invalid record id '{}'", id)));
    }
    Ok(())
}

fn to_object<T: Serialize>(value: &T) -> Result<Value> {
    match serde_json::to_value(value)? {
        object @ Value::Object(_) => Ok(object),
        _ => Err(Error::invalid_input("record must serialize to a JSON object")),
    }
}

/// Admin and checkout writes against one backend
#[derive(Clone)]
pub struct Commands {
    target: Arc<dyn WriteTarget>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commands").finish_non_exhaustive()
    }
}

impl Commands {
    pub fn new(target: Arc<dyn WriteTarget>, notifier: Arc<dyn Notifier>) -> Self {
        Self { target, notifier }
    }

    /// Add a record, returning its id
    pub async fn create<T: Serialize + Sync>(&self, collection: AdminCollection, record: &T) -> Result<String> {
        let result = self.try_create(collection, record).await;
        self.report(
            result,
            format!("{} added successfully!", collection.label()),
            format!("Error saving {}", collection.noun()),
        )
    }

    async fn try_create<T: Serialize + Sync>(&self, collection: AdminCollection, record: &T) -> Result<String> {
        let value = to_object(record)?;
        let id = self.target.push(collection.path().as_str(), value).await?;
        debug!("Created {}/{}", collection.path(), id);
        Ok(id)
    }

    /// Merge `partial` into an existing record
    pub async fn update<T: Serialize + Sync>(&self, collection: AdminCollection, id: &str, partial: &T) -> Result<()> {
        let result = self.try_update(collection.path(), id, partial).await;
        self.report(
            result,
            format!("{} updated successfully!", collection.label()),
            format!("Error saving {}", collection.noun()),
        )
    }

    async fn try_update<T: Serialize + Sync>(&self, path: DataPath, id: &str, partial: &T) -> Result<()> {
        validate_id(id)?;
        let value = to_object(partial)?;
        self.target.update(&path.record(id), value).await
    }

    pub async fn delete(&self, collection: AdminCollection, id: &str) -> Result<()> {
        let result = match validate_id(id) {
            Ok(()) => self.target.remove(&collection.path().record(id)).await,
            Err(e) => Err(e),
        };
        self.report(
            result,
            format!("{} deleted successfully!", collection.label()),
            format!("Error deleting {}", collection.noun()),
        )
    }

    /// Show or hide a record on the storefront
    pub async fn set_active(&self, collection: AdminCollection, id: &str, active: bool) -> Result<()> {
        let result = self
            .try_update(collection.path(), id, &json!({ "isActive": active }))
            .await;
        let verb = if active { "activated" } else { "deactivated" };
        self.report(
            result,
            format!("{} {} successfully!", collection.label(), verb),
            format!("Error updating {} status", collection.noun()),
        )
    }

    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<()> {
        let result = self
            .try_update(DataPath::Orders, id, &json!({ "status": status }))
            .await;
        self.report(
            result,
            "Order status updated successfully!".to_string(),
            "Error updating order status".to_string(),
        )
    }

    /// Merge the settings form. A cleared pixel id is written as null so
    /// the stored one is removed.
    pub async fn update_settings(&self, settings: &Settings) -> Result<()> {
        let result = match to_object(settings) {
            Ok(mut value) => {
                if let Value::Object(fields) = &mut value {
                    fields.entry("facebookPixelId").or_insert(Value::Null);
                }
                self.target.update(DataPath::Settings.as_str(), value).await
            }
            Err(e) => Err(e),
        };
        self.report(
            result,
            "Settings updated successfully!".to_string(),
            "Error updating settings".to_string(),
        )
    }

    /// Write a new order; notices are left to checkout
    pub(crate) async fn create_order(&self, order: &Order) -> Result<String> {
        let value = to_object(order)?;
        self.target.push(DataPath::Orders.as_str(), value).await
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    fn report<T>(&self, result: Result<T>, success: String, failure: String) -> Result<T> {
        match result {
            Ok(value) => {
                self.notify(Notice::Success(success));
                Ok(value)
            }
            Err(e) => {
                error!("{}: {}", failure, e);
                self.notify(Notice::Error(failure));
                Err(e)
            }
        }
    }
}
