//! Carousel and purchase-popup timers
//!
//! Both are plain state machines. The caller passes the current time from a
//! [`Clock`] into `sync` and `poll`; nothing here sleeps or spawns.

use crate::models::{Collection, Product, Settings};
use crate::views::{self, Entry};
use log::{debug, trace};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of monotonic time, measured from an arbitrary origin
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock moved by hand; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    pub fn set(&self, now: Duration) {
        *self.lock() = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Duration> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.lock()
    }
}

/// Banner carousel position
#[derive(Debug, Clone)]
pub struct Carousel {
    period: Duration,
    len: usize,
    index: usize,
    deadline: Option<Duration>,
}

impl Carousel {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            len: 0,
            index: 0,
            deadline: None,
        }
    }

    /// Follow the number of slides. A change of length restarts the timer,
    /// which only runs with more than one slide.
    pub fn sync(&mut self, len: usize, now: Duration) {
        if len == self.len && (self.deadline.is_some() || len <= 1) {
            return;
        }
        self.len = len;
        self.index = self.index.min(len.saturating_sub(1));
        self.deadline = (len > 1).then(|| now + self.period);
        trace!("Carousel synced to {} slides", len);
    }

    /// Advance if the period has elapsed; returns the new index when it moved.
    pub fn poll(&mut self, now: Duration) -> Option<usize> {
        let mut deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        while deadline <= now {
            self.index = (self.index + 1) % self.len;
            deadline += self.period;
        }
        self.deadline = Some(deadline);
        Some(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// When the next automatic advance is due
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn next(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    pub fn prev(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    /// Jump to a slide; out of range indexes are ignored
    pub fn go_to(&mut self, index: usize) {
        if index < self.len {
            self.index = index;
        }
    }
}

/// Purchase popup schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupTimings {
    /// Delay before the first popup
    pub initial_delay: Duration,
    /// Lower bound of the gap between popups, inclusive
    pub min_period: Duration,
    /// Upper bound of the gap between popups, exclusive
    pub max_period: Duration,
    /// How long a popup stays visible
    pub display: Duration,
}

impl Default for PopupTimings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            min_period: Duration::from_secs(30),
            max_period: Duration::from_secs(60),
            display: Duration::from_secs(5),
        }
    }
}

impl PopupTimings {
    fn draw_period<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = self.min_period.as_millis() as u64;
        let max = self.max_period.as_millis() as u64;
        if max <= min {
            return self.min_period;
        }
        Duration::from_millis(rng.gen_range(min..max))
    }
}

pub const BUYER_NAMES: [&str; 10] = [
    "Rahul", "Priya", "Amit", "Sneha", "Vikram", "Anjali", "Rohit", "Kavya", "Arjun", "Divya",
];

pub const CITIES: [&str; 8] = [
    "Mumbai",
    "Delhi",
    "Bangalore",
    "Chennai",
    "Hyderabad",
    "Pune",
    "Kolkata",
    "Ahmedabad",
];

/// The product fields a popup shows
#[derive(Debug, Clone, PartialEq)]
pub struct PopupCandidate {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub fake_buy_count: u32,
}

impl PopupCandidate {
    pub fn from_entry((id, product): Entry<'_, Product>) -> Self {
        Self {
            id: id.to_string(),
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            fake_buy_count: product.fake_buy_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseNotification {
    pub product: PopupCandidate,
    pub buyer: &'static str,
    pub city: &'static str,
    /// 1 to 30
    pub minutes_ago: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupEvent {
    Shown(PurchaseNotification),
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPhase {
    /// Disabled or nothing to show
    Idle,
    /// Armed, nothing on screen
    Waiting,
    Visible,
}

/// Fake "someone just bought this" notifications
pub struct PurchasePopup<R: Rng> {
    timings: PopupTimings,
    rng: R,
    enabled: bool,
    candidates: Vec<PopupCandidate>,
    next_show: Option<Duration>,
    hide_at: Option<Duration>,
    visible: Option<PurchaseNotification>,
}

impl<R: Rng> PurchasePopup<R> {
    pub fn new(timings: PopupTimings, rng: R) -> Self {
        Self {
            timings,
            rng,
            enabled: false,
            candidates: Vec::new(),
            next_show: None,
            hide_at: None,
            visible: None,
        }
    }

    /// Follow the enable flag and the eligible products. Any change cancels
    /// the schedule, hides the popup and rearms with the initial delay.
    pub fn sync(&mut self, enabled: bool, candidates: Vec<PopupCandidate>, now: Duration) {
        if enabled == self.enabled && candidates == self.candidates {
            return;
        }
        self.enabled = enabled;
        self.candidates = candidates;
        self.visible = None;
        self.hide_at = None;
        self.next_show = (self.enabled && !self.candidates.is_empty()).then(|| now + self.timings.initial_delay);
        debug!(
            "Purchase popup {} with {} candidates",
            if self.next_show.is_some() { "armed" } else { "idle" },
            self.candidates.len()
        );
    }

    /// [`sync`](Self::sync) from live snapshots. Absent settings disable the popup.
    pub fn sync_from(&mut self, settings: Option<&Settings>, products: Option<&Collection<Product>>, now: Duration) {
        let enabled = settings.map_or(false, |s| s.show_fake_purchase);
        let candidates = views::popup_candidates(products)
            .into_iter()
            .map(PopupCandidate::from_entry)
            .collect();
        self.sync(enabled, candidates, now);
    }

    /// Fire the earliest due transition, if any. Call again until it
    /// returns `None` to catch up after a long gap.
    pub fn poll(&mut self, now: Duration) -> Option<PopupEvent> {
        let hide_due = self.hide_at.filter(|at| *at <= now);
        let show_due = self.next_show.filter(|at| *at <= now);

        match (hide_due, show_due) {
            (Some(hide), Some(show)) if hide <= show => self.hide(),
            (Some(_), None) => self.hide(),
            (_, Some(show)) => self.show(show),
            (None, None) => None,
        }
    }

    /// Hide the popup before its display time runs out
    pub fn dismiss(&mut self) {
        self.visible = None;
        self.hide_at = None;
    }

    pub fn phase(&self) -> PopupPhase {
        if self.visible.is_some() {
            PopupPhase::Visible
        } else if self.next_show.is_some() {
            PopupPhase::Waiting
        } else {
            PopupPhase::Idle
        }
    }

    pub fn visible(&self) -> Option<&PurchaseNotification> {
        self.visible.as_ref()
    }

    /// When `poll` next has something to do
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.hide_at, self.next_show) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn hide(&mut self) -> Option<PopupEvent> {
        self.hide_at = None;
        self.visible = None;
        Some(PopupEvent::Hidden)
    }

    fn show(&mut self, at: Duration) -> Option<PopupEvent> {
        if self.candidates.is_empty() {
            self.next_show = None;
            return None;
        }
        let product = self.candidates[self.rng.gen_range(0..self.candidates.len())].clone();
        let notification = PurchaseNotification {
            product,
            buyer: BUYER_NAMES[self.rng.gen_range(0..BUYER_NAMES.len())],
            city: CITIES[self.rng.gen_range(0..CITIES.len())],
            minutes_ago: self.rng.gen_range(1..=30),
        };
        self.next_show = Some(at + self.timings.draw_period(&mut self.rng));
        self.hide_at = Some(at + self.timings.display);
        self.visible = Some(notification.clone());
        trace!("Showing purchase popup for {}", notification.product.id);
        Some(PopupEvent::Shown(notification))
    }
}
