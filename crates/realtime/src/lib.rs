//! Live snapshot subscriptions for the dropshop realtime document store
//!
//! This crate provides the subscription contract (`SnapshotSource`,
//! `Subscription`), an in-memory store implementing it, and a streaming
//! client over the database's server-sent-event feed.

mod client;
mod error;
mod memory;
pub mod push_id;
mod sse;
mod subscription;
pub mod tree;

pub use client::{RealtimeClientOptions, StreamingClient};
pub use error::RealtimeError;
pub use memory::MemoryStore;
pub use push_id::PushIdGenerator;
pub use sse::{SseEvent, SseParser, StreamEvent};
pub use subscription::{Listener, SnapshotEvent, SnapshotSource, Subscription};
