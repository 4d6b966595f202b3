//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the router workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `RouteTable` maps a conversation id to a `RouteEntry` (display name + targets)
//! - `ConfigSnapshot` pairs a table with the platform credentials under a version
//! - `SnapshotStore` publishes snapshots copy-on-write; readers never see partial edits

mod conversation_id;
mod delivery;
mod error;
mod listener;
mod notification;
mod route;
mod snapshot;

pub use conversation_id::ConversationId;
pub use delivery::{DeliveryOutcome, DeliveryStatus};
pub use error::*;
pub use listener::{
    EventCallback, EventListener, InboundEvent, ListenerFactory, ListenerState,
    LocalListenerFactory,
};
pub use notification::*;
pub use route::{RouteEntry, RouteTable, TargetUrl};
pub use snapshot::{ConfigSnapshot, Credentials, SnapshotStore};
