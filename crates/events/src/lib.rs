//! Signal plumbing: event trait, pub/sub bus, after-commit buffering.
//!
//! Domain crates describe *what happened* as plain event values; this crate only
//! moves them around. Nothing here knows about inventory, notifications or work logs.

pub mod after_commit;
pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use after_commit::AfterCommit;
pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
