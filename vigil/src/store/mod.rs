//! Listener persistence: the store contract and the in-memory implementation.

pub mod base;
pub mod memory;

pub use base::{BulkOutcome, ListenerIndex, ListenerStore};
pub use memory::MemoryStore;
