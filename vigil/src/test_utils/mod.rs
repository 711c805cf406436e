//! Utilities for exercising the coordination protocol in tests.

pub mod recording_store;

pub use recording_store::{RecordingStore, StoreMethod};
