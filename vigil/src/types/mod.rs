//! Core document types shared across the store contract and the coordination protocol.

mod listener;

pub use listener::{Listener, ListenerId, ListenerPatch, ListenerPhase, Revision, Seq};
