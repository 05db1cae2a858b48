//! Job bookkeeping for asynchronous image generation.
//!
//! Holds the in-memory job store, the reconciler that commits terminal
//! results exactly once, and the event types published on every
//! lifecycle change. Transport concerns live in `genbridge-client`.

pub mod error;
pub mod events;
pub mod job;
pub mod reconciler;
pub mod store;
pub mod types;
