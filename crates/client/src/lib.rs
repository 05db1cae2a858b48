//! Push and pull channel clients for image-generation jobs.
//!
//! Provides the HTTP API wrapper (submission and status polling), the
//! per-job WebSocket push session, the stale-job poller, and the
//! [`JobTracker`](tracker::JobTracker) facade that wires them to a shared
//! [`JobStore`](genbridge_core::store::JobStore).

pub mod api;
pub mod client;
pub mod config;
pub mod health;
pub mod messages;
pub mod poller;
pub mod pull;
pub mod session;
pub mod tracker;
