//! Webhook inbox library.
//!
//! Receives arbitrary HTTP callbacks on per-endpoint URLs, records each one
//! as an event, and exposes a management API for endpoints and events.

pub mod admin;
pub mod config;
pub mod http;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod storage;
pub mod time;

pub use config::schema::InboxConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
