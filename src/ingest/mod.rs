//! Webhook ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → handler.rs (orchestration, one terminal response per request)
//!     → body.rs (JSON or raw text, never rejected)
//!     → headers.rs (flat name → value map)
//!     → storage (endpoint lookup, event insert)
//!     → error.rs (failure → status + JSON error)
//! ```

pub mod body;
pub mod error;
pub mod handler;
pub mod headers;

pub use body::{normalize, StoredBody};
pub use error::IngestError;
pub use handler::{probe_webhook, receive_webhook};
