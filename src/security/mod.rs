//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming webhook:
//!     → rate_limit.rs (per-endpoint fixed window)
//!     → limits.rs (declared size, then actual size while reading)
//!     → Pass to ingestion
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input (Content-Length is re-checked)
//! - Cheapest checks first: nothing is read for a refused request

pub mod limits;
pub mod rate_limit;

pub use limits::{BodyReadError, PayloadGuard, PayloadTooLarge, SizeCheck};
pub use rate_limit::{Admission, RateLimiter};
