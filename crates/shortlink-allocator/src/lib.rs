//! Short-code allocation and admission.
//!
//! [`Allocator`] turns a normalized URL into a committed short code, retrying
//! a bounded number of candidates. [`RateLimiter`] gates callers per origin
//! with fixed windows. [`ShortlinkService`] wires both together the way a
//! "create short link" endpoint uses them.

pub mod allocator;
pub mod error;
pub mod rate_limit;
pub mod service;

pub use allocator::{AllocateOptions, Allocator};
pub use error::AllocError;
pub use rate_limit::{RateDecision, RateLimitPolicy, RateLimiter};
pub use service::{Created, ServiceConfig, ShortlinkService, DEFAULT_RESOLVE_PATH};
