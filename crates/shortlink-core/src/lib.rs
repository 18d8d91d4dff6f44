//! Core types and traits for the shortlink allocation engine.
//!
//! This crate provides the domain types shared by the code generator, the
//! store implementations and the allocator: validated short codes, normalized
//! URLs, the key layout, and the store traits the allocator commits through.

pub mod clock;
pub mod error;
pub mod keyspace;
pub mod shortcode;
pub mod store;
pub mod url;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, StoreError};
pub use keyspace::Keyspace;
pub use shortcode::{CodeLength, ShortCode, ALPHABET};
pub use store::{AtomicStore, CodeCommit, CommitOutcome, CounterStore, WindowCount};
pub use self::url::{DedupeHash, NormalizedUrl};
