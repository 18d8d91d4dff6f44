//! Store backends for the allocation engine.
//!
//! Both backends implement [`AtomicStore`](shortlink_core::AtomicStore) and
//! [`CounterStore`](shortlink_core::CounterStore) with identical semantics:
//!
//! - [`RedisStore`] runs each commit and each counter increment as a Lua
//!   script, so Redis' single command processor serializes them.
//! - [`InMemoryStore`] holds every record in one mutex-guarded map, which
//!   gives the same all-or-nothing behaviour for deterministic tests.

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;
