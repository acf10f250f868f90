//! `KVStore`: the abstract persistence contract the gateway depends on, plus
//! a Redis-backed implementation and an in-process fake for tests.

pub mod backoff;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{ApproveOutcome, KVStore};
