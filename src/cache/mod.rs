//! Cache backends for listing pages.
//!
//! - [`MemoryCache`]: in-process LRU with per-entry expiry
//! - [`RedisCache`]: shared Redis instance via a managed connection
//!
//! Both implement [`crate::application::repos::CacheStore`] and store opaque
//! strings; serialization is the caller's concern.

mod lock;
mod memory;
mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;
