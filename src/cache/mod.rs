// Response cache module
// Author: kelexine (https://github.com/kelexine)

pub mod key;
pub mod models;
mod store;

pub use key::CacheKey;
pub use models::{CacheConfig, CacheEntry, CacheStats};
pub use store::ResponseCache;
