//! Process-wide caches shared by all in-flight requests.
//!
//! Both caches are plain structs guarded by a mutex; they are created once at
//! startup and handed to every request behind an `Arc`.

pub mod exclude;
pub mod split_index;

pub use exclude::{DeliveryDecision, ExcludeCache, ExcludeCacheOptions};
pub use split_index::SplitIndexCache;
