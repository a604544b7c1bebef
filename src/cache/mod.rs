//! Expiring in-memory cache for low-churn server lists.
//!
//! - `TtlCache` stores values with a per-entry deadline
//! - `CachedAccessor` layers read-through fetching on top of it

mod accessor;
mod ttl;

pub use accessor::CachedAccessor;
pub use ttl::{CacheEntry, Clock, SystemClock, TtlCache};

#[cfg(test)]
pub(crate) use ttl::test_clock;
