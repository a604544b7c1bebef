pub mod api;
pub mod cached_client;
pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use api::LicenseApi;
pub use cached_client::{CacheKey, CacheTtls, CachedLicenseClient};
pub use client::LicenseClient;
