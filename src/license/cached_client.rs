//! License client with TTL caching for the module and license-type lists.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, RequestOptions};
use crate::cache::{CachedAccessor, TtlCache};
use crate::config::CacheConfig;

use super::api::LicenseApi;
use super::client::{decode, LicenseClient, LICENSE_TYPES_ENDPOINT, MODULES_ENDPOINT};
use super::types::{
  AdminModules, AdminStats, DashboardStats, Health, IssuedLicense, License, LicenseInfo,
  LicenseRequest, LicenseType, LicenseTypeDraft, Module, ModuleDraft, MutationResponse,
  Purchases, ValidationRequest, ValidationResult,
};

/// Keys of the cached server lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
  Modules,
  LicenseTypes,
}

impl CacheKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      CacheKey::Modules => "modules",
      CacheKey::LicenseTypes => "license_types",
    }
  }

  fn endpoint(&self) -> &'static str {
    match self {
      CacheKey::Modules => MODULES_ENDPOINT,
      CacheKey::LicenseTypes => LICENSE_TYPES_ENDPOINT,
    }
  }
}

/// Time-to-live per cached list
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
  pub modules: Duration,
  pub license_types: Duration,
}

impl From<&CacheConfig> for CacheTtls {
  fn from(config: &CacheConfig) -> Self {
    Self {
      modules: config.modules_ttl(),
      license_types: config.license_types_ttl(),
    }
  }
}

impl CacheTtls {
  fn for_key(&self, key: CacheKey) -> Duration {
    match key {
      CacheKey::Modules => self.modules,
      CacheKey::LicenseTypes => self.license_types,
    }
  }
}

/// License client with transparent caching.
///
/// Reads of `/license/modules` and `/license/types` are served from the
/// cache while fresh. Successful module or license-type mutations drop the
/// matching entry. Everything else passes straight through.
#[derive(Clone)]
pub struct CachedLicenseClient {
  inner: LicenseClient,
  accessor: CachedAccessor<Value>,
  ttls: CacheTtls,
}

impl CachedLicenseClient {
  pub fn new(inner: LicenseClient, cache: Arc<TtlCache<Value>>, ttls: CacheTtls) -> Self {
    Self {
      inner,
      accessor: CachedAccessor::new(cache),
      ttls,
    }
  }

  pub fn base_url(&self) -> &str {
    self.inner.base_url()
  }

  pub fn cache(&self) -> &Arc<TtlCache<Value>> {
    self.accessor.cache()
  }

  pub fn invalidate(&self, key: CacheKey) {
    self.accessor.invalidate(key.as_str());
  }

  async fn cached<T: serde::de::DeserializeOwned>(&self, key: CacheKey) -> Result<T, ApiError> {
    let value = self
      .accessor
      .get_or_fetch(
        key.as_str(),
        || self.inner.fetch_json(key.endpoint(), RequestOptions::get()),
        self.ttls.for_key(key),
      )
      .await?;

    // Never keep serving a payload that cannot be decoded
    decode(value).inspect_err(|_| self.invalidate(key))
  }

  fn invalidate_on_success(
    &self,
    key: CacheKey,
    result: Result<MutationResponse, ApiError>,
  ) -> Result<MutationResponse, ApiError> {
    if matches!(&result, Ok(resp) if resp.success) {
      self.invalidate(key);
    }
    result
  }
}

#[async_trait]
impl LicenseApi for CachedLicenseClient {
  async fn health(&self) -> Result<Health, ApiError> {
    self.inner.health().await
  }

  async fn modules(&self) -> Result<Vec<Module>, ApiError> {
    self.cached(CacheKey::Modules).await
  }

  async fn license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    self.cached(CacheKey::LicenseTypes).await
  }

  async fn request_license(&self, request: &LicenseRequest) -> Result<IssuedLicense, ApiError> {
    self.inner.request_license(request).await
  }

  async fn validate_license(
    &self,
    request: &ValidationRequest,
  ) -> Result<ValidationResult, ApiError> {
    self.inner.validate_license(request).await
  }

  async fn license_info(&self, license_key: &str) -> Result<LicenseInfo, ApiError> {
    self.inner.license_info(license_key).await
  }

  async fn renew_license(
    &self,
    license_key: &str,
    renewal_days: u32,
  ) -> Result<MutationResponse, ApiError> {
    self.inner.renew_license(license_key, renewal_days).await
  }

  async fn deactivate_license(&self, license_key: &str) -> Result<MutationResponse, ApiError> {
    self.inner.deactivate_license(license_key).await
  }

  async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
    self.inner.dashboard_stats().await
  }

  async fn licenses(&self) -> Result<Vec<License>, ApiError> {
    self.inner.licenses().await
  }

  async fn toggle_license(&self, license_id: i64) -> Result<MutationResponse, ApiError> {
    self.inner.toggle_license(license_id).await
  }

  async fn block_module(
    &self,
    license_id: i64,
    module_name: &str,
  ) -> Result<MutationResponse, ApiError> {
    self.inner.block_module(license_id, module_name).await
  }

  async fn purchases(&self) -> Result<Purchases, ApiError> {
    self.inner.purchases().await
  }

  async fn admin_modules(&self) -> Result<AdminModules, ApiError> {
    self.inner.admin_modules().await
  }

  async fn create_module(&self, draft: &ModuleDraft) -> Result<MutationResponse, ApiError> {
    let result = self.inner.create_module(draft).await;
    self.invalidate_on_success(CacheKey::Modules, result)
  }

  async fn update_module(
    &self,
    module_id: i64,
    draft: &ModuleDraft,
  ) -> Result<MutationResponse, ApiError> {
    let result = self.inner.update_module(module_id, draft).await;
    self.invalidate_on_success(CacheKey::Modules, result)
  }

  async fn delete_module(&self, module_id: i64) -> Result<MutationResponse, ApiError> {
    let result = self.inner.delete_module(module_id).await;
    self.invalidate_on_success(CacheKey::Modules, result)
  }

  async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
    self.inner.admin_stats().await
  }

  async fn categories(&self) -> Result<Vec<String>, ApiError> {
    self.inner.categories().await
  }

  async fn admin_license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    self.inner.admin_license_types().await
  }

  async fn create_license_type(
    &self,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    let result = self.inner.create_license_type(draft).await;
    self.invalidate_on_success(CacheKey::LicenseTypes, result)
  }

  async fn update_license_type(
    &self,
    type_id: i64,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    let result = self.inner.update_license_type(type_id, draft).await;
    self.invalidate_on_success(CacheKey::LicenseTypes, result)
  }

  async fn delete_license_type(&self, type_id: i64) -> Result<MutationResponse, ApiError> {
    let result = self.inner.delete_license_type(type_id).await;
    self.invalidate_on_success(CacheKey::LicenseTypes, result)
  }
}
