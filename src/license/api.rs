use super::types::{
  AdminModules, AdminStats, DashboardStats, Health, IssuedLicense, License, LicenseInfo,
  LicenseRequest, LicenseType, LicenseTypeDraft, Module, ModuleDraft, MutationResponse,
  Purchases, ValidationRequest, ValidationResult,
};
use crate::api::ApiError;
use async_trait::async_trait;

/// Everything the console can ask of the license server.
///
/// Views hold this as `Arc<dyn LicenseApi>` so they can be driven by a fake
/// in tests.
#[async_trait]
pub trait LicenseApi: Send + Sync {
  async fn health(&self) -> Result<Health, ApiError>;

  // Catalog
  async fn modules(&self) -> Result<Vec<Module>, ApiError>;
  async fn license_types(&self) -> Result<Vec<LicenseType>, ApiError>;

  // License lifecycle
  async fn request_license(&self, request: &LicenseRequest) -> Result<IssuedLicense, ApiError>;
  async fn validate_license(
    &self,
    request: &ValidationRequest,
  ) -> Result<ValidationResult, ApiError>;
  async fn license_info(&self, license_key: &str) -> Result<LicenseInfo, ApiError>;
  async fn renew_license(
    &self,
    license_key: &str,
    renewal_days: u32,
  ) -> Result<MutationResponse, ApiError>;
  async fn deactivate_license(&self, license_key: &str) -> Result<MutationResponse, ApiError>;

  // Control panel
  async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError>;
  async fn licenses(&self) -> Result<Vec<License>, ApiError>;
  async fn toggle_license(&self, license_id: i64) -> Result<MutationResponse, ApiError>;
  async fn block_module(
    &self,
    license_id: i64,
    module_name: &str,
  ) -> Result<MutationResponse, ApiError>;
  async fn purchases(&self) -> Result<Purchases, ApiError>;

  // Module administration
  async fn admin_modules(&self) -> Result<AdminModules, ApiError>;
  async fn create_module(&self, draft: &ModuleDraft) -> Result<MutationResponse, ApiError>;
  async fn update_module(
    &self,
    module_id: i64,
    draft: &ModuleDraft,
  ) -> Result<MutationResponse, ApiError>;
  async fn delete_module(&self, module_id: i64) -> Result<MutationResponse, ApiError>;
  async fn admin_stats(&self) -> Result<AdminStats, ApiError>;
  async fn categories(&self) -> Result<Vec<String>, ApiError>;

  // License type administration
  async fn admin_license_types(&self) -> Result<Vec<LicenseType>, ApiError>;
  async fn create_license_type(
    &self,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError>;
  async fn update_license_type(
    &self,
    type_id: i64,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError>;
  async fn delete_license_type(&self, type_id: i64) -> Result<MutationResponse, ApiError>;
}
