use super::types::{
  AdminModules, AdminStats, CategoriesEnvelope, DashboardStats, Health, IssuedLicense, License,
  LicenseInfo, LicenseRequest, LicenseType, LicenseTypeDraft, LicenseTypesEnvelope,
  LicensesEnvelope, Module, ModuleDraft, MutationResponse, Purchases, StatsEnvelope,
  ValidationRequest, ValidationResult,
};
use crate::api::{encode_component, ApiError, HttpExecutor, RequestOptions, RetryPolicy};
use crate::config::ServerConfig;
use reqwest::header::{HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// The dashboard should show Offline quickly rather than wait out the default
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// License server client: every call goes through the retry policy.
#[derive(Debug, Clone)]
pub struct LicenseClient {
  executor: HttpExecutor,
  retry: RetryPolicy,
}

impl LicenseClient {
  pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
    let executor = HttpExecutor::new(&config.url, config.timeout())?;
    let retry = RetryPolicy::new(config.retry_attempts)
      .with_client_errors_retried(config.retry_client_errors);
    Ok(Self::with_parts(executor, retry))
  }

  pub fn with_parts(executor: HttpExecutor, retry: RetryPolicy) -> Self {
    Self { executor, retry }
  }

  pub fn base_url(&self) -> &str {
    self.executor.base_url()
  }

  /// Raw JSON for an endpoint, retried per policy
  pub async fn fetch_json(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
    let options = options.with_header(ACCEPT, HeaderValue::from_static("application/json"));
    self
      .retry
      .run(|attempt| {
        let executor = self.executor.clone();
        let options = options.clone();
        let endpoint = endpoint.to_string();
        async move { executor.execute_attempt(&endpoint, &options, attempt).await }
      })
      .await
  }

  async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
    decode(self.fetch_json(endpoint, RequestOptions::get()).await?)
  }

  async fn send<T, B>(&self, options: RequestOptions, endpoint: &str, body: Option<&B>) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let options = match body {
      Some(body) => {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Shape(e.to_string()))?;
        options.with_body(body)
      }
      None => options,
    };
    decode(self.fetch_json(endpoint, options).await?)
  }

  pub async fn health(&self) -> Result<Health, ApiError> {
    let options = RequestOptions::get().with_timeout(HEALTH_TIMEOUT);
    decode(self.fetch_json("/health", options).await?)
  }

  pub async fn modules(&self) -> Result<Vec<Module>, ApiError> {
    self.get(MODULES_ENDPOINT).await
  }

  pub async fn license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    self.get(LICENSE_TYPES_ENDPOINT).await
  }

  pub async fn request_license(&self, request: &LicenseRequest) -> Result<IssuedLicense, ApiError> {
    self
      .send(RequestOptions::post(), "/license/request", Some(request))
      .await
  }

  pub async fn validate_license(
    &self,
    request: &ValidationRequest,
  ) -> Result<ValidationResult, ApiError> {
    self
      .send(RequestOptions::post(), "/license/validate", Some(request))
      .await
  }

  pub async fn license_info(&self, license_key: &str) -> Result<LicenseInfo, ApiError> {
    self
      .get(&format!("/license/info/{}", encode_component(license_key)))
      .await
  }

  pub async fn renew_license(
    &self,
    license_key: &str,
    renewal_days: u32,
  ) -> Result<MutationResponse, ApiError> {
    let endpoint = format!(
      "/license/renew/{}?renewal_days={}",
      encode_component(license_key),
      renewal_days
    );
    self.send::<_, Value>(RequestOptions::post(), &endpoint, None).await
  }

  pub async fn deactivate_license(&self, license_key: &str) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/license/deactivate/{}", encode_component(license_key));
    self.send::<_, Value>(RequestOptions::post(), &endpoint, None).await
  }

  pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
    let envelope: StatsEnvelope<DashboardStats> = self.get("/admin/dashboard").await?;
    Ok(envelope.stats)
  }

  pub async fn licenses(&self) -> Result<Vec<License>, ApiError> {
    let envelope: LicensesEnvelope = self.get("/admin/licenses").await?;
    Ok(envelope.licenses)
  }

  pub async fn toggle_license(&self, license_id: i64) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/admin/licenses/{}/toggle", license_id);
    self.send::<_, Value>(RequestOptions::post(), &endpoint, None).await
  }

  pub async fn block_module(
    &self,
    license_id: i64,
    module_name: &str,
  ) -> Result<MutationResponse, ApiError> {
    let endpoint = format!(
      "/admin/licenses/{}/block-module?module_name={}",
      license_id,
      encode_component(module_name)
    );
    self.send::<_, Value>(RequestOptions::post(), &endpoint, None).await
  }

  pub async fn purchases(&self) -> Result<Purchases, ApiError> {
    self.get("/admin/purchases").await
  }

  pub async fn admin_modules(&self) -> Result<AdminModules, ApiError> {
    self.get("/admin/modules").await
  }

  pub async fn create_module(&self, draft: &ModuleDraft) -> Result<MutationResponse, ApiError> {
    self
      .send(RequestOptions::post(), "/admin/modules", Some(draft))
      .await
  }

  pub async fn update_module(
    &self,
    module_id: i64,
    draft: &ModuleDraft,
  ) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/admin/modules/{}", module_id);
    self.send(RequestOptions::put(), &endpoint, Some(draft)).await
  }

  pub async fn delete_module(&self, module_id: i64) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/admin/modules/{}", module_id);
    self.send::<_, Value>(RequestOptions::delete(), &endpoint, None).await
  }

  pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
    let envelope: StatsEnvelope<AdminStats> = self.get("/admin/stats").await?;
    Ok(envelope.stats)
  }

  pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
    let envelope: CategoriesEnvelope = self.get("/admin/categories").await?;
    Ok(envelope.categories)
  }

  pub async fn admin_license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    let envelope: LicenseTypesEnvelope = self.get("/admin/license-types").await?;
    Ok(envelope.license_types)
  }

  pub async fn create_license_type(
    &self,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    self
      .send(RequestOptions::post(), "/admin/license-types", Some(draft))
      .await
  }

  pub async fn update_license_type(
    &self,
    type_id: i64,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/admin/license-types/{}", type_id);
    self.send(RequestOptions::put(), &endpoint, Some(draft)).await
  }

  pub async fn delete_license_type(&self, type_id: i64) -> Result<MutationResponse, ApiError> {
    let endpoint = format!("/admin/license-types/{}", type_id);
    self.send::<_, Value>(RequestOptions::delete(), &endpoint, None).await
  }
}

pub(crate) const MODULES_ENDPOINT: &str = "/license/modules";
pub(crate) const LICENSE_TYPES_ENDPOINT: &str = "/license/types";

/// Convert a JSON value into a typed record
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Shape(e.to_string()))
}
