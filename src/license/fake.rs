//! Scripted `LicenseApi` for controller and view tests.

use super::api::LicenseApi;
use super::client::decode;
use super::types::{
  AdminModules, AdminStats, DashboardStats, Health, IssuedLicense, License, LicenseInfo,
  LicenseRequest, LicenseType, LicenseTypeDraft, Module, ModuleDraft, MutationResponse,
  Purchases, ValidationRequest, ValidationResult,
};
use crate::api::ApiError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Stub {
  Json(Value),
  Status(u16, String),
}

/// Replies are queued per method; the last one repeats.
#[derive(Default)]
pub struct FakeApi {
  replies: Mutex<HashMap<&'static str, VecDeque<Stub>>>,
  calls: Mutex<Vec<String>>,
}

impl FakeApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reply(self, method: &'static str, value: Value) -> Self {
    self.push(method, Stub::Json(value));
    self
  }

  pub fn fail(self, method: &'static str, status: u16, message: &str) -> Self {
    self.push(method, Stub::Status(status, message.to_string()));
    self
  }

  fn push(&self, method: &'static str, stub: Stub) {
    self
      .replies
      .lock()
      .unwrap()
      .entry(method)
      .or_default()
      .push_back(stub);
  }

  /// Every call in order, as `method args`
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, method: &str) -> usize {
    self
      .calls()
      .iter()
      .filter(|c| c.split_whitespace().next() == Some(method))
      .count()
  }

  fn answer<T: DeserializeOwned>(&self, method: &'static str, call: String) -> Result<T, ApiError> {
    self.calls.lock().unwrap().push(call);

    let stub = {
      let mut replies = self.replies.lock().unwrap();
      match replies.get_mut(method) {
        Some(queue) if queue.len() > 1 => queue.pop_front(),
        Some(queue) => queue.front().cloned(),
        None => None,
      }
    };

    match stub {
      Some(Stub::Json(value)) => decode(value),
      Some(Stub::Status(status, message)) => Err(ApiError::Http { status, message }),
      None => Err(ApiError::Shape(format!("no reply scripted for {}", method))),
    }
  }
}

#[async_trait]
impl LicenseApi for FakeApi {
  async fn health(&self) -> Result<Health, ApiError> {
    self.answer("health", "health".into())
  }

  async fn modules(&self) -> Result<Vec<Module>, ApiError> {
    self.answer("modules", "modules".into())
  }

  async fn license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    self.answer("license_types", "license_types".into())
  }

  async fn request_license(&self, request: &LicenseRequest) -> Result<IssuedLicense, ApiError> {
    self.answer(
      "request_license",
      format!("request_license {}", request.client_email),
    )
  }

  async fn validate_license(
    &self,
    request: &ValidationRequest,
  ) -> Result<ValidationResult, ApiError> {
    self.answer(
      "validate_license",
      format!(
        "validate_license {} {} {}",
        request.license_key, request.module_name, request.user_count
      ),
    )
  }

  async fn license_info(&self, license_key: &str) -> Result<LicenseInfo, ApiError> {
    self.answer("license_info", format!("license_info {}", license_key))
  }

  async fn renew_license(
    &self,
    license_key: &str,
    renewal_days: u32,
  ) -> Result<MutationResponse, ApiError> {
    self.answer(
      "renew_license",
      format!("renew_license {} {}", license_key, renewal_days),
    )
  }

  async fn deactivate_license(&self, license_key: &str) -> Result<MutationResponse, ApiError> {
    self.answer(
      "deactivate_license",
      format!("deactivate_license {}", license_key),
    )
  }

  async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
    self.answer("dashboard_stats", "dashboard_stats".into())
  }

  async fn licenses(&self) -> Result<Vec<License>, ApiError> {
    self.answer("licenses", "licenses".into())
  }

  async fn toggle_license(&self, license_id: i64) -> Result<MutationResponse, ApiError> {
    self.answer("toggle_license", format!("toggle_license {}", license_id))
  }

  async fn block_module(
    &self,
    license_id: i64,
    module_name: &str,
  ) -> Result<MutationResponse, ApiError> {
    self.answer(
      "block_module",
      format!("block_module {} {}", license_id, module_name),
    )
  }

  async fn purchases(&self) -> Result<Purchases, ApiError> {
    self.answer("purchases", "purchases".into())
  }

  async fn admin_modules(&self) -> Result<AdminModules, ApiError> {
    self.answer("admin_modules", "admin_modules".into())
  }

  async fn create_module(&self, draft: &ModuleDraft) -> Result<MutationResponse, ApiError> {
    self.answer("create_module", format!("create_module {}", draft.name))
  }

  async fn update_module(
    &self,
    module_id: i64,
    draft: &ModuleDraft,
  ) -> Result<MutationResponse, ApiError> {
    self.answer(
      "update_module",
      format!("update_module {} {}", module_id, draft.name),
    )
  }

  async fn delete_module(&self, module_id: i64) -> Result<MutationResponse, ApiError> {
    self.answer("delete_module", format!("delete_module {}", module_id))
  }

  async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
    self.answer("admin_stats", "admin_stats".into())
  }

  async fn categories(&self) -> Result<Vec<String>, ApiError> {
    self.answer("categories", "categories".into())
  }

  async fn admin_license_types(&self) -> Result<Vec<LicenseType>, ApiError> {
    self.answer("admin_license_types", "admin_license_types".into())
  }

  async fn create_license_type(
    &self,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    self.answer(
      "create_license_type",
      format!("create_license_type {}", draft.name),
    )
  }

  async fn update_license_type(
    &self,
    type_id: i64,
    draft: &LicenseTypeDraft,
  ) -> Result<MutationResponse, ApiError> {
    self.answer(
      "update_license_type",
      format!("update_license_type {} {}", type_id, draft.name),
    )
  }

  async fn delete_license_type(&self, type_id: i64) -> Result<MutationResponse, ApiError> {
    self.answer(
      "delete_license_type",
      format!("delete_license_type {}", type_id),
    )
  }
}
