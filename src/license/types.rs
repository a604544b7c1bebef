//! Records exchanged with the license server.
//!
//! The server owns these shapes. Every record keeps unknown fields in `extra`
//! and skips absent optionals, so a record deserialized from a response
//! serializes back to the same JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields the client does not model
pub type Extra = Map<String, Value>;

/// An installable module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
  /// Only present on the admin listing
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_core: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_license_level: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl Module {
  pub fn label(&self) -> &str {
    self.display_name.as_deref().unwrap_or(&self.name)
  }

  pub fn is_core(&self) -> bool {
    self.is_core.unwrap_or(false)
  }
}

/// A license tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseType {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_users: Option<i64>,
  /// -1 means unlimited
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_modules: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration_days: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub features: Option<Value>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl LicenseType {
  /// Maximum selectable modules, `None` when unlimited. Non-positive limits
  /// are not enforced.
  pub fn module_limit(&self) -> Option<usize> {
    match self.max_modules {
      Some(n) if n > 0 => Some(n as usize),
      _ => None,
    }
  }
}

/// An issued license as listed by the control endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
  pub id: i64,
  pub license_key: String,
  #[serde(default)]
  pub client_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issued_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expiry_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_users: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_users: Option<i64>,
  #[serde(default)]
  pub allowed_modules: Vec<String>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub validation_count: Option<i64>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl License {
  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    self.expiry_date.as_deref().and_then(parse_timestamp)
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at().is_some_and(|at| at < now)
  }
}

/// Aggregate numbers from `/admin/dashboard`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
  #[serde(default)]
  pub total_licenses: i64,
  #[serde(default)]
  pub active_licenses: i64,
  #[serde(default)]
  pub expired_licenses: i64,
  #[serde(default)]
  pub recent_validations_24h: i64,
  #[serde(flatten)]
  pub extra: Extra,
}

/// Module catalog numbers from `/admin/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
  #[serde(default)]
  pub total_modules: i64,
  #[serde(default)]
  pub total_licenses: i64,
  #[serde(default)]
  pub active_licenses: i64,
  #[serde(default)]
  pub core_modules: i64,
  #[serde(default)]
  pub custom_modules: i64,
  #[serde(default)]
  pub modules_by_category: Map<String, Value>,
  #[serde(default)]
  pub categories: Vec<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

/// Best-effort machine description sent with license requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
  pub mac_address: String,
  pub processor_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub motherboard_serial: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub disk_serial: Option<String>,
  pub os_info: String,
  pub hostname: String,
}

/// Body of `POST /license/request`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseRequest {
  pub client_name: String,
  pub client_email: String,
  pub license_type: String,
  pub hardware_info: HardwareInfo,
  pub requested_modules: Vec<String>,
}

/// Body of `POST /license/validate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
  pub license_key: String,
  pub module_name: String,
  pub hardware_info: HardwareInfo,
  pub user_count: u32,
}

/// Response of `POST /license/request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedLicense {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub license_key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_users: Option<i64>,
  #[serde(default)]
  pub allowed_modules: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

/// Response of `POST /license/validate`.
///
/// `valid: false` is an ordinary answer carrying `error`, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
  pub valid: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_key: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub module_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expires_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_users: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_users: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub allowed_modules: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl ValidationResult {
  /// One-line explanation suitable for a notification
  pub fn summary(&self) -> String {
    if self.valid {
      self
        .message
        .clone()
        .unwrap_or_else(|| "License is valid".to_string())
    } else {
      self
        .error
        .clone()
        .or_else(|| self.message.clone())
        .unwrap_or_else(|| "License is not valid".to_string())
    }
  }
}

/// Response of `GET /license/info/{key}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
  pub license_key: String,
  #[serde(default)]
  pub client_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issued_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expiry_date: Option<String>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_users: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current_users: Option<i64>,
  #[serde(default)]
  pub allowed_modules: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_validation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub total_validations: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recent_validations: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub days_remaining: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

/// Generic `{success, message, ...}` mutation answer.
///
/// Endpoint-specific fields (`is_active` for toggles, `remaining_modules` for
/// block-module, `new_expiry_date` for renewals) are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_key: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remaining_modules: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new_expiry_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub days_added: Option<i64>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl MutationResponse {
  /// Message to show the operator, falling back to `default`
  pub fn message_or(&self, default: &str) -> String {
    self
      .message
      .clone()
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| default.to_string())
  }
}

/// A purchase record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  #[serde(default)]
  pub license_key: String,
  #[serde(default)]
  pub client_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(default)]
  pub modules: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

/// Response of `GET /admin/purchases`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Purchases {
  #[serde(default)]
  pub purchases: Vec<Purchase>,
  #[serde(default)]
  pub total_purchases: i64,
  #[serde(default)]
  pub total_licenses_generated: i64,
}

/// Response of `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
  #[serde(default)]
  pub status: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

impl Health {
  pub fn is_ok(&self) -> bool {
    self.status.eq_ignore_ascii_case("ok") || self.status.eq_ignore_ascii_case("healthy")
  }
}

/// Module fields sent on create/update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDraft {
  pub name: String,
  pub display_name: String,
  pub description: String,
  pub category: String,
  pub min_license_level: String,
  pub license_prefix: String,
  pub author: String,
  pub version: String,
  pub is_core: bool,
}

/// License-type fields sent on create/update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseTypeDraft {
  pub name: String,
  pub description: String,
  pub max_users: i64,
  pub max_modules: i64,
  pub duration_days: i64,
  pub price: f64,
  pub features: Value,
}

/// Envelope of `/admin/modules`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminModules {
  #[serde(default)]
  pub modules: Vec<Module>,
  #[serde(default)]
  pub categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatsEnvelope<T> {
  #[serde(default)]
  pub stats: T,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LicensesEnvelope {
  #[serde(default)]
  pub licenses: Vec<License>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LicenseTypesEnvelope {
  #[serde(default)]
  pub license_types: Vec<LicenseType>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CategoriesEnvelope {
  #[serde(default)]
  pub categories: Vec<String>,
}

/// Parse the server's timestamps: RFC 3339, or naive ISO-8601 taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .ok()
    .map(|naive| naive.and_utc())
}

/// Date part of a server timestamp for display
pub fn display_date(s: Option<&str>) -> String {
  match s.and_then(parse_timestamp) {
    Some(dt) => dt.format("%Y-%m-%d").to_string(),
    None => s.unwrap_or("-").to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use serde_json::json;

  #[test]
  fn test_module_keeps_unknown_fields() {
    let raw = json!({
      "id": 7,
      "name": "lab",
      "display_name": "Laboratory",
      "category": "clinical",
      "is_core": false,
      "app_store": true,
      "created_at": null
    });
    let module: Module = serde_json::from_value(raw.clone()).unwrap();

    assert_eq!(module.label(), "Laboratory");
    assert_eq!(module.extra.get("app_store"), Some(&json!(true)));
    assert_eq!(serde_json::to_value(&module).unwrap(), raw);
  }

  #[test]
  fn test_public_module_round_trips_without_admin_fields() {
    let raw = json!({"name": "base", "version": "18.0.1.0.0", "is_core": true});
    let module: Module = serde_json::from_value(raw.clone()).unwrap();
    assert!(module.is_core());
    assert_eq!(serde_json::to_value(&module).unwrap(), raw);
  }

  #[test]
  fn test_license_type_module_limit() {
    let unlimited: LicenseType =
      serde_json::from_value(json!({"name": "enterprise", "max_modules": -1})).unwrap();
    let limited: LicenseType =
      serde_json::from_value(json!({"name": "basic", "max_modules": 3})).unwrap();
    let unspecified: LicenseType = serde_json::from_value(json!({"name": "trial"})).unwrap();

    assert_eq!(unlimited.module_limit(), None);
    assert_eq!(limited.module_limit(), Some(3));
    assert_eq!(unspecified.module_limit(), None);
  }

  #[test]
  fn test_license_expiry() {
    let license: License = serde_json::from_value(json!({
      "id": 1,
      "license_key": "ABC-1234-5678-9012",
      "client_name": "Clinic",
      "expiry_date": "2025-06-01T12:00:00.123456",
      "is_active": true,
      "allowed_modules": ["base"]
    }))
    .unwrap();

    let before = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
    assert!(!license.is_expired(before));
    assert!(license.is_expired(after));
  }

  #[test]
  fn test_validation_result_rejection() {
    let result: ValidationResult = serde_json::from_value(json!({
      "valid": false,
      "error": "Module not allowed",
      "message": "Validation failed"
    }))
    .unwrap();
    assert!(!result.valid);
    assert_eq!(result.summary(), "Module not allowed");
  }

  #[test]
  fn test_parse_timestamp_formats() {
    assert!(parse_timestamp("2025-01-02T03:04:05").is_some());
    assert!(parse_timestamp("2025-01-02T03:04:05.5+00:00").is_some());
    assert!(parse_timestamp("yesterday").is_none());
    assert_eq!(display_date(Some("2025-01-02T03:04:05")), "2025-01-02");
    assert_eq!(display_date(None), "-");
  }

  #[test]
  fn test_mutation_message_fallback() {
    let resp = MutationResponse {
      success: true,
      ..Default::default()
    };
    assert_eq!(resp.message_or("Done"), "Done");
  }
}
