//! Issued-license control: stats, filtering and confirmed mutations.

use crate::api::ApiError;
use crate::license::types::{DashboardStats, License, MutationResponse};
use crate::license::LicenseApi;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlData {
  pub stats: DashboardStats,
  pub licenses: Vec<License>,
}

pub async fn load_control(api: &dyn LicenseApi) -> Result<ControlData, ApiError> {
  let (stats, licenses) = futures::try_join!(api.dashboard_stats(), api.licenses())?;
  Ok(ControlData { stats, licenses })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
  Active,
  Inactive,
  Expired,
}

impl LicenseStatus {
  /// Inactive wins over expired
  pub fn of(license: &License, now: DateTime<Utc>) -> Self {
    if !license.is_active {
      LicenseStatus::Inactive
    } else if license.is_expired(now) {
      LicenseStatus::Expired
    } else {
      LicenseStatus::Active
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      LicenseStatus::Active => "Active",
      LicenseStatus::Inactive => "Inactive",
      LicenseStatus::Expired => "Expired",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
  #[default]
  All,
  Active,
  Inactive,
  Expired,
}

impl StatusFilter {
  pub fn matches(&self, license: &License, now: DateTime<Utc>) -> bool {
    match self {
      StatusFilter::All => true,
      StatusFilter::Active => license.is_active && !license.is_expired(now),
      StatusFilter::Inactive => !license.is_active,
      StatusFilter::Expired => license.is_expired(now),
    }
  }

  pub fn next(&self) -> Self {
    match self {
      StatusFilter::All => StatusFilter::Active,
      StatusFilter::Active => StatusFilter::Inactive,
      StatusFilter::Inactive => StatusFilter::Expired,
      StatusFilter::Expired => StatusFilter::All,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      StatusFilter::All => "all",
      StatusFilter::Active => "active",
      StatusFilter::Inactive => "inactive",
      StatusFilter::Expired => "expired",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseFilter {
  pub search: String,
  pub license_type: Option<String>,
  pub status: StatusFilter,
}

impl LicenseFilter {
  pub fn matches(&self, license: &License, now: DateTime<Utc>) -> bool {
    let term = self.search.trim().to_lowercase();
    let matches_search = term.is_empty()
      || license.client_name.to_lowercase().contains(&term)
      || license
        .client_email
        .as_deref()
        .is_some_and(|e| e.to_lowercase().contains(&term))
      || license.license_key.to_lowercase().contains(&term);

    let matches_type = match &self.license_type {
      Some(wanted) => license.license_type.as_deref() == Some(wanted.as_str()),
      None => true,
    };

    matches_search && matches_type && self.status.matches(license, now)
  }

  pub fn is_active(&self) -> bool {
    !self.search.trim().is_empty() || self.license_type.is_some() || self.status != StatusFilter::All
  }
}

/// The loaded license list plus the operator's filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseBook {
  licenses: Vec<License>,
  pub filter: LicenseFilter,
}

impl LicenseBook {
  pub fn new(licenses: Vec<License>) -> Self {
    Self {
      licenses,
      filter: LicenseFilter::default(),
    }
  }

  /// Replace the list, keeping the filter
  pub fn replace(&mut self, licenses: Vec<License>) {
    self.licenses = licenses;
  }

  pub fn all(&self) -> &[License] {
    &self.licenses
  }

  pub fn visible(&self, now: DateTime<Utc>) -> Vec<&License> {
    self
      .licenses
      .iter()
      .filter(|l| self.filter.matches(l, now))
      .collect()
  }

  pub fn get(&self, license_id: i64) -> Option<&License> {
    self.licenses.iter().find(|l| l.id == license_id)
  }

  /// Distinct license types present in the list
  pub fn license_types(&self) -> Vec<String> {
    self
      .licenses
      .iter()
      .filter_map(|l| l.license_type.clone())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  /// Step the type filter through none and each present type
  pub fn cycle_type_filter(&mut self) {
    let types = self.license_types();
    self.filter.license_type = match &self.filter.license_type {
      None => types.first().cloned(),
      Some(current) => types
        .iter()
        .position(|t| t == current)
        .and_then(|i| types.get(i + 1))
        .cloned(),
    };
  }

  /// Flip the local active flag after a confirmed toggle.
  ///
  /// Does nothing unless the server reported success. Prefers the server's
  /// `is_active` when it sends one.
  pub fn apply_toggle(&mut self, license_id: i64, response: &MutationResponse) -> bool {
    if !response.success {
      return false;
    }
    match self.licenses.iter_mut().find(|l| l.id == license_id) {
      Some(license) => {
        license.is_active = response.is_active.unwrap_or(!license.is_active);
        debug!(license_id, is_active = license.is_active, "applied toggle");
        true
      }
      None => false,
    }
  }

  /// Replace the allow-list with the server's remaining modules after a block
  pub fn apply_block(&mut self, license_id: i64, response: &MutationResponse) -> bool {
    if !response.success {
      return false;
    }
    let Some(remaining) = response.remaining_modules.clone() else {
      return false;
    };
    match self.licenses.iter_mut().find(|l| l.id == license_id) {
      Some(license) => {
        license.allowed_modules = remaining;
        true
      }
      None => false,
    }
  }
}

/// Question asked before toggling
pub fn toggle_prompt(license: &License) -> String {
  if license.is_active {
    format!(
      "Deactivate license for {}? The client loses access to all modules.",
      license.client_name
    )
  } else {
    format!("Activate license for {}?", license.client_name)
  }
}

pub fn block_prompt(module_name: &str, license: &License) -> String {
  format!("Block module '{}' for {}?", module_name, license.client_name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::fake::FakeApi;
  use chrono::TimeZone;
  use serde_json::json;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
  }

  fn licenses() -> Vec<License> {
    serde_json::from_value(json!([
      {"id": 42, "license_key": "ABC-1111-2222-3333", "client_name": "Clinica Norte",
       "client_email": "it@norte.example", "license_type": "basic",
       "expiry_date": "2026-01-01T00:00:00", "is_active": true,
       "allowed_modules": ["base", "lab"]},
      {"id": 43, "license_key": "XYZ-4444-5555-6666", "client_name": "Farmacia Sur",
       "license_type": "enterprise", "expiry_date": "2025-01-01T00:00:00",
       "is_active": true, "allowed_modules": ["base"]},
      {"id": 44, "license_key": "QRS-7777-8888-9999", "client_name": "Old Client",
       "license_type": "basic", "expiry_date": "2024-01-01T00:00:00",
       "is_active": false, "allowed_modules": []}
    ]))
    .unwrap()
  }

  fn ids(book: &LicenseBook) -> Vec<i64> {
    book.visible(now()).iter().map(|l| l.id).collect()
  }

  #[test]
  fn test_status() {
    let list = licenses();
    assert_eq!(LicenseStatus::of(&list[0], now()), LicenseStatus::Active);
    assert_eq!(LicenseStatus::of(&list[1], now()), LicenseStatus::Expired);
    assert_eq!(LicenseStatus::of(&list[2], now()), LicenseStatus::Inactive);
  }

  #[test]
  fn test_filters() {
    let mut book = LicenseBook::new(licenses());
    assert_eq!(ids(&book), vec![42, 43, 44]);

    book.filter.search = "NORTE".into();
    assert_eq!(ids(&book), vec![42]);

    book.filter.search = "xyz-".into();
    assert_eq!(ids(&book), vec![43]);

    book.filter.search.clear();
    book.filter.status = StatusFilter::Active;
    assert_eq!(ids(&book), vec![42]);
    book.filter.status = StatusFilter::Expired;
    assert_eq!(ids(&book), vec![43, 44]);
    book.filter.status = StatusFilter::Inactive;
    assert_eq!(ids(&book), vec![44]);

    book.filter.status = StatusFilter::All;
    book.filter.license_type = Some("basic".into());
    assert_eq!(ids(&book), vec![42, 44]);
  }

  #[test]
  fn test_cycle_type_filter() {
    let mut book = LicenseBook::new(licenses());
    book.cycle_type_filter();
    assert_eq!(book.filter.license_type.as_deref(), Some("basic"));
    book.cycle_type_filter();
    assert_eq!(book.filter.license_type.as_deref(), Some("enterprise"));
    book.cycle_type_filter();
    assert_eq!(book.filter.license_type, None);
  }

  #[tokio::test]
  async fn test_toggle_active_license() {
    let api = FakeApi::new().reply(
      "toggle_license",
      json!({"success": true, "message": "License deactivated"}),
    );
    let mut book = LicenseBook::new(licenses());

    let response = api.toggle_license(42).await.unwrap();
    assert!(book.apply_toggle(42, &response));

    assert_eq!(api.calls(), vec!["toggle_license 42"]);
    assert!(!book.get(42).unwrap().is_active);
    assert_eq!(LicenseStatus::of(book.get(42).unwrap(), now()), LicenseStatus::Inactive);
  }

  #[test]
  fn test_toggle_without_success_changes_nothing() {
    let mut book = LicenseBook::new(licenses());
    let response = MutationResponse {
      success: false,
      ..Default::default()
    };
    assert!(!book.apply_toggle(42, &response));
    assert!(book.get(42).unwrap().is_active);
  }

  #[test]
  fn test_toggle_prefers_server_flag() {
    let mut book = LicenseBook::new(licenses());
    let response = MutationResponse {
      success: true,
      is_active: Some(true),
      ..Default::default()
    };
    book.apply_toggle(44, &response);
    assert!(book.get(44).unwrap().is_active);
  }

  #[test]
  fn test_apply_block() {
    let mut book = LicenseBook::new(licenses());
    let response = MutationResponse {
      success: true,
      remaining_modules: Some(vec!["base".into()]),
      ..Default::default()
    };
    assert!(book.apply_block(42, &response));
    assert_eq!(book.get(42).unwrap().allowed_modules, vec!["base"]);
    assert!(!book.apply_block(99, &response));
  }

  #[tokio::test]
  async fn test_load_control() {
    let api = FakeApi::new()
      .reply("dashboard_stats", json!({"total_licenses": 3, "active_licenses": 2}))
      .reply("licenses", json!([]));
    let data = load_control(&api).await.unwrap();
    assert_eq!(data.stats.total_licenses, 3);
    assert!(data.licenses.is_empty());
  }

  #[test]
  fn test_prompts() {
    let list = licenses();
    assert!(toggle_prompt(&list[0]).starts_with("Deactivate"));
    assert!(toggle_prompt(&list[2]).starts_with("Activate"));
    assert_eq!(
      block_prompt("lab", &list[0]),
      "Block module 'lab' for Clinica Norte?"
    );
  }
}
