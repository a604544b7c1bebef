//! License validation form, lookups and the local validation history.

use super::FormError;
use crate::license::types::{HardwareInfo, ValidationRequest, ValidationResult};
use crate::storage::{keys, KvStore};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// Most recent validations kept
pub const HISTORY_LIMIT: usize = 10;

/// Days added by a renewal unless the operator picks otherwise
pub const DEFAULT_RENEWAL_DAYS: u32 = 365;

const KEY_GROUPS: [usize; 4] = [3, 4, 4, 4];

/// Normalize typed input to `XXX-XXXX-XXXX-XXXX`.
///
/// Keeps ASCII letters and digits only, uppercased, up to 15 of them, and
/// inserts dashes between the groups that have started.
pub fn format_license_key(input: &str) -> String {
  let chars: Vec<char> = input
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_uppercase())
    .take(KEY_GROUPS.iter().sum())
    .collect();

  let mut groups = Vec::new();
  let mut rest = chars.as_slice();
  for len in KEY_GROUPS {
    if rest.is_empty() {
      break;
    }
    let (group, tail) = rest.split_at(len.min(rest.len()));
    groups.push(group.iter().collect::<String>());
    rest = tail;
  }
  groups.join("-")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationForm {
  pub license_key: String,
  pub module_name: Option<String>,
  pub user_count: String,
}

impl Default for ValidationForm {
  fn default() -> Self {
    Self {
      license_key: String::new(),
      module_name: None,
      user_count: "1".to_string(),
    }
  }
}

impl ValidationForm {
  pub fn set_license_key(&mut self, raw: &str) {
    self.license_key = format_license_key(raw);
  }

  pub fn validate(&self, hardware_info: HardwareInfo) -> Result<ValidationRequest, FormError> {
    let license_key = self.license_key.trim();
    if license_key.is_empty() {
      return Err(FormError::MissingLicenseKey);
    }

    let module_name = match self.module_name.as_deref() {
      Some(m) if !m.is_empty() => m,
      _ => return Err(FormError::MissingModule),
    };

    let user_count = match self.user_count.trim().parse::<u32>() {
      Ok(n) if n >= 1 => n,
      _ => return Err(FormError::InvalidUserCount),
    };

    Ok(ValidationRequest {
      license_key: license_key.to_string(),
      module_name: module_name.to_string(),
      hardware_info,
      user_count,
    })
  }
}

/// Renewal length typed by the operator; empty means the default
pub fn parse_renewal_days(raw: &str) -> Result<u32, FormError> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(DEFAULT_RENEWAL_DAYS);
  }
  match raw.parse::<u32>() {
    Ok(days) if days > 0 => Ok(days),
    _ => Err(FormError::InvalidNumber {
      field: "Renewal days",
      value: raw.to_string(),
    }),
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub timestamp: DateTime<Utc>,
  pub license_key: String,
  pub module_name: String,
  pub result: ValidationResult,
}

/// Newest-first list of past validations persisted in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationHistory {
  entries: Vec<HistoryEntry>,
}

impl ValidationHistory {
  pub fn load(store: &KvStore) -> Result<Self> {
    let mut entries: Vec<HistoryEntry> = store.get(keys::VALIDATION_HISTORY)?.unwrap_or_default();
    entries.truncate(HISTORY_LIMIT);
    Ok(Self { entries })
  }

  pub fn save(&self, store: &KvStore) -> Result<()> {
    store.set(keys::VALIDATION_HISTORY, &self.entries)
  }

  /// Empty the list and drop it from the store
  pub fn clear(&mut self, store: &KvStore) -> Result<()> {
    self.entries.clear();
    store.remove(keys::VALIDATION_HISTORY)
  }

  pub fn record(&mut self, entry: HistoryEntry) {
    self.entries.insert(0, entry);
    self.entries.truncate(HISTORY_LIMIT);
  }

  pub fn entries(&self) -> &[HistoryEntry] {
    &self.entries
  }

  pub fn last(&self) -> Option<&HistoryEntry> {
    self.entries.first()
  }
}
