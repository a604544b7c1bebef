//! Module catalog and license-type administration.

use super::FormError;
use crate::api::ApiError;
use crate::license::types::{AdminStats, LicenseType, LicenseTypeDraft, Module, ModuleDraft};
use crate::license::LicenseApi;
use serde_json::json;

pub const DEFAULT_LICENSE_PREFIX: &str = "PDN";
pub const DEFAULT_MODULE_VERSION: &str = "18.0.1.0.0";
pub const DEFAULT_MIN_LICENSE_LEVEL: &str = "standard";
pub const DEFAULT_AUTHOR: &str = "Unknown";
const PREFIX_MAX_LEN: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminCatalog {
  pub modules: Vec<Module>,
  pub categories: Vec<String>,
  pub stats: AdminStats,
}

pub async fn load_catalog(api: &dyn LicenseApi) -> Result<AdminCatalog, ApiError> {
  let (listing, stats) = futures::try_join!(api.admin_modules(), api.admin_stats())?;
  let mut categories = listing.categories;
  if categories.is_empty() {
    categories = stats.categories.clone();
  }
  Ok(AdminCatalog {
    modules: listing.modules,
    categories,
    stats,
  })
}

pub async fn load_license_types(api: &dyn LicenseApi) -> Result<Vec<LicenseType>, ApiError> {
  api.admin_license_types().await
}

/// Case-insensitive match over name, label, description, category and author
pub fn filter_modules<'a>(modules: &'a [Module], term: &str) -> Vec<&'a Module> {
  let term = term.trim().to_lowercase();
  if term.is_empty() {
    return modules.iter().collect();
  }

  let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&term));
  modules
    .iter()
    .filter(|m| {
      hit(Some(m.name.as_str()))
        || hit(m.display_name.as_deref())
        || hit(m.description.as_deref())
        || hit(m.category.as_deref())
        || hit(m.author.as_deref())
    })
    .collect()
}

/// Drop a deleted module from the local list
pub fn remove_module(modules: &mut Vec<Module>, module_id: i64) -> bool {
  let before = modules.len();
  modules.retain(|m| m.id != Some(module_id));
  before != modules.len()
}

pub fn remove_license_type(types: &mut Vec<LicenseType>, type_id: i64) -> bool {
  let before = types.len();
  types.retain(|t| t.id != Some(type_id));
  before != types.len()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleForm {
  pub name: String,
  pub display_name: String,
  pub description: String,
  pub category: String,
  pub min_license_level: String,
  pub license_prefix: String,
  pub author: String,
  pub version: String,
}

impl Default for ModuleForm {
  fn default() -> Self {
    Self {
      name: String::new(),
      display_name: String::new(),
      description: String::new(),
      category: String::new(),
      min_license_level: DEFAULT_MIN_LICENSE_LEVEL.to_string(),
      license_prefix: DEFAULT_LICENSE_PREFIX.to_string(),
      author: String::new(),
      version: DEFAULT_MODULE_VERSION.to_string(),
    }
  }
}

impl ModuleForm {
  /// Pre-filled from an existing module
  pub fn for_edit(module: &Module) -> Self {
    let prefix = module
      .extra
      .get("license_prefix")
      .and_then(|v| v.as_str())
      .unwrap_or(DEFAULT_LICENSE_PREFIX);

    Self {
      name: module.name.clone(),
      display_name: module.label().to_string(),
      description: module.description.clone().unwrap_or_default(),
      category: module.category.clone().unwrap_or_default(),
      min_license_level: module
        .min_license_level
        .clone()
        .unwrap_or_else(|| DEFAULT_MIN_LICENSE_LEVEL.to_string()),
      license_prefix: prefix.to_string(),
      author: module.author.clone().unwrap_or_default(),
      version: module
        .version
        .clone()
        .unwrap_or_else(|| DEFAULT_MODULE_VERSION.to_string()),
    }
  }

  /// Validate for creation; the name must not already exist
  pub fn validate_new(&self, existing: &[Module]) -> Result<ModuleDraft, FormError> {
    let draft = self.validate()?;
    if existing.iter().any(|m| m.name == draft.name) {
      return Err(FormError::DuplicateModule(draft.name));
    }
    Ok(draft)
  }

  /// Validate an edit of `module_id`; renaming onto another module is rejected
  pub fn validate_edit(&self, existing: &[Module], module_id: i64) -> Result<ModuleDraft, FormError> {
    let draft = self.validate()?;
    if existing
      .iter()
      .any(|m| m.name == draft.name && m.id != Some(module_id))
    {
      return Err(FormError::DuplicateModule(draft.name));
    }
    Ok(draft)
  }

  fn validate(&self) -> Result<ModuleDraft, FormError> {
    let required = |value: &str, field: &'static str| {
      let value = value.trim();
      if value.is_empty() {
        Err(FormError::MissingField(field))
      } else {
        Ok(value.to_string())
      }
    };

    let name = required(&self.name, "Technical name")?;
    let display_name = required(&self.display_name, "Display name")?;
    let category = required(&self.category, "Category")?;

    Ok(ModuleDraft {
      name,
      display_name,
      description: self.description.trim().to_string(),
      category,
      min_license_level: or_default(&self.min_license_level, DEFAULT_MIN_LICENSE_LEVEL),
      license_prefix: normalize_prefix(&self.license_prefix),
      author: or_default(&self.author, DEFAULT_AUTHOR),
      version: or_default(&self.version, DEFAULT_MODULE_VERSION),
      is_core: false,
    })
  }
}

/// Uppercased, at most five characters, `PDN` when blank
pub fn normalize_prefix(raw: &str) -> String {
  let prefix: String = raw.trim().to_uppercase().chars().take(PREFIX_MAX_LEN).collect();
  if prefix.is_empty() {
    DEFAULT_LICENSE_PREFIX.to_string()
  } else {
    prefix
  }
}

fn or_default(value: &str, default: &str) -> String {
  let value = value.trim();
  if value.is_empty() {
    default.to_string()
  } else {
    value.to_string()
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseTypeForm {
  pub name: String,
  pub description: String,
  pub max_users: String,
  pub max_modules: String,
  pub duration_days: String,
  pub price: String,
}

impl LicenseTypeForm {
  pub fn for_edit(license_type: &LicenseType) -> Self {
    let number = |n: Option<i64>| n.map(|n| n.to_string()).unwrap_or_default();
    Self {
      name: license_type.name.clone(),
      description: license_type.description.clone().unwrap_or_default(),
      max_users: number(license_type.max_users),
      max_modules: number(license_type.max_modules),
      duration_days: number(license_type.duration_days),
      price: license_type.price.map(|p| p.to_string()).unwrap_or_default(),
    }
  }

  /// Blank `max_modules` means unlimited (-1) and blank `price` means free.
  pub fn validate(&self) -> Result<LicenseTypeDraft, FormError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(FormError::MissingField("Name"));
    }

    Ok(LicenseTypeDraft {
      name: name.to_string(),
      description: self.description.trim().to_string(),
      max_users: parse_required(&self.max_users, "Max users")?,
      max_modules: parse_optional(&self.max_modules, "Max modules")?.unwrap_or(-1),
      duration_days: parse_required(&self.duration_days, "Duration days")?,
      price: match self.price.trim() {
        "" => 0.0,
        raw => raw.parse::<f64>().map_err(|_| FormError::InvalidNumber {
          field: "Price",
          value: raw.to_string(),
        })?,
      },
      features: json!({}),
    })
  }
}

fn parse_optional(raw: &str, field: &'static str) -> Result<Option<i64>, FormError> {
  match raw.trim() {
    "" => Ok(None),
    raw => raw
      .parse::<i64>()
      .map(Some)
      .map_err(|_| FormError::InvalidNumber {
        field,
        value: raw.to_string(),
      }),
  }
}

fn parse_required(raw: &str, field: &'static str) -> Result<i64, FormError> {
  parse_optional(raw, field)?.ok_or(FormError::MissingField(field))
}

pub fn describe_duration(days: Option<i64>) -> String {
  match days {
    Some(-1) => "Permanent".to_string(),
    Some(365) => "1 year".to_string(),
    Some(30) => "1 month".to_string(),
    Some(n) => format!("{} days", n),
    None => "-".to_string(),
  }
}

pub fn describe_price(price: Option<f64>) -> String {
  match price {
    Some(p) if p > 0.0 => format!("${:.2}", p),
    _ => "Free".to_string(),
  }
}

pub fn describe_module_limit(max_modules: Option<i64>) -> String {
  match max_modules {
    Some(n) if n > 0 => n.to_string(),
    _ => "Unlimited".to_string(),
  }
}
