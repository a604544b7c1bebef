//! License generation form.

use super::{looks_like_email, FormError};
use crate::api::ApiError;
use crate::license::types::{HardwareInfo, IssuedLicense, LicenseRequest, LicenseType, Module};
use crate::license::LicenseApi;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};

/// Choices the form offers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorCatalog {
  pub license_types: Vec<LicenseType>,
  pub modules: Vec<Module>,
}

pub async fn load_catalog(api: &dyn LicenseApi) -> Result<GeneratorCatalog, ApiError> {
  let (license_types, modules) = futures::try_join!(api.license_types(), api.modules())?;
  Ok(GeneratorCatalog {
    license_types,
    modules,
  })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseForm {
  pub client_name: String,
  pub client_email: String,
  pub license_type: Option<String>,
  pub modules: Vec<String>,
  pub hardware: Option<HardwareInfo>,
}

impl LicenseForm {
  /// Select or unselect a module, keeping selection order
  pub fn toggle_module(&mut self, name: &str) {
    if let Some(pos) = self.modules.iter().position(|m| m == name) {
      self.modules.remove(pos);
    } else {
      self.modules.push(name.to_string());
    }
  }

  /// Warning for a selection that exceeds the chosen type's limit
  pub fn module_limit_warning(&self, types: &[LicenseType]) -> Option<FormError> {
    let name = self.license_type.as_deref()?;
    let license_type = types.iter().find(|t| t.name == name)?;
    let max = license_type.module_limit()?;
    (self.modules.len() > max).then(|| FormError::TooManyModules {
      license_type: license_type.name.clone(),
      max,
      selected: self.modules.len(),
    })
  }

  /// Check the form and build the request. Nothing is sent on error.
  pub fn validate(&self, types: &[LicenseType]) -> Result<LicenseRequest, FormError> {
    let client_name = self.client_name.trim();
    if client_name.is_empty() {
      return Err(FormError::MissingClientName);
    }

    let client_email = self.client_email.trim();
    if client_email.is_empty() {
      return Err(FormError::MissingEmail);
    }
    if !looks_like_email(client_email) {
      return Err(FormError::InvalidEmail(client_email.to_string()));
    }

    let license_type = match self.license_type.as_deref() {
      Some(name) if !name.is_empty() => name,
      _ => return Err(FormError::MissingLicenseType),
    };
    if !types.iter().any(|t| t.name == license_type) {
      return Err(FormError::UnknownLicenseType(license_type.to_string()));
    }

    if self.modules.is_empty() {
      return Err(FormError::NoModules);
    }
    if let Some(warning) = self.module_limit_warning(types) {
      return Err(warning);
    }

    let hardware_info = self.hardware.clone().ok_or(FormError::MissingHardware)?;

    Ok(LicenseRequest {
      client_name: client_name.to_string(),
      client_email: client_email.to_string(),
      license_type: license_type.to_string(),
      hardware_info,
      requested_modules: self.modules.clone(),
    })
  }
}

/// Write an issued license as pretty JSON into `dir`, returning the file path
pub fn export_license(dir: &Path, license: &IssuedLicense) -> Result<PathBuf> {
  let path = dir.join(export_file_name(&license.license_key));
  let body = serde_json::to_string_pretty(license)
    .map_err(|e| eyre!("Failed to encode license: {}", e))?;
  std::fs::write(&path, body)
    .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
  Ok(path)
}

/// The key comes from the server; anything but ASCII letters and digits
/// becomes `_` so the name stays a single path component
fn export_file_name(license_key: &str) -> String {
  let safe: String = license_key
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect();
  format!("license-{}.json", safe)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::fake::FakeApi;
  use serde_json::json;

  fn types() -> Vec<LicenseType> {
    serde_json::from_value(json!([
      {"name": "basic", "max_modules": 2},
      {"name": "enterprise", "max_modules": -1}
    ]))
    .unwrap()
  }

  fn hardware() -> HardwareInfo {
    HardwareInfo {
      mac_address: "AA:BB:CC:DD:EE:FF".into(),
      processor_id: "cpu".into(),
      motherboard_serial: None,
      disk_serial: None,
      os_info: "linux x86_64".into(),
      hostname: "frontdesk".into(),
    }
  }

  fn complete() -> LicenseForm {
    LicenseForm {
      client_name: "  Clinica Norte ".into(),
      client_email: "it@norte.example".into(),
      license_type: Some("basic".into()),
      modules: vec!["base".into(), "lab".into()],
      hardware: Some(hardware()),
    }
  }

  #[test]
  fn test_valid_form_builds_request() {
    let request = complete().validate(&types()).unwrap();
    assert_eq!(request.client_name, "Clinica Norte");
    assert_eq!(request.license_type, "basic");
    assert_eq!(request.requested_modules, vec!["base", "lab"]);
  }

  #[test]
  fn test_required_fields_in_order() {
    let mut form = complete();
    form.client_name = " ".into();
    assert_eq!(form.validate(&types()), Err(FormError::MissingClientName));

    let mut form = complete();
    form.client_email.clear();
    assert_eq!(form.validate(&types()), Err(FormError::MissingEmail));

    let mut form = complete();
    form.client_email = "norte".into();
    assert_eq!(
      form.validate(&types()),
      Err(FormError::InvalidEmail("norte".into()))
    );

    let mut form = complete();
    form.license_type = None;
    assert_eq!(form.validate(&types()), Err(FormError::MissingLicenseType));

    let mut form = complete();
    form.modules.clear();
    assert_eq!(form.validate(&types()), Err(FormError::NoModules));

    let mut form = complete();
    form.hardware = None;
    assert_eq!(form.validate(&types()), Err(FormError::MissingHardware));
  }

  #[test]
  fn test_module_limit() {
    let mut form = complete();
    form.toggle_module("pharmacy");
    assert_eq!(
      form.validate(&types()),
      Err(FormError::TooManyModules {
        license_type: "basic".into(),
        max: 2,
        selected: 3
      })
    );

    form.license_type = Some("enterprise".into());
    assert!(form.validate(&types()).is_ok());
    assert!(form.module_limit_warning(&types()).is_none());
  }

  #[test]
  fn test_toggle_module() {
    let mut form = LicenseForm::default();
    form.toggle_module("lab");
    form.toggle_module("base");
    form.toggle_module("lab");
    assert_eq!(form.modules, vec!["base"]);
  }

  #[tokio::test]
  async fn test_load_catalog() {
    let api = FakeApi::new()
      .reply("license_types", json!([{"name": "basic"}]))
      .reply("modules", json!([{"name": "base"}, {"name": "lab"}]));
    let catalog = load_catalog(&api).await.unwrap();
    assert_eq!(catalog.license_types.len(), 1);
    assert_eq!(catalog.modules.len(), 2);
  }

  #[test]
  fn test_export_license() {
    let dir = tempfile::tempdir().unwrap();
    let license: IssuedLicense = serde_json::from_value(json!({
      "success": true,
      "license_key": "ABC-1234-5678-9012",
      "allowed_modules": ["base"]
    }))
    .unwrap();

    let path = export_license(dir.path(), &license).unwrap();

    assert!(path.ends_with("license-ABC_1234_5678_9012.json"));
    let written: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["license_key"], "ABC-1234-5678-9012");
  }

  #[test]
  fn test_export_keeps_hostile_key_inside_dir() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("downloads");
    std::fs::create_dir_all(dir.join("license-x")).unwrap();
    let license: IssuedLicense = serde_json::from_value(json!({
      "success": true,
      "license_key": "x/../../escaped",
      "allowed_modules": []
    }))
    .unwrap();

    let path = export_license(&dir, &license).unwrap();

    assert_eq!(path, dir.join("license-x_______escaped.json"));
    assert!(path.exists());
    assert!(!root.path().join("escaped.json").exists());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
  }
}
