//! Data side of each tab: fetching, form validation and list state.
//!
//! Nothing in here draws; the views in `ui::views` own rendering and call
//! into these types.

pub mod control_panel;
pub mod dashboard;
pub mod generator;
pub mod module_admin;
pub mod validator;

/// A form that cannot be submitted yet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
  #[error("Client name is required")]
  MissingClientName,
  #[error("Client email is required")]
  MissingEmail,
  #[error("'{0}' is not a valid email address")]
  InvalidEmail(String),
  #[error("Select a license type")]
  MissingLicenseType,
  #[error("Unknown license type '{0}'")]
  UnknownLicenseType(String),
  #[error("Select at least one module")]
  NoModules,
  #[error("License type '{license_type}' allows at most {max} modules, {selected} selected")]
  TooManyModules {
    license_type: String,
    max: usize,
    selected: usize,
  },
  #[error("Detect the client hardware first")]
  MissingHardware,
  #[error("License key is required")]
  MissingLicenseKey,
  #[error("Select a module")]
  MissingModule,
  #[error("User count must be at least 1")]
  InvalidUserCount,
  #[error("{0} is required")]
  MissingField(&'static str),
  #[error("{field} must be a number, got '{value}'")]
  InvalidNumber { field: &'static str, value: String },
  #[error("A module named '{0}' already exists")]
  DuplicateModule(String),
}

/// Loose shape check: one `@`, something before it, a dotted domain after it.
pub fn looks_like_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.contains('@')
        && domain
          .split_once('.')
          .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty() && !rest.ends_with('.'))
    }
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_looks_like_email() {
    assert!(looks_like_email("admin@clinic.example"));
    assert!(looks_like_email("a.b@c.co.uk"));
    assert!(!looks_like_email("admin"));
    assert!(!looks_like_email("@clinic.com"));
    assert!(!looks_like_email("admin@clinic"));
    assert!(!looks_like_email("admin@.com"));
    assert!(!looks_like_email("ad min@clinic.com"));
    assert!(!looks_like_email("a@b@clinic.com"));
  }

  #[test]
  fn test_too_many_modules_message() {
    let err = FormError::TooManyModules {
      license_type: "basic".into(),
      max: 3,
      selected: 5,
    };
    assert_eq!(
      err.to_string(),
      "License type 'basic' allows at most 3 modules, 5 selected"
    );
  }
}
