//! Dashboard data: catalog counts and server liveness.

use crate::api::ApiError;
use crate::license::LicenseApi;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Console version shown on the dashboard
pub const CONSOLE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
  Online,
  Offline,
}

impl SystemStatus {
  pub fn label(&self) -> &'static str {
    match self {
      SystemStatus::Online => "Online",
      SystemStatus::Offline => "Offline",
    }
  }
}

/// How quickly the server answered the dashboard load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSpeed {
  Fast,
  Moderate,
  Slow,
}

impl ResponseSpeed {
  pub fn classify(elapsed: Duration) -> Self {
    match elapsed.as_millis() {
      0..=99 => ResponseSpeed::Fast,
      100..=499 => ResponseSpeed::Moderate,
      _ => ResponseSpeed::Slow,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
  pub module_count: usize,
  pub categories: Vec<String>,
  pub license_type_count: usize,
  pub license_type_names: Vec<String>,
  pub status: SystemStatus,
  pub server_time: Option<String>,
  pub response_time: Duration,
}

/// Load the three dashboard sources concurrently.
///
/// A failing health check degrades to `Offline`. A failing module or
/// license-type fetch fails the whole load so the view shows an error rather
/// than zero counts.
pub async fn load_dashboard(api: &dyn LicenseApi) -> Result<DashboardSnapshot, ApiError> {
  let started = Instant::now();
  let (health, modules, types) = futures::join!(api.health(), api.modules(), api.license_types());
  let response_time = started.elapsed();

  let (status, server_time) = match health {
    Ok(health) if health.is_ok() => (SystemStatus::Online, health.timestamp),
    Ok(health) => {
      warn!(status = %health.status, "server reported unhealthy");
      (SystemStatus::Offline, health.timestamp)
    }
    Err(e) => {
      warn!(error = %e, "health check failed");
      (SystemStatus::Offline, None)
    }
  };

  let modules = modules?;
  let types = types?;

  let categories: BTreeSet<String> = modules
    .iter()
    .map(|m| m.category.clone().unwrap_or_else(|| "unknown".to_string()))
    .collect();

  debug!(
    modules = modules.len(),
    license_types = types.len(),
    elapsed_ms = response_time.as_millis() as u64,
    "dashboard loaded"
  );

  Ok(DashboardSnapshot {
    module_count: modules.len(),
    categories: categories.into_iter().collect(),
    license_type_count: types.len(),
    license_type_names: types.into_iter().map(|t| t.name).collect(),
    status,
    server_time,
    response_time,
  })
}

/// `"{h}h {m}m"`
pub fn format_uptime(elapsed: chrono::Duration) -> String {
  let minutes = elapsed.num_minutes().max(0);
  format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::fake::FakeApi;
  use serde_json::json;

  fn catalog() -> FakeApi {
    FakeApi::new()
      .reply(
        "modules",
        json!([
          {"name": "base", "category": "core"},
          {"name": "lab", "category": "clinical"},
          {"name": "pharmacy", "category": "clinical"},
          {"name": "misc"}
        ]),
      )
      .reply(
        "license_types",
        json!([{"name": "basic"}, {"name": "enterprise"}]),
      )
  }

  #[tokio::test]
  async fn test_snapshot_counts() {
    let api = catalog().reply("health", json!({"status": "healthy", "timestamp": "2025-01-01T00:00:00"}));
    let snapshot = load_dashboard(&api).await.unwrap();

    assert_eq!(snapshot.module_count, 4);
    assert_eq!(snapshot.categories, vec!["clinical", "core", "unknown"]);
    assert_eq!(snapshot.license_type_count, 2);
    assert_eq!(snapshot.license_type_names, vec!["basic", "enterprise"]);
    assert_eq!(snapshot.status, SystemStatus::Online);
    assert_eq!(snapshot.server_time.as_deref(), Some("2025-01-01T00:00:00"));
  }

  #[tokio::test]
  async fn test_health_failure_is_offline() {
    let api = catalog().fail("health", 503, "maintenance");
    let snapshot = load_dashboard(&api).await.unwrap();
    assert_eq!(snapshot.status, SystemStatus::Offline);
    assert_eq!(snapshot.module_count, 4);
  }

  #[tokio::test]
  async fn test_module_failure_fails_load() {
    let api = FakeApi::new()
      .reply("health", json!({"status": "ok"}))
      .fail("modules", 500, "database unavailable")
      .reply("license_types", json!([]));

    let err = load_dashboard(&api).await.unwrap_err();
    assert_eq!(err.to_string(), "500: database unavailable");
  }

  #[test]
  fn test_response_speed() {
    assert_eq!(ResponseSpeed::classify(Duration::from_millis(40)), ResponseSpeed::Fast);
    assert_eq!(ResponseSpeed::classify(Duration::from_millis(100)), ResponseSpeed::Moderate);
    assert_eq!(ResponseSpeed::classify(Duration::from_millis(900)), ResponseSpeed::Slow);
  }

  #[test]
  fn test_format_uptime() {
    assert_eq!(format_uptime(chrono::Duration::minutes(0)), "0h 0m");
    assert_eq!(format_uptime(chrono::Duration::minutes(135)), "2h 15m");
    assert_eq!(format_uptime(chrono::Duration::seconds(-5)), "0h 0m");
  }
}
