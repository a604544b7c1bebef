//! Best-effort machine fingerprint sent along with license requests.
//!
//! The values are derived from the hostname, OS and CPU model and hashed into
//! MAC-like and serial-like strings. They are a hint for the server, not an
//! identity: two machines with the same hostname and CPU report the same
//! values, and nothing stops a client from sending arbitrary ones.
//!
//! The CPU model is read from `/proc/cpuinfo` on Linux, `sysctl` on macOS and
//! `PROCESSOR_IDENTIFIER` on Windows. Elsewhere it is "Unknown Processor".

use crate::license::types::HardwareInfo;
use crate::storage::{keys, KvStore};
use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// How long a stored fingerprint is reused
pub fn fingerprint_validity() -> Duration {
  Duration::hours(24)
}

/// Raw facts the fingerprint is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineFacts {
  pub hostname: String,
  pub os: String,
  pub arch: String,
  pub cpu_model: Option<String>,
  pub cpu_count: usize,
}

impl MachineFacts {
  /// Read what the current machine exposes without elevated privileges.
  pub fn detect() -> Self {
    Self {
      hostname: detect_hostname(),
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
      cpu_model: detect_cpu_model(),
      cpu_count: std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1),
    }
  }

  pub fn fingerprint(&self) -> HardwareInfo {
    let cpu = self
      .cpu_model
      .clone()
      .unwrap_or_else(|| "Unknown Processor".to_string());
    let seed = format!("{}|{}|{}|{}", self.hostname, self.os, self.arch, cpu);

    HardwareInfo {
      mac_address: mac_like(&digest(&seed)),
      processor_id: cpu,
      motherboard_serial: Some(format!(
        "MB-{}",
        &digest(&format!("board|{}|{}", seed, self.cpu_count))[..12].to_uppercase()
      )),
      disk_serial: Some(format!(
        "DISK-{}",
        &digest(&format!("disk|{}", seed))[..12].to_uppercase()
      )),
      os_info: format!("{} {}", self.os, self.arch),
      hostname: self.hostname.clone(),
    }
  }
}

/// A fingerprint with its capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFingerprint {
  pub info: HardwareInfo,
  pub captured_at: DateTime<Utc>,
}

impl StoredFingerprint {
  pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
    now - self.captured_at < fingerprint_validity()
  }
}

/// Stored fingerprint if still fresh, otherwise a newly detected one which is
/// written back to the store. `force` always re-detects.
pub fn hardware_info(store: &KvStore, force: bool, now: DateTime<Utc>) -> Result<HardwareInfo> {
  resolve(store, force, now, MachineFacts::detect)
}

fn resolve(
  store: &KvStore,
  force: bool,
  now: DateTime<Utc>,
  detect: impl FnOnce() -> MachineFacts,
) -> Result<HardwareInfo> {
  if !force {
    if let Some(stored) = store.get::<StoredFingerprint>(keys::HARDWARE_INFO)? {
      if stored.is_fresh(now) {
        debug!("reusing stored hardware fingerprint");
        return Ok(stored.info);
      }
    }
  }

  let info = detect().fingerprint();
  store.set(
    keys::HARDWARE_INFO,
    &StoredFingerprint {
      info: info.clone(),
      captured_at: now,
    },
  )?;
  debug!(hostname = %info.hostname, "captured hardware fingerprint");
  Ok(info)
}

fn digest(input: &str) -> String {
  hex::encode(Sha256::digest(input.as_bytes()))
}

/// `AA:BB:CC:DD:EE:FF` from the first six bytes of a hex digest
fn mac_like(hex_digest: &str) -> String {
  hex_digest
    .as_bytes()
    .chunks(2)
    .take(6)
    .map(|pair| String::from_utf8_lossy(pair).to_uppercase())
    .collect::<Vec<_>>()
    .join(":")
}

/// Environment first, then `/etc/hostname` (Linux, BSD), then the
/// `hostname` command (macOS, Windows). "localhost" when all of them fail.
fn detect_hostname() -> String {
  std::env::var("HOSTNAME")
    .ok()
    .or_else(|| std::env::var("COMPUTERNAME").ok())
    .and_then(non_empty)
    .or_else(|| std::fs::read_to_string("/etc/hostname").ok().and_then(non_empty))
    .or_else(|| command_output("hostname", &[]))
    .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(target_os = "linux")]
fn detect_cpu_model() -> Option<String> {
  parse_cpuinfo(&std::fs::read_to_string("/proc/cpuinfo").ok()?)
}

#[cfg(target_os = "macos")]
fn detect_cpu_model() -> Option<String> {
  command_output("sysctl", &["-n", "machdep.cpu.brand_string"])
}

#[cfg(windows)]
fn detect_cpu_model() -> Option<String> {
  std::env::var("PROCESSOR_IDENTIFIER").ok().and_then(non_empty)
}

// Other platforms fingerprint as "Unknown Processor"
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn detect_cpu_model() -> Option<String> {
  None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpuinfo(cpuinfo: &str) -> Option<String> {
  cpuinfo
    .lines()
    .find(|line| line.starts_with("model name"))
    .and_then(|line| line.split_once(':'))
    .and_then(|(_, model)| non_empty(model.to_string()))
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
  let output = std::process::Command::new(program).args(args).output().ok()?;
  if !output.status.success() {
    return None;
  }
  non_empty(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn non_empty(value: String) -> Option<String> {
  let trimmed = value.trim();
  (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn facts() -> MachineFacts {
    MachineFacts {
      hostname: "frontdesk-01".into(),
      os: "linux".into(),
      arch: "x86_64".into(),
      cpu_model: Some("Intel(R) Core(TM) i5-8250U".into()),
      cpu_count: 8,
    }
  }

  #[test]
  fn test_fingerprint_is_stable() {
    assert_eq!(facts().fingerprint(), facts().fingerprint());
  }

  #[test]
  fn test_fingerprint_shape() {
    let info = facts().fingerprint();
    assert_eq!(info.mac_address.len(), 17);
    assert_eq!(info.mac_address.matches(':').count(), 5);
    assert_eq!(info.mac_address, info.mac_address.to_uppercase());
    assert_eq!(info.processor_id, "Intel(R) Core(TM) i5-8250U");
    assert_eq!(info.os_info, "linux x86_64");
    assert!(info.motherboard_serial.unwrap().starts_with("MB-"));
    assert!(info.disk_serial.unwrap().starts_with("DISK-"));
  }

  #[test]
  fn test_parse_cpuinfo_model_name() {
    let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\n\
                   model name\t: Intel(R) Xeon(R) CPU @ 2.20GHz\nflags\t: fpu\n";
    assert_eq!(
      parse_cpuinfo(cpuinfo).as_deref(),
      Some("Intel(R) Xeon(R) CPU @ 2.20GHz")
    );
    assert_eq!(parse_cpuinfo("processor\t: 0\nmodel name\t:   \n"), None);
    assert_eq!(parse_cpuinfo(""), None);
  }

  #[test]
  fn test_detected_hostname_is_never_blank() {
    assert!(!detect_hostname().trim().is_empty());
  }

  #[test]
  fn test_unknown_cpu() {
    let mut facts = facts();
    facts.cpu_model = None;
    assert_eq!(facts.fingerprint().processor_id, "Unknown Processor");
  }

  #[test]
  fn test_different_hosts_differ() {
    let mut other = facts();
    other.hostname = "frontdesk-02".into();
    assert_ne!(facts().fingerprint().mac_address, other.fingerprint().mac_address);
  }

  #[test]
  fn test_stored_fingerprint_reused_within_validity() {
    let store = KvStore::in_memory().unwrap();
    let t0 = Utc::now();

    let first = resolve(&store, false, t0, facts).unwrap();
    let later = resolve(&store, false, t0 + Duration::hours(23), || {
      panic!("should not re-detect")
    })
    .unwrap();

    assert_eq!(first, later);
  }

  #[test]
  fn test_stale_fingerprint_redetected() {
    let store = KvStore::in_memory().unwrap();
    let t0 = Utc::now();
    resolve(&store, false, t0, facts).unwrap();

    let mut moved = facts();
    moved.hostname = "backoffice".into();
    let info = resolve(&store, false, t0 + Duration::hours(25), || moved).unwrap();

    assert_eq!(info.hostname, "backoffice");
  }

  #[test]
  fn test_force_redetects() {
    let store = KvStore::in_memory().unwrap();
    let t0 = Utc::now();
    resolve(&store, false, t0, facts).unwrap();

    let mut moved = facts();
    moved.hostname = "laptop".into();
    let info = resolve(&store, true, t0, || moved).unwrap();

    assert_eq!(info.hostname, "laptop");
  }
}
