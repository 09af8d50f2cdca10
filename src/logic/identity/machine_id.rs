//! Machine ID Generation
//!
//! Derives a stable per-machine identifier from the OS:
//! - Linux: `/etc/machine-id`
//! - macOS: `IOPlatformUUID` via `ioreg`
//! - Windows: system UUID via `wmic csproduct`
//!
//! Falls back to the hostname when none of those are available.

use std::path::Path;
use std::process::Command;

use sha2::{Digest, Sha256};

/// Length of the published ID (hex chars)
pub const MACHINE_ID_LEN: usize = 16;

#[cfg(target_os = "linux")]
const LINUX_MACHINE_ID: &str = "/etc/machine-id";

/// Hash a raw identifier down to the published form
pub fn hash_identifier(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..MACHINE_ID_LEN].to_string()
}

/// Get the machine ID for this installation. Never fails.
pub fn get_machine_id() -> String {
    let raw = platform_identifier().unwrap_or_else(|| {
        log::debug!("No OS machine identifier available, falling back to hostname");
        fallback_identifier()
    });

    let id = hash_identifier(&raw);
    log::debug!("Machine ID: {}...", &id[..4]);
    id
}

#[cfg(target_os = "linux")]
fn platform_identifier() -> Option<String> {
    read_id_file(Path::new(LINUX_MACHINE_ID))
}

#[cfg(target_os = "macos")]
fn platform_identifier() -> Option<String> {
    let output = run_command("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
    parse_ioreg_uuid(&output)
}

#[cfg(target_os = "windows")]
fn platform_identifier() -> Option<String> {
    let output = run_command("wmic", &["csproduct", "get", "UUID"])?;
    parse_wmic_value(&output)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_identifier() -> Option<String> {
    None
}

fn fallback_identifier() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "UNKNOWN".to_string());
    format!("{}|{}|{}", hostname, std::env::consts::OS, std::env::consts::ARCH)
}

/// Read a machine-id style file, ignoring blank content
pub fn read_id_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let id = content.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Run a command and return its stdout
#[allow(dead_code)]
fn run_command(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Extract `IOPlatformUUID` from `ioreg` output
#[allow(dead_code)]
pub fn parse_ioreg_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('"').nth(3))
        .map(str::to_string)
        .filter(|uuid| !uuid.is_empty())
}

/// Skip the header line of WMIC output and take the value
#[allow(dead_code)]
pub fn parse_wmic_value(output: &str) -> Option<String> {
    output
        .lines()
        .nth(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
