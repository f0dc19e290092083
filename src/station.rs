//! Station identity: hardware address and software revision.
//!
//! Reports carry a short numeric station id derived from a network
//! interface's MAC address, and a version derived from the git commit the
//! test script runs from.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AutoTestError, Result};

/// Station ids are the MAC address modulo this.
pub const STATION_ID_MODULUS: u64 = 10_000;

const SHORT_SHA_LEN: usize = 6;

// Linux prints "HWaddr" or "ether", macOS prints "ether".
static IFCONFIG_MAC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:HWaddr|ether)\s+((?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2})")
        .expect("valid MAC regex")
});

static SHA1_HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("valid sha regex"));

/// Parses `aa:bb:cc:dd:ee:ff` (or dash separated) into its integer value.
pub fn parse_mac(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();
    if digits.len() != 12 {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}

/// Finds the MAC address in `ifconfig` output.
pub fn mac_from_ifconfig(output: &str) -> Option<u64> {
    IFCONFIG_MAC
        .captures(output)
        .and_then(|caps| parse_mac(&caps[1]))
}

/// MAC address of `interface` as an integer.
///
/// Reads sysfs first and falls back to `ifconfig <interface>`.
pub fn mac_address(interface: &str) -> Result<u64> {
    let failed = |reason: String| AutoTestError::Station {
        interface: interface.to_string(),
        reason,
    };

    let sysfs = PathBuf::from("/sys/class/net").join(interface).join("address");
    if let Some(mac) = fs::read_to_string(&sysfs)
        .ok()
        .and_then(|text| parse_mac(&text))
    {
        return Ok(mac);
    }

    let output = Command::new("ifconfig")
        .arg(interface)
        .output()
        .map_err(|e| failed(format!("cannot run ifconfig: {}", e)))?;
    if !output.status.success() {
        return Err(failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    mac_from_ifconfig(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| failed("no hardware address in ifconfig output".to_string()))
}

/// Short station id for `interface`.
pub fn station_id(interface: &str) -> Result<u64> {
    let mac = mac_address(interface)?;
    let id = mac % STATION_ID_MODULUS;
    tracing::debug!(interface, mac = %format!("{:012x}", mac), id, "station id resolved");
    Ok(id)
}

/// Head commit of the repository at `dir`, or `None` outside a repository.
///
/// `short` trims the hash to its first six characters.
pub fn commit_sha(dir: &Path, short: bool) -> Option<String> {
    let output = Command::new("git")
        .arg("--git-dir")
        .arg(dir.join(".git"))
        .args(["log", "-1", "--format=%H"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !SHA1_HEX.is_match(&sha) {
        return None;
    }
    Some(if short {
        sha[..SHORT_SHA_LEN].to_string()
    } else {
        sha
    })
}
