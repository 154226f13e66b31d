//! Precondition checks run before any destructive action.

use std::path::Path;
use std::process::Command;

use crate::profile::{Profile, SizePolicy};
use crate::util;

/// Host tools the installer shells out to. Checked up front so a missing
/// binary fails here instead of mid-install.
pub const REQUIRED_TOOLS: &[&str] = &[
    "lsblk",
    "wipefs",
    "sfdisk",
    "mkfs.fat",
    "mkfs.ext4",
    "mkswap",
    "pacstrap",
    "arch-chroot",
    "genfstab",
    "git",
];

/// URL probed for internet reachability.
const CONNECTIVITY_URL: &str = "https://archlinux.org";

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub suggestion: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Passes, but the message is worth showing.
    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn print_summary(&self) {
        for check in &self.checks {
            let status = if check.passed { "[OK]" } else { "[FAIL]" };
            println!("{} {}: {}", status, check.name, check.message);
            if let Some(suggestion) = &check.suggestion {
                println!("     Suggestion: {}", suggestion);
            }
        }
    }
}

pub fn check_root() -> CheckResult {
    if nix::unistd::Uid::effective().is_root() {
        CheckResult::pass("Privileges", "running as root")
    } else {
        CheckResult::fail(
            "Privileges",
            "not running as root",
            "Re-run with sudo; the installer partitions disks and mounts filesystems",
        )
    }
}

/// UEFI firmware check. The installers only support UEFI targets.
pub fn check_uefi() -> CheckResult {
    check_uefi_at(Path::new("/sys/firmware/efi/efivars"))
}

fn check_uefi_at(efivars: &Path) -> CheckResult {
    if efivars.exists() {
        CheckResult::pass("Boot mode", "booted in UEFI mode")
    } else {
        CheckResult::fail(
            "Boot mode",
            "not booted in UEFI mode",
            "Reboot the live environment in UEFI mode; legacy BIOS is not supported",
        )
    }
}

/// Internet reachability via a HEAD request against the Arch site.
pub fn check_network() -> CheckResult {
    let result = Command::new("curl")
        .args([
            "--head",
            "--silent",
            "--fail",
            "--max-time",
            "10",
            "--output",
            "/dev/null",
            CONNECTIVITY_URL,
        ])
        .status();

    match result {
        Ok(status) if status.success() => CheckResult::pass("Network", "archlinux.org reachable"),
        Ok(_) => CheckResult::fail(
            "Network",
            "archlinux.org unreachable",
            "Connect to a network first (iwctl for wireless)",
        ),
        Err(e) => CheckResult::fail(
            "Network",
            format!("could not probe connectivity: {}", e),
            "Ensure curl is installed and you have network access",
        ),
    }
}

pub fn check_host_tools() -> Vec<CheckResult> {
    REQUIRED_TOOLS
        .iter()
        .map(|tool| match which::which(tool) {
            Ok(path) => CheckResult::pass(format!("Tool {}", tool), path.display().to_string()),
            Err(_) => CheckResult::fail(
                format!("Tool {}", tool),
                "not found in PATH",
                "Run the installer from the Arch live ISO, or install the missing package",
            ),
        })
        .collect()
}

/// Device capacity against the profile minimum. Whether a shortfall
/// rejects or merely warns is profile data.
pub fn check_device_size(size_bytes: u64, profile: &Profile) -> CheckResult {
    let have = util::format_gb(size_bytes);
    let need = util::format_gb(profile.min_disk_bytes);

    if size_bytes >= profile.min_disk_bytes {
        return CheckResult::pass("Device size", format!("{} (need {})", have, need));
    }

    match profile.size_policy {
        SizePolicy::Enforce => CheckResult::fail(
            "Device size",
            format!("{} is below the {} minimum for {}", have, need, profile.name),
            "Use a larger drive or the smaller profile",
        ),
        SizePolicy::WarnOnly => CheckResult::warn(
            "Device size",
            format!(
                "{} is below the {} expected for {}; continuing anyway",
                have, need, profile.name
            ),
        ),
    }
}

/// Run every check. Pure decisions are separated above so they stay
/// testable without a live system.
pub fn run_all(device_size_bytes: u64, profile: &Profile) -> PreflightReport {
    let mut report = PreflightReport::default();
    report.checks.push(check_root());
    report.checks.push(check_uefi());
    report.checks.push(check_network());
    report.checks.extend(check_host_tools());
    report.checks.push(check_device_size(device_size_bytes, profile));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    #[test]
    fn undersized_device_rejected_when_enforced() {
        let profile = Profile::usb_32gb();
        let result = check_device_size(16_000_000_000, &profile);
        assert!(!result.passed);
        assert!(result.suggestion.is_some());
    }

    #[test]
    fn undersized_device_warns_when_policy_is_warn_only() {
        let profile = Profile::usb_256gb();
        let result = check_device_size(128_000_000_000, &profile);
        assert!(result.passed);
        assert!(result.message.contains("continuing anyway"));
    }

    #[test]
    fn adequate_device_passes_either_policy() {
        for profile in [Profile::usb_256gb(), Profile::usb_32gb()] {
            let result = check_device_size(512_000_000_000, &profile);
            assert!(result.passed, "{}", profile.name);
        }
    }

    #[test]
    fn uefi_check_reads_efivars_presence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_uefi_at(dir.path()).passed);
        assert!(!check_uefi_at(&dir.path().join("absent")).passed);
    }

    #[test]
    fn report_fails_when_any_check_fails() {
        let mut report = PreflightReport::default();
        report.checks.push(CheckResult::pass("a", "ok"));
        assert!(report.is_ok());

        report.checks.push(CheckResult::fail("b", "bad", "fix"));
        assert!(!report.is_ok());
        assert_eq!(report.errors().len(), 1);
    }
}
