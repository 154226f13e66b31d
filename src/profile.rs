use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when the target device is smaller than the profile minimum.
/// The historical installers disagreed on this; it is now explicit per
/// profile data instead of drifting copy-paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizePolicy {
    /// Refuse the device
    Enforce,
    /// Proceed with a warning
    WarnOnly,
}

/// Fixed partition size targets in MiB. The data partition always takes
/// whatever remains after these four.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    pub efi_mib: u64,
    pub root_mib: u64,
    pub home_mib: u64,
    pub swap_mib: u64,
}

impl PartitionPlan {
    /// Sum of the fixed partitions, excluding the data remainder.
    pub fn fixed_total_mib(&self) -> u64 {
        self.efi_mib + self.root_mib + self.home_mib + self.swap_mib
    }

    /// Start offset of each partition in MiB, computed sequentially from a
    /// 1 MiB aligned start: EFI, root, home, swap, data.
    pub fn offsets_mib(&self) -> [u64; 5] {
        let efi = 1;
        let root = efi + self.efi_mib;
        let home = root + self.root_mib;
        let swap = home + self.home_mib;
        let data = swap + self.swap_mib;
        [efi, root, home, swap, data]
    }

    /// sfdisk input creating the GPT table and all five partitions in
    /// order. Type codes: U = EFI system, S = swap, L = Linux. The last
    /// line omits a size so the data partition takes the remainder.
    pub fn sfdisk_script(&self) -> String {
        format!(
            "label: gpt\n,{}M,U,*\n,{}M,L\n,{}M,L\n,{}M,S\n,,L\n",
            self.efi_mib, self.root_mib, self.home_mib, self.swap_mib
        )
    }
}

/// Descriptor parameterizing the single install pipeline: one per USB size
/// class, loadable from TOML for custom layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub label: String,
    pub min_disk_bytes: u64,
    pub size_policy: SizePolicy,
    /// Extra kernel command line parameters for GRUB. Both built-in
    /// profiles leave this empty and rely on kernel defaults.
    #[serde(default)]
    pub kernel_params: Vec<String>,
    /// Packages installed with the base system on top of the shared list
    #[serde(default)]
    pub extra_packages: Vec<String>,
    /// Default dotfiles repository offered during configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dotfiles_url: Option<String>,
    pub partitions: PartitionPlan,
}

impl Profile {
    pub fn usb_256gb() -> Self {
        Self {
            name: "usb-256gb".into(),
            label: "256 GB USB drive".into(),
            min_disk_bytes: 240_000_000_000,
            size_policy: SizePolicy::WarnOnly,
            kernel_params: Vec::new(),
            extra_packages: Vec::new(),
            dotfiles_url: None,
            partitions: PartitionPlan {
                efi_mib: 1024,
                root_mib: 65_536,
                home_mib: 131_072,
                swap_mib: 8192,
            },
        }
    }

    pub fn usb_32gb() -> Self {
        Self {
            name: "usb-32gb".into(),
            label: "32 GB USB drive".into(),
            min_disk_bytes: 29_000_000_000,
            size_policy: SizePolicy::Enforce,
            kernel_params: Vec::new(),
            extra_packages: Vec::new(),
            dotfiles_url: None,
            partitions: PartitionPlan {
                efi_mib: 512,
                root_mib: 15_360,
                home_mib: 8192,
                swap_mib: 2048,
            },
        }
    }

    /// Look up a built-in profile; accepts the short aliases used on the
    /// command line.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "usb-256gb" | "256gb" => Some(Self::usb_256gb()),
            "usb-32gb" | "32gb" => Some(Self::usb_32gb()),
            _ => None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse profile {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_accepts_aliases() {
        assert_eq!(Profile::builtin("256gb"), Some(Profile::usb_256gb()));
        assert_eq!(Profile::builtin("usb-32gb"), Some(Profile::usb_32gb()));
        assert_eq!(Profile::builtin("floppy"), None);
    }

    #[test]
    fn size_check_asymmetry_is_data() {
        assert_eq!(Profile::usb_256gb().size_policy, SizePolicy::WarnOnly);
        assert_eq!(Profile::usb_32gb().size_policy, SizePolicy::Enforce);
    }

    #[test]
    fn builtin_profiles_set_no_kernel_params() {
        assert!(Profile::usb_256gb().kernel_params.is_empty());
        assert!(Profile::usb_32gb().kernel_params.is_empty());
    }

    #[test]
    fn offsets_are_sequential() {
        let plan = Profile::usb_32gb().partitions;
        let [efi, root, home, swap, data] = plan.offsets_mib();
        assert_eq!(efi, 1);
        assert_eq!(root, 1 + 512);
        assert_eq!(home, root + 15_360);
        assert_eq!(swap, home + 8192);
        assert_eq!(data, swap + 2048);
        assert_eq!(data, 1 + plan.fixed_total_mib());
    }

    #[test]
    fn fixed_partitions_fit_under_the_minimum_size() {
        for profile in [Profile::usb_256gb(), Profile::usb_32gb()] {
            let fixed_bytes = profile.partitions.fixed_total_mib() * 1024 * 1024;
            assert!(
                fixed_bytes < profile.min_disk_bytes,
                "{}: fixed partitions leave no data space",
                profile.name
            );
        }
    }

    #[test]
    fn sfdisk_script_orders_partitions() {
        let script = Profile::usb_256gb().partitions.sfdisk_script();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "label: gpt");
        assert_eq!(lines[1], ",1024M,U,*");
        assert_eq!(lines[2], ",65536M,L");
        assert_eq!(lines[3], ",131072M,L");
        assert_eq!(lines[4], ",8192M,S");
        assert_eq!(lines[5], ",,L");
    }

    #[test]
    fn profile_round_trips_through_toml() {
        let profile = Profile::usb_32gb();
        let text = toml::to_string(&profile).unwrap();
        let parsed: Profile = toml::from_str(&text).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn profile_from_file_reads_custom_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
name = "usb-64gb"
label = "64 GB USB drive"
min_disk_bytes = 60000000000
size_policy = "enforce"
kernel_params = ["quiet"]

[partitions]
efi_mib = 512
root_mib = 20480
home_mib = 16384
swap_mib = 4096
"#,
        )
        .unwrap();

        let profile = Profile::from_file(&path).unwrap();
        assert_eq!(profile.name, "usb-64gb");
        assert_eq!(profile.size_policy, SizePolicy::Enforce);
        assert_eq!(profile.kernel_params, vec!["quiet".to_string()]);
        assert_eq!(profile.partitions.root_mib, 20_480);
        assert!(profile.extra_packages.is_empty());
    }
}
