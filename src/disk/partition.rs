use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cmd;
use crate::profile::PartitionPlan;

/// The five partitions created on every target, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPartitions {
    pub efi: PathBuf,
    pub root: PathBuf,
    pub home: PathBuf,
    pub swap: PathBuf,
    pub data: PathBuf,
}

/// Partition device path for a 1-based index, handling the `p` infix used
/// by NVMe/MMC naming (nvme0n1p2 vs sdb2).
pub fn partition_device(device: &Path, index: u32) -> PathBuf {
    let device_str = device.to_string_lossy();
    if device_str.contains("nvme") || device_str.contains("mmcblk") {
        PathBuf::from(format!("{}p{}", device_str, index))
    } else {
        PathBuf::from(format!("{}{}", device_str, index))
    }
}

pub fn detect_partitions(device: &Path) -> DiskPartitions {
    DiskPartitions {
        efi: partition_device(device, 1),
        root: partition_device(device, 2),
        home: partition_device(device, 3),
        swap: partition_device(device, 4),
        data: partition_device(device, 5),
    }
}

/// Create the GPT table and all partitions in one sfdisk invocation.
pub fn create_partitions(device: &Path, plan: &PartitionPlan) -> Result<DiskPartitions> {
    let device_str = device.to_string_lossy();
    let script = plan.sfdisk_script();

    cmd::run_with_stdin("sfdisk", [&*device_str], script.as_bytes())?;

    // Wait for the kernel to re-read the partition table; partprobe is not
    // always present on the live ISO.
    std::thread::sleep(std::time::Duration::from_secs(2));

    Ok(detect_partitions(device))
}

pub fn format_efi(partition: &Path) -> Result<()> {
    cmd::run(
        "mkfs.fat",
        ["-F", "32", "-n", "ARCHUSB_EFI", &partition.to_string_lossy()],
    )
}

pub fn format_ext4(partition: &Path, label: &str) -> Result<()> {
    cmd::run(
        "mkfs.ext4",
        ["-F", "-L", label, &partition.to_string_lossy()],
    )
}

pub fn format_swap(partition: &Path) -> Result<()> {
    cmd::run("mkswap", ["-L", "archusb_swap", &partition.to_string_lossy()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sata_partitions_use_plain_suffix() {
        let parts = detect_partitions(Path::new("/dev/sdb"));
        assert_eq!(parts.efi, PathBuf::from("/dev/sdb1"));
        assert_eq!(parts.root, PathBuf::from("/dev/sdb2"));
        assert_eq!(parts.data, PathBuf::from("/dev/sdb5"));
    }

    #[test]
    fn nvme_partitions_use_p_infix() {
        let parts = detect_partitions(Path::new("/dev/nvme0n1"));
        assert_eq!(parts.efi, PathBuf::from("/dev/nvme0n1p1"));
        assert_eq!(parts.swap, PathBuf::from("/dev/nvme0n1p4"));
    }

    #[test]
    fn mmc_partitions_use_p_infix() {
        assert_eq!(
            partition_device(Path::new("/dev/mmcblk0"), 3),
            PathBuf::from("/dev/mmcblk0p3")
        );
    }
}
