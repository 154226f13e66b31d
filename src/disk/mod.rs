mod partition;

pub use partition::*;

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::cmd;
use crate::profile::PartitionPlan;

#[derive(Debug, Clone)]
pub struct BlockDevice {
    pub path: String,
    pub size_bytes: u64,
    pub model: Option<String>,
    pub removable: bool,
}

pub fn list_block_devices() -> Result<Vec<BlockDevice>> {
    let output = Command::new("lsblk")
        .args(["-b", "-d", "-n", "-o", "PATH,SIZE,MODEL,RM"])
        .output()
        .context("Failed to run lsblk")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut devices = Vec::new();

    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            let path = parts[0].to_string();

            // Skip loop devices and optical drives
            if path.contains("loop") || path.contains("sr") {
                continue;
            }

            let size_bytes = parts[1].parse().unwrap_or(0);
            let removable = parts.last().map(|s| *s == "1").unwrap_or(false);
            let model = if parts.len() > 3 {
                Some(parts[2..parts.len() - 1].join(" "))
            } else {
                None
            };

            devices.push(BlockDevice {
                path,
                size_bytes,
                model,
                removable,
            });
        }
    }

    Ok(devices)
}

/// Size of a single block device in bytes.
pub fn device_size(device: &Path) -> Result<u64> {
    let out = cmd::run_output("lsblk", ["-b", "-d", "-n", "-o", "SIZE", &device.to_string_lossy()])?;
    out.trim()
        .parse()
        .with_context(|| format!("Unparseable size for {}", device.display()))
}

pub fn wipe_device(device: &Path) -> Result<()> {
    cmd::run("wipefs", ["--all", "--force", &device.to_string_lossy()])
}

/// Format every partition with its designated filesystem.
pub fn format_all(parts: &DiskPartitions) -> Result<()> {
    format_efi(&parts.efi)?;
    format_ext4(&parts.root, "archusb_root")?;
    format_ext4(&parts.home, "archusb_home")?;
    format_swap(&parts.swap)?;
    format_ext4(&parts.data, "archusb_data")?;
    Ok(())
}

/// Mount in the fixed nesting order: root first, then boot/home/data under
/// it, then enable swap.
pub fn mount_all(parts: &DiskPartitions, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    cmd::run(
        "mount",
        [&*parts.root.to_string_lossy(), &*target.to_string_lossy()],
    )?;

    for (partition, subdir) in [(&parts.efi, "boot"), (&parts.home, "home"), (&parts.data, "data")]
    {
        let mountpoint = target.join(subdir);
        std::fs::create_dir_all(&mountpoint)
            .with_context(|| format!("Failed to create {}", mountpoint.display()))?;
        cmd::run(
            "mount",
            [&*partition.to_string_lossy(), &*mountpoint.to_string_lossy()],
        )?;
    }

    cmd::run("swapon", [&*parts.swap.to_string_lossy()])?;
    Ok(())
}

/// Wipe, partition, format, and mount the device per the plan. This is the
/// whole destructive sequence; the caller has already confirmed it.
pub fn provision(device: &Path, plan: &PartitionPlan, target: &Path) -> Result<DiskPartitions> {
    wipe_device(device)?;
    let parts = create_partitions(device, plan)?;
    format_all(&parts)?;
    mount_all(&parts, target)?;
    Ok(parts)
}
