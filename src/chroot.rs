//! Configuration of the freshly installed system, executed through
//! arch-chroot. The caller blocks on each step; any non-zero exit aborts
//! the phase.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::cmd;
use crate::config::InstallConfig;

pub fn configure_system(target: &Path, config: &InstallConfig) -> Result<()> {
    configure_timezone(target, &config.timezone)?;
    configure_locale(target, &config.locale)?;
    configure_hostname(target, &config.hostname)?;
    configure_keymap(target, &config.keymap)?;
    Ok(())
}

fn configure_timezone(target: &Path, timezone: &str) -> Result<()> {
    let zoneinfo = format!("/usr/share/zoneinfo/{}", timezone);
    let localtime = target.join("etc/localtime");

    // Remove any symlink left by pacstrap
    let _ = fs::remove_file(&localtime);

    std::os::unix::fs::symlink(&zoneinfo, &localtime).context("Failed to set timezone")?;

    // Non-fatal: VMs often have no hardware clock access
    if cmd::run(
        "arch-chroot",
        [&target.to_string_lossy(), "hwclock", "--systohc"],
    )
    .is_err()
    {
        println!("Warning: Could not set hardware clock. This is normal if you're in a VM.");
    }

    Ok(())
}

fn configure_locale(target: &Path, locale: &str) -> Result<()> {
    let locale_gen = target.join("etc/locale.gen");
    fs::write(&locale_gen, format!("{} UTF-8\n", locale)).context("Failed to write locale.gen")?;

    cmd::run("arch-chroot", [&target.to_string_lossy(), "locale-gen"])?;

    let locale_conf = target.join("etc/locale.conf");
    fs::write(&locale_conf, format!("LANG={}\n", locale)).context("Failed to write locale.conf")?;

    Ok(())
}

/// Contents of /etc/hosts for the given hostname.
fn hosts_contents(hostname: &str) -> String {
    format!(
        "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\t{}.localdomain\t{}\n",
        hostname, hostname
    )
}

fn configure_hostname(target: &Path, hostname: &str) -> Result<()> {
    fs::write(target.join("etc/hostname"), format!("{}\n", hostname))
        .context("Failed to write hostname")?;
    fs::write(target.join("etc/hosts"), hosts_contents(hostname))
        .context("Failed to write hosts")?;
    Ok(())
}

fn configure_keymap(target: &Path, keymap: &str) -> Result<()> {
    fs::write(target.join("etc/vconsole.conf"), format!("KEYMAP={}\n", keymap))
        .context("Failed to write vconsole.conf")?;
    Ok(())
}

pub fn set_root_password(target: &Path, password: &str) -> Result<()> {
    cmd::run_with_stdin(
        "arch-chroot",
        [&target.to_string_lossy(), "chpasswd"],
        format!("root:{}\n", password).as_bytes(),
    )
}

/// Create the login user with a home directory and the given groups.
pub fn create_user(target: &Path, username: &str, password: &str, groups: &[&str]) -> Result<()> {
    let target_str = target.to_string_lossy().to_string();

    cmd::run(
        "arch-chroot",
        [&target_str, "useradd", "-m", "-s", "/bin/bash", username],
    )
    .context(format!("Failed to create user '{}'", username))?;

    cmd::run_with_stdin(
        "arch-chroot",
        [&target_str, "chpasswd"],
        format!("{}:{}\n", username, password).as_bytes(),
    )
    .context(format!("Failed to set password for '{}'", username))?;

    if !groups.is_empty() {
        let groups_str = groups.join(",");
        cmd::run(
            "arch-chroot",
            [&target_str, "usermod", "-aG", &groups_str, username],
        )
        .context(format!("Failed to add '{}' to groups", username))?;
    }

    Ok(())
}

/// Configure sudoers to allow wheel group sudo access
pub fn configure_sudoers(target: &Path) -> Result<()> {
    let sudoers_d = target.join("etc/sudoers.d");
    fs::create_dir_all(&sudoers_d)?;

    let wheel_file = sudoers_d.join("wheel");
    fs::write(&wheel_file, "%wheel ALL=(ALL:ALL) ALL\n")
        .context("Failed to write sudoers.d/wheel")?;

    // Restrictive permissions required by sudo
    fs::set_permissions(&wheel_file, fs::Permissions::from_mode(0o440))
        .context("Failed to set permissions on sudoers.d/wheel")?;

    Ok(())
}

/// Replace (or append) the GRUB_CMDLINE_LINUX_DEFAULT line in
/// /etc/default/grub content.
fn set_grub_cmdline(content: &str, params: &[String]) -> String {
    let line = format!("GRUB_CMDLINE_LINUX_DEFAULT=\"{}\"", params.join(" "));
    let mut replaced = false;

    let mut out: Vec<String> = content
        .lines()
        .map(|l| {
            if l.trim_start().starts_with("GRUB_CMDLINE_LINUX_DEFAULT=") {
                replaced = true;
                line.clone()
            } else {
                l.to_string()
            }
        })
        .collect();

    if !replaced {
        out.push(line);
    }

    out.join("\n") + "\n"
}

/// Install GRUB for UEFI. `--removable` places the fallback bootloader
/// path so the stick boots on machines without a matching NVRAM entry.
pub fn install_bootloader(target: &Path, kernel_params: &[String]) -> Result<()> {
    let target_str = target.to_string_lossy().to_string();

    if !kernel_params.is_empty() {
        let grub_default = target.join("etc/default/grub");
        let current = fs::read_to_string(&grub_default).unwrap_or_default();
        fs::write(&grub_default, set_grub_cmdline(&current, kernel_params))
            .context("Failed to write /etc/default/grub")?;
    }

    cmd::run(
        "arch-chroot",
        [
            &target_str,
            "grub-install",
            "--target=x86_64-efi",
            "--efi-directory=/boot",
            "--bootloader-id=ARCHUSB",
            "--removable",
        ],
    )?;

    cmd::run(
        "arch-chroot",
        [&target_str, "grub-mkconfig", "-o", "/boot/grub/grub.cfg"],
    )?;

    Ok(())
}

pub fn enable_networkmanager(target: &Path) -> Result<()> {
    let target_str = target.to_string_lossy().to_string();
    cmd::run(
        "arch-chroot",
        [&target_str, "systemctl", "enable", "NetworkManager"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_contents_names_the_host_twice() {
        let hosts = hosts_contents("travelbox");
        assert!(hosts.contains("127.0.0.1\tlocalhost"));
        assert!(hosts.contains("127.0.1.1\ttravelbox.localdomain\ttravelbox"));
    }

    #[test]
    fn grub_cmdline_replaces_existing_line() {
        let content = "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX_DEFAULT=\"quiet\"\n";
        let updated = set_grub_cmdline(content, &["quiet".into(), "loglevel=3".into()]);
        assert!(updated.contains("GRUB_CMDLINE_LINUX_DEFAULT=\"quiet loglevel=3\""));
        assert!(!updated.contains("DEFAULT=\"quiet\"\n"));
        assert!(updated.contains("GRUB_TIMEOUT=5"));
    }

    #[test]
    fn grub_cmdline_appends_when_absent() {
        let updated = set_grub_cmdline("GRUB_TIMEOUT=5\n", &["nomodeset".into()]);
        assert!(updated.ends_with("GRUB_CMDLINE_LINUX_DEFAULT=\"nomodeset\"\n"));
    }

    #[test]
    fn grub_cmdline_handles_empty_file() {
        let updated = set_grub_cmdline("", &["quiet".into()]);
        assert_eq!(updated, "GRUB_CMDLINE_LINUX_DEFAULT=\"quiet\"\n");
    }
}
