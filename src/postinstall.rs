//! Post-install runbook: capability package groups, AUR helper, firewall,
//! dotfiles. Runs against the mounted target; only the desktop group (and
//! the firewall toggle, when enabled) is fatal.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cmd;
use crate::config::InstallConfig;
use crate::dotfiles::{self, DotfilesSpec};
use crate::packages::{self, PackageGroup};
use crate::paths;

pub fn run(target: &Path, config: &InstallConfig) -> Result<()> {
    for group in packages::CAPABILITY_GROUPS {
        match install_group(target, group) {
            Ok(()) => tracing::info!(group = group.name, "package group installed"),
            Err(e) if group.fatal => {
                return Err(e).context(format!("Required package group '{}' failed", group.name))
            }
            Err(e) => {
                tracing::warn!(group = group.name, error = %e, "package group failed");
                println!("Warning: package group '{}' failed, continuing: {}", group.name, e);
            }
        }
    }

    install_aur_helper(target);

    if config.enable_firewall {
        setup_firewall(target)?;
    }

    if config.install_dotfiles {
        deploy_dotfiles(target, config)?;
    }

    Ok(())
}

fn install_group(target: &Path, group: &PackageGroup) -> Result<()> {
    if group.packages.is_empty() {
        return Ok(());
    }

    let target_str = target.to_string_lossy().to_string();
    let mut args: Vec<&str> = vec![&target_str, "pacman", "-S", "--noconfirm", "--needed"];
    args.extend(group.packages);

    cmd::run("arch-chroot", args)
}

/// Best effort only: the helper lives outside the official repos on a
/// stock mirror setup.
fn install_aur_helper(target: &Path) {
    let target_str = target.to_string_lossy().to_string();
    let result = cmd::run(
        "arch-chroot",
        [
            &target_str,
            "pacman",
            "-S",
            "--noconfirm",
            "--needed",
            packages::AUR_HELPER,
        ],
    );

    if let Err(e) = result {
        tracing::warn!(helper = packages::AUR_HELPER, error = %e, "AUR helper unavailable");
        println!(
            "Warning: {} is not available from the configured repos; install it after first boot",
            packages::AUR_HELPER
        );
    }
}

fn setup_firewall(target: &Path) -> Result<()> {
    let target_str = target.to_string_lossy().to_string();

    let mut args: Vec<&str> = vec![&target_str, "pacman", "-S", "--noconfirm", "--needed"];
    args.extend(packages::FIREWALL_PACKAGES);
    cmd::run("arch-chroot", args)?;

    cmd::run("arch-chroot", [&target_str, "ufw", "default", "deny", "incoming"])?;
    cmd::run("arch-chroot", [&target_str, "systemctl", "enable", "ufw"])?;

    Ok(())
}

fn deploy_dotfiles(target: &Path, config: &InstallConfig) -> Result<()> {
    let spec = DotfilesSpec {
        url: config.dotfiles_url.clone(),
        setup_script: (!config.dotfiles_setup.is_empty()).then(|| config.dotfiles_setup.clone()),
    };

    let home = target.join("home").join(&config.username);
    let dest = home.join(paths::DOTFILES_DIR);
    dotfiles::install(&spec, &dest)?;

    // The clone ran as root; hand the tree to its owner.
    let target_str = target.to_string_lossy().to_string();
    let owner = format!("{}:{}", config.username, config.username);
    let home_path = format!("/home/{}/{}", config.username, paths::DOTFILES_DIR);
    cmd::run("arch-chroot", [&target_str, "chown", "-R", &owner, &home_path])
        .context("Failed to chown dotfiles")?;

    Ok(())
}
