use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Default mount target for installation
pub const MOUNT_TARGET: &str = "/mnt";

/// Checkpoint file overwritten after every completed phase
pub const CHECKPOINT_FILE: &str = "/var/tmp/archusb-install.checkpoint";

/// Stock archiso profile used as the base for ISO assembly
pub const ARCHISO_BASE_PROFILE: &str = "/usr/share/archiso/configs/releng";

/// Directory a dotfiles repository is cloned into, relative to the user home
pub const DOTFILES_DIR: &str = ".dotfiles";

/// Per-run log file. The pid keeps concurrent runs from clobbering each other.
pub static LOG_FILE: Lazy<PathBuf> =
    Lazy::new(|| PathBuf::from(format!("/var/tmp/archusb-{}.log", std::process::id())));
