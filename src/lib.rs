//! archusb: Arch Linux USB installation and ISO packaging.
//!
//! The library sequences calls to the usual host tools (sfdisk, mkfs.*,
//! pacstrap, arch-chroot, pacman, git, mkarchiso); it reimplements none of
//! them. Two binaries sit on top: `archusb-install` and `archusb-iso`.

pub mod checkpoint;
pub mod chroot;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod disk;
pub mod dotfiles;
pub mod install;
pub mod iso;
pub mod logging;
pub mod packages;
pub mod paths;
pub mod postinstall;
pub mod preflight;
pub mod profile;
pub mod util;
