use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::{Checkpoint, Phase};
use crate::chroot;
use crate::cmd;
use crate::config::InstallConfig;
use crate::disk;
use crate::packages;
use crate::paths;
use crate::postinstall;
use crate::profile::Profile;
use crate::util;

/// The destructive steps of one installation run, in fixed order. User
/// input is gathered before the driver starts; `InstallationComplete` is
/// written after the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DiskSetup,
    BaseInstall,
    ChrootConfig,
    PostInstallPrep,
}

impl Step {
    pub const SEQUENCE: [Step; 4] = [
        Step::DiskSetup,
        Step::BaseInstall,
        Step::ChrootConfig,
        Step::PostInstallPrep,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Step::DiskSetup => "Disk setup",
            Step::BaseInstall => "Base system installation",
            Step::ChrootConfig => "System configuration",
            Step::PostInstallPrep => "Post-install setup",
        }
    }

    /// Tag written after this step completes.
    pub fn completed_tag(&self) -> Phase {
        match self {
            Step::DiskSetup => Phase::DiskSetupComplete,
            Step::BaseInstall => Phase::BaseInstallComplete,
            Step::ChrootConfig => Phase::ChrootConfigComplete,
            Step::PostInstallPrep => Phase::PostInstallPrepComplete,
        }
    }
}

/// Steps still to run given the tag loaded from a checkpoint. No
/// checkpoint means everything runs.
pub fn steps_after(completed: Option<Phase>) -> &'static [Step] {
    let done = completed.map(|p| p.completed_steps()).unwrap_or(0);
    &Step::SEQUENCE[done..]
}

pub struct Installer {
    config: InstallConfig,
    profile: Profile,
    target: PathBuf,
    checkpoint_path: PathBuf,
}

impl Installer {
    pub fn new(config: InstallConfig, profile: Profile) -> Self {
        Self {
            config,
            profile,
            target: PathBuf::from(paths::MOUNT_TARGET),
            checkpoint_path: PathBuf::from(paths::CHECKPOINT_FILE),
        }
    }

    #[cfg(test)]
    fn with_paths(mut self, target: PathBuf, checkpoint_path: PathBuf) -> Self {
        self.target = target;
        self.checkpoint_path = checkpoint_path;
        self
    }

    /// Execute every step after the resumed tag, checkpointing as we go.
    /// The first failure writes a `Failed` checkpoint and aborts; side
    /// effects already performed are not rolled back.
    pub fn run(&self, completed: Option<Phase>) -> Result<()> {
        let steps = steps_after(completed);

        if steps.is_empty() {
            println!("Nothing to do: installation already complete.");
            return Ok(());
        }

        let total = Step::SEQUENCE.len();
        let done = total - steps.len();
        for (i, step) in steps.iter().enumerate() {
            println!("\n[{}/{}] {}...", done + i + 1, total, step.label());
            tracing::info!(step = step.label(), "phase started");

            if let Err(e) = self.execute(*step) {
                let _ = Checkpoint::new(Phase::Failed, &self.config).save(&self.checkpoint_path);
                return Err(e).context(format!("{} failed", step.label()));
            }

            Checkpoint::new(step.completed_tag(), &self.config).save(&self.checkpoint_path)?;
        }

        Checkpoint::new(Phase::InstallationComplete, &self.config).save(&self.checkpoint_path)?;
        Ok(())
    }

    fn execute(&self, step: Step) -> Result<()> {
        match step {
            Step::DiskSetup => self.disk_setup(),
            Step::BaseInstall => self.base_install(),
            Step::ChrootConfig => self.chroot_config(),
            Step::PostInstallPrep => self.post_install_prep(),
        }
    }

    fn disk_setup(&self) -> Result<()> {
        disk::provision(&self.config.device, &self.profile.partitions, &self.target)?;
        Ok(())
    }

    fn base_install(&self) -> Result<()> {
        let mut pkgs: Vec<&str> = packages::BASE_PACKAGES.to_vec();
        if let Some(ucode) = util::detect_cpu_vendor().microcode_package() {
            pkgs.push(ucode);
        }
        for extra in &self.profile.extra_packages {
            pkgs.push(extra);
        }

        let target_str = self.target.to_string_lossy().to_string();
        let mut args: Vec<&str> = vec!["-K", &target_str];
        args.extend(pkgs);
        cmd::run("pacstrap", args)?;

        let fstab = cmd::run_output("genfstab", ["-U", &target_str])?;
        write_fstab(&self.target, &fstab)?;

        Ok(())
    }

    fn chroot_config(&self) -> Result<()> {
        chroot::configure_system(&self.target, &self.config)?;
        chroot::set_root_password(&self.target, &self.config.root_password)?;
        chroot::create_user(
            &self.target,
            &self.config.username,
            &self.config.user_password,
            &["wheel"],
        )?;
        chroot::configure_sudoers(&self.target)?;
        chroot::install_bootloader(&self.target, &self.profile.kernel_params)?;
        chroot::enable_networkmanager(&self.target)?;
        Ok(())
    }

    fn post_install_prep(&self) -> Result<()> {
        postinstall::run(&self.target, &self.config)
    }
}

fn write_fstab(target: &Path, fstab: &str) -> Result<()> {
    let path = target.join("etc/fstab");
    fs::write(&path, format!("{}\n", fstab.trim_end()))
        .with_context(|| format!("Failed to write {}", path.display()))
}
