use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::config::InstallConfig;

/// Tag written after each phase. The sequence is fixed; resuming skips
/// every phase at or before the loaded tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    UserInputComplete,
    DiskSetupComplete,
    BaseInstallComplete,
    ChrootConfigComplete,
    PostInstallPrepComplete,
    InstallationComplete,
    Failed,
}

impl Phase {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Phase::UserInputComplete => "USER_INPUT_COMPLETE",
            Phase::DiskSetupComplete => "DISK_SETUP_COMPLETE",
            Phase::BaseInstallComplete => "BASE_INSTALL_COMPLETE",
            Phase::ChrootConfigComplete => "CHROOT_CONFIG_COMPLETE",
            Phase::PostInstallPrepComplete => "POST_INSTALL_PREP_COMPLETE",
            Phase::InstallationComplete => "INSTALLATION_COMPLETE",
            Phase::Failed => "FAILED",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "USER_INPUT_COMPLETE" => Some(Phase::UserInputComplete),
            "DISK_SETUP_COMPLETE" => Some(Phase::DiskSetupComplete),
            "BASE_INSTALL_COMPLETE" => Some(Phase::BaseInstallComplete),
            "CHROOT_CONFIG_COMPLETE" => Some(Phase::ChrootConfigComplete),
            "POST_INSTALL_PREP_COMPLETE" => Some(Phase::PostInstallPrepComplete),
            "INSTALLATION_COMPLETE" => Some(Phase::InstallationComplete),
            "FAILED" => Some(Phase::Failed),
            _ => None,
        }
    }

    /// How many of the destructive steps (disk setup, base install, chroot
    /// config, post-install prep) this tag marks as already done. `Failed`
    /// keeps the config snapshot but counts nothing as done: every
    /// destructive step re-runs on resume.
    pub fn completed_steps(&self) -> usize {
        match self {
            Phase::UserInputComplete | Phase::Failed => 0,
            Phase::DiskSetupComplete => 1,
            Phase::BaseInstallComplete => 2,
            Phase::ChrootConfigComplete => 3,
            Phase::PostInstallPrepComplete | Phase::InstallationComplete => 4,
        }
    }
}

/// Snapshot of the run: phase tag plus the full configuration, overwritten
/// wholesale after every phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub phase: Phase,
    pub config: InstallConfig,
}

impl Checkpoint {
    pub fn new(phase: Phase, config: &InstallConfig) -> Self {
        Self {
            phase,
            config: config.clone(),
        }
    }

    /// Overwrite the checkpoint file. Mode 0600: the snapshot carries
    /// passwords.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = format!("PHASE=\"{}\"\n", self.phase.as_tag());
        content.push_str(&self.config.to_kv_string()?);

        fs::write(path, content)
            .with_context(|| format!("Failed to write checkpoint {}", path.display()))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;

        tracing::info!(phase = self.phase.as_tag(), "checkpoint saved");
        Ok(())
    }

    /// Read the checkpoint if one exists. A file without a recognizable
    /// PHASE tag is an error, not a silent restart.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read checkpoint {}", path.display()))
            }
        };

        let tag = content
            .lines()
            .find_map(|line| {
                let (key, value) = line.trim().split_once('=')?;
                (key.trim() == "PHASE").then(|| value.trim().trim_matches('"').to_string())
            })
            .with_context(|| format!("Checkpoint {} has no PHASE tag", path.display()))?;

        let phase = Phase::from_tag(&tag)
            .with_context(|| format!("Checkpoint {} has unknown phase '{}'", path.display(), tag))?;

        Ok(Some(Self {
            phase,
            config: InstallConfig::from_kv_str(&content),
        }))
    }

    /// Delete the checkpoint file (declined resume, fresh start).
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove checkpoint {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> InstallConfig {
        InstallConfig {
            device: PathBuf::from("/dev/sdb"),
            username: "tester".into(),
            root_password: "rootpw".into(),
            user_password: "userpw".into(),
            ..InstallConfig::default()
        }
    }

    #[test]
    fn tags_round_trip() {
        for phase in [
            Phase::UserInputComplete,
            Phase::DiskSetupComplete,
            Phase::BaseInstallComplete,
            Phase::ChrootConfigComplete,
            Phase::PostInstallPrepComplete,
            Phase::InstallationComplete,
            Phase::Failed,
        ] {
            assert_eq!(Phase::from_tag(phase.as_tag()), Some(phase));
        }
        assert_eq!(Phase::from_tag("NOT_A_PHASE"), None);
    }

    #[test]
    fn completed_steps_is_monotonic_over_the_sequence() {
        let sequence = [
            Phase::UserInputComplete,
            Phase::DiskSetupComplete,
            Phase::BaseInstallComplete,
            Phase::ChrootConfigComplete,
            Phase::PostInstallPrepComplete,
        ];
        for pair in sequence.windows(2) {
            assert!(pair[0].completed_steps() < pair[1].completed_steps());
        }
    }

    #[test]
    fn failed_counts_nothing_as_done() {
        assert_eq!(Phase::Failed.completed_steps(), 0);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");

        let checkpoint = Checkpoint::new(Phase::BaseInstallComplete, &config());
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn save_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");

        Checkpoint::new(Phase::DiskSetupComplete, &config())
            .save(&path)
            .unwrap();
        Checkpoint::new(Phase::Failed, &config()).save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded.phase, Phase::Failed);
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Checkpoint::load(&dir.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn load_rejects_unknown_phase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");
        std::fs::write(&path, "PHASE=\"HALFWAY\"\n").unwrap();
        assert!(Checkpoint::load(&path).is_err());
    }

    #[test]
    fn clear_removes_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");

        Checkpoint::new(Phase::UserInputComplete, &config())
            .save(&path)
            .unwrap();
        Checkpoint::clear(&path).unwrap();
        assert!(!path.exists());
        Checkpoint::clear(&path).unwrap();
    }

    #[test]
    fn checkpoint_file_is_private() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint");

        Checkpoint::new(Phase::UserInputComplete, &config())
            .save(&path)
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
