use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A field failed its format check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid hostname '{0}': use 1-63 chars from [a-z0-9-], no leading/trailing hyphen")]
    InvalidHostname(String),
    #[error("invalid username '{0}': use [a-z_][a-z0-9_-]*, at most 32 chars")]
    InvalidUsername(String),
    #[error("{0} password must not be empty")]
    EmptyPassword(&'static str),
    #[error("no target device selected")]
    MissingDevice,
    #[error("dotfiles installation enabled but no repository URL configured")]
    MissingDotfilesUrl,
}

/// Everything one installation run needs to know. Built from interactive
/// prompts, a template file, or a checkpoint snapshot; passed by reference
/// through the phase functions.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallConfig {
    /// Name of the size profile driving the pipeline ("usb-256gb" / "usb-32gb")
    pub profile: String,
    pub device: PathBuf,
    pub hostname: String,
    pub username: String,
    pub root_password: String,
    pub user_password: String,
    pub timezone: String,
    pub locale: String,
    pub keymap: String,
    /// Unattended mode: no prompts, no confirmation gates
    pub automated: bool,
    pub enable_firewall: bool,
    pub install_dotfiles: bool,
    pub dotfiles_url: String,
    /// Declared setup script path inside the clone, run without a shell.
    /// Empty means clone-only.
    pub dotfiles_setup: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            profile: "usb-256gb".into(),
            device: PathBuf::new(),
            hostname: "archusb".into(),
            username: String::new(),
            root_password: String::new(),
            user_password: String::new(),
            timezone: "UTC".into(),
            locale: "en_US.UTF-8".into(),
            keymap: "us".into(),
            automated: false,
            enable_firewall: true,
            install_dotfiles: false,
            dotfiles_url: String::new(),
            dotfiles_setup: String::new(),
        }
    }
}

pub fn valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 63 {
        return false;
    }
    if s.starts_with('-') || s.ends_with('-') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn valid_username(s: &str) -> bool {
    if s.is_empty() || s.len() > 32 {
        return false;
    }
    let mut chars = s.chars();
    let first = chars.next().unwrap_or(' ');
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

impl InstallConfig {
    /// Format checks only; nothing here touches the system.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.device.as_os_str().is_empty() {
            return Err(ValidationError::MissingDevice);
        }
        if !valid_hostname(&self.hostname) {
            return Err(ValidationError::InvalidHostname(self.hostname.clone()));
        }
        if !valid_username(&self.username) {
            return Err(ValidationError::InvalidUsername(self.username.clone()));
        }
        if self.root_password.is_empty() {
            return Err(ValidationError::EmptyPassword("root"));
        }
        if self.user_password.is_empty() {
            return Err(ValidationError::EmptyPassword("user"));
        }
        if self.install_dotfiles && self.dotfiles_url.is_empty() {
            return Err(ValidationError::MissingDotfilesUrl);
        }
        Ok(())
    }

    /// Serialize to `KEY="value"` lines, the format shared by template files
    /// and checkpoint snapshots.
    pub fn to_kv_string(&self) -> Result<String> {
        let mut out = String::new();
        let mut push = |key: &str, value: &str| -> Result<()> {
            if value.contains('"') || value.contains('\n') {
                anyhow::bail!("config value for {} may not contain quotes or newlines", key);
            }
            writeln!(out, "{}=\"{}\"", key, value)?;
            Ok(())
        };

        push("PROFILE", &self.profile)?;
        push("DEVICE", &self.device.to_string_lossy())?;
        push("HOSTNAME", &self.hostname)?;
        push("USERNAME", &self.username)?;
        push("ROOT_PASSWORD", &self.root_password)?;
        push("USER_PASSWORD", &self.user_password)?;
        push("TIMEZONE", &self.timezone)?;
        push("LOCALE", &self.locale)?;
        push("KEYMAP", &self.keymap)?;
        push("AUTOMATED", bool_str(self.automated))?;
        push("ENABLE_FIREWALL", bool_str(self.enable_firewall))?;
        push("INSTALL_DOTFILES", bool_str(self.install_dotfiles))?;
        push("DOTFILES_URL", &self.dotfiles_url)?;
        push("DOTFILES_SETUP", &self.dotfiles_setup)?;

        Ok(out)
    }

    /// Parse `KEY="value"` lines. Comments, blank lines, and unknown keys
    /// are ignored; missing keys keep their defaults.
    pub fn from_kv_str(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, raw)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(raw.trim());

            match key.trim() {
                "PROFILE" => config.profile = value.into(),
                "DEVICE" => config.device = PathBuf::from(value),
                "HOSTNAME" => config.hostname = value.into(),
                "USERNAME" => config.username = value.into(),
                "ROOT_PASSWORD" => config.root_password = value.into(),
                "USER_PASSWORD" => config.user_password = value.into(),
                "TIMEZONE" => config.timezone = value.into(),
                "LOCALE" => config.locale = value.into(),
                "KEYMAP" => config.keymap = value.into(),
                "AUTOMATED" => config.automated = value == "true",
                "ENABLE_FIREWALL" => config.enable_firewall = value == "true",
                "INSTALL_DOTFILES" => config.install_dotfiles = value == "true",
                "DOTFILES_URL" => config.dotfiles_url = value.into(),
                "DOTFILES_SETUP" => config.dotfiles_setup = value.into(),
                _ => {}
            }
        }

        config
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_kv_string()?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config template {}", path.display()))?;
        Ok(Self::from_kv_str(&content))
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> InstallConfig {
        InstallConfig {
            device: PathBuf::from("/dev/sdb"),
            username: "tester".into(),
            root_password: "rootpw".into(),
            user_password: "userpw".into(),
            ..InstallConfig::default()
        }
    }

    #[test]
    fn hostname_charset() {
        assert!(valid_hostname("archusb"));
        assert!(valid_hostname("my-box-2"));
        assert!(!valid_hostname(""));
        assert!(!valid_hostname("-leading"));
        assert!(!valid_hostname("trailing-"));
        assert!(!valid_hostname("Upper"));
        assert!(!valid_hostname("under_score"));
        assert!(!valid_hostname(&"x".repeat(64)));
    }

    #[test]
    fn username_charset() {
        assert!(valid_username("arch"));
        assert!(valid_username("_svc"));
        assert!(valid_username("dev-user2"));
        assert!(!valid_username(""));
        assert!(!valid_username("2abc"));
        assert!(!valid_username("-dash"));
        assert!(!valid_username("CAPS"));
        assert!(!valid_username(&"a".repeat(33)));
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert_eq!(valid_config().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_missing_device() {
        let mut config = valid_config();
        config.device = PathBuf::new();
        assert_eq!(config.validate(), Err(ValidationError::MissingDevice));
    }

    #[test]
    fn validate_rejects_empty_passwords() {
        let mut config = valid_config();
        config.user_password.clear();
        assert_eq!(config.validate(), Err(ValidationError::EmptyPassword("user")));
    }

    #[test]
    fn validate_requires_url_when_dotfiles_enabled() {
        let mut config = valid_config();
        config.install_dotfiles = true;
        assert_eq!(config.validate(), Err(ValidationError::MissingDotfilesUrl));

        config.dotfiles_url = "https://github.com/user/dots".into();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn kv_round_trip() {
        let mut config = valid_config();
        config.install_dotfiles = true;
        config.dotfiles_url = "https://github.com/user/dots".into();
        config.dotfiles_setup = "install.sh".into();
        config.enable_firewall = false;

        let text = config.to_kv_string().unwrap();
        let parsed = InstallConfig::from_kv_str(&text);
        assert_eq!(parsed, config);
    }

    #[test]
    fn parse_tolerates_comments_and_unknown_keys() {
        let text = r#"
# template written by hand
HOSTNAME="travelbox"
SOME_FUTURE_KEY="ignored"

ENABLE_FIREWALL="false"
"#;
        let parsed = InstallConfig::from_kv_str(text);
        assert_eq!(parsed.hostname, "travelbox");
        assert!(!parsed.enable_firewall);
        // untouched keys keep defaults
        assert_eq!(parsed.timezone, "UTC");
    }

    #[test]
    fn parse_accepts_unquoted_values() {
        let parsed = InstallConfig::from_kv_str("KEYMAP=de\n");
        assert_eq!(parsed.keymap, "de");
    }

    #[test]
    fn save_rejects_embedded_quotes() {
        let mut config = valid_config();
        config.hostname = "evil\"name".into();
        assert!(config.to_kv_string().is_err());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.conf");

        let config = valid_config();
        config.save(&path).unwrap();
        let loaded = InstallConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
