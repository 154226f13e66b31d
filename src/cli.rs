//! Installer front end: flag parsing, interactive prompts, and the
//! confirmation gates. Both the prompted and the templated path produce
//! the same `InstallConfig`; the pipeline never knows which one ran.

use anyhow::{bail, Context, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::Checkpoint;
use crate::config::{self, InstallConfig};
use crate::disk;
use crate::profile::Profile;
use crate::util;

/// Command line errors shared by both binaries: print usage, exit 1.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("unrecognized flag: {0}")]
    UnknownFlag(String),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("--version is required in CLI mode")]
    MissingVersion,
    #[error("exactly one of --local or --remote must be given")]
    MissingSource,
    #[error("unknown version '{0}' (expected 256gb, 32gb, or both)")]
    BadVersion(String),
    #[error("unknown profile '{0}' (expected 256gb or 32gb)")]
    BadProfile(String),
}

/// Parsed installer flags. Everything is optional; prompts fill the gaps
/// unless `--automated` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallArgs {
    pub help: bool,
    pub automated: bool,
    pub profile: Option<String>,
    pub profile_file: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub device: Option<PathBuf>,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub keymap: Option<String>,
}

pub const INSTALL_USAGE: &str = r#"archusb-install - Arch Linux USB installer

Usage:
    archusb-install [options]

Options:
    --profile <256gb|32gb>   Size profile (default: 256gb)
    --profile-file <path>    Load a custom profile descriptor (TOML)
    --config <path>          Load an installation template (KEY="value" lines)
    --automated              Unattended mode: no prompts, no confirmation gate
    --device <path>          Target block device
    --hostname <name>        System hostname
    --username <name>        Login user to create
    --timezone <tz>          e.g. Europe/Berlin
    --locale <locale>        e.g. en_US.UTF-8
    --keymap <map>           Console keymap
    -h, --help               Show this help and exit
"#;

pub fn parse_install_args(args: &[String]) -> Result<InstallArgs, UsageError> {
    let mut parsed = InstallArgs::default();
    let mut iter = args.iter();

    let mut value = |flag: &str, iter: &mut std::slice::Iter<'_, String>| {
        iter.next()
            .cloned()
            .ok_or_else(|| UsageError::MissingValue(flag.to_string()))
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--automated" => parsed.automated = true,
            "--profile" => {
                let name = value("--profile", &mut iter)?;
                if Profile::builtin(&name).is_none() {
                    return Err(UsageError::BadProfile(name));
                }
                parsed.profile = Some(name);
            }
            "--profile-file" => parsed.profile_file = Some(value("--profile-file", &mut iter)?.into()),
            "--config" => parsed.template = Some(value("--config", &mut iter)?.into()),
            "--device" => parsed.device = Some(value("--device", &mut iter)?.into()),
            "--hostname" => parsed.hostname = Some(value("--hostname", &mut iter)?),
            "--username" => parsed.username = Some(value("--username", &mut iter)?),
            "--timezone" => parsed.timezone = Some(value("--timezone", &mut iter)?),
            "--locale" => parsed.locale = Some(value("--locale", &mut iter)?),
            "--keymap" => parsed.keymap = Some(value("--keymap", &mut iter)?),
            other => return Err(UsageError::UnknownFlag(other.to_string())),
        }
    }

    Ok(parsed)
}

/// Build the run configuration: template first, flag overrides second,
/// prompts for whatever is still missing (unless automated). The resolved
/// profile is returned too, since its defaults seed the prompts.
pub fn gather_config(args: &InstallArgs) -> Result<(InstallConfig, Profile)> {
    let mut config = match &args.template {
        Some(path) => InstallConfig::load(path)?,
        None => InstallConfig::default(),
    };

    if args.automated {
        config.automated = true;
    }
    if let Some(profile) = &args.profile {
        // normalize the CLI alias to the canonical name
        config.profile = Profile::builtin(profile)
            .map(|p| p.name)
            .unwrap_or_else(|| profile.clone());
    }
    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if let Some(hostname) = &args.hostname {
        config.hostname = hostname.clone();
    }
    if let Some(username) = &args.username {
        config.username = username.clone();
    }
    if let Some(timezone) = &args.timezone {
        config.timezone = timezone.clone();
    }
    if let Some(locale) = &args.locale {
        config.locale = locale.clone();
    }
    if let Some(keymap) = &args.keymap {
        config.keymap = keymap.clone();
    }

    let profile = resolve_profile(args, &config)?;
    if config.dotfiles_url.is_empty() {
        if let Some(url) = &profile.dotfiles_url {
            config.dotfiles_url = url.clone();
        }
    }

    if !config.automated {
        prompt_missing(&mut config)?;
    }

    config.validate()?;
    Ok((config, profile))
}

/// Resolve the profile descriptor for this run.
pub fn resolve_profile(args: &InstallArgs, config: &InstallConfig) -> Result<Profile> {
    if let Some(path) = &args.profile_file {
        return Profile::from_file(path);
    }
    Profile::builtin(&config.profile)
        .with_context(|| format!("Unknown profile '{}'", config.profile))
}

fn prompt_missing(config: &mut InstallConfig) -> Result<()> {
    let theme = ColorfulTheme::default();

    if config.device.as_os_str().is_empty() {
        config.device = select_device(&theme)?;
    }

    loop {
        config.hostname = Input::with_theme(&theme)
            .with_prompt("Hostname")
            .default(config.hostname.clone())
            .interact_text()?;
        if config::valid_hostname(&config.hostname) {
            break;
        }
        println!("Invalid hostname: use lowercase letters, digits, and hyphens");
    }

    loop {
        let default = if config.username.is_empty() {
            "arch".to_string()
        } else {
            config.username.clone()
        };
        config.username = Input::with_theme(&theme)
            .with_prompt("Username")
            .default(default)
            .interact_text()?;
        if config::valid_username(&config.username) {
            break;
        }
        println!("Invalid username: use lowercase letters, digits, '_' and '-'");
    }

    if config.root_password.is_empty() {
        config.root_password = prompt_password_confirm("Root password")?;
    }
    if config.user_password.is_empty() {
        config.user_password = prompt_password_confirm(&format!("Password for {}", config.username))?;
    }

    config.timezone = Input::with_theme(&theme)
        .with_prompt("Timezone")
        .default(config.timezone.clone())
        .interact_text()?;
    config.locale = Input::with_theme(&theme)
        .with_prompt("Locale")
        .default(config.locale.clone())
        .interact_text()?;
    config.keymap = Input::with_theme(&theme)
        .with_prompt("Console keymap")
        .default(config.keymap.clone())
        .interact_text()?;

    config.enable_firewall = Confirm::with_theme(&theme)
        .with_prompt("Enable firewall (ufw)")
        .default(config.enable_firewall)
        .interact()?;

    config.install_dotfiles = Confirm::with_theme(&theme)
        .with_prompt("Deploy a dotfiles repository")
        .default(config.install_dotfiles)
        .interact()?;
    if config.install_dotfiles {
        config.dotfiles_url = Input::with_theme(&theme)
            .with_prompt("Dotfiles repository URL")
            .default(config.dotfiles_url.clone())
            .interact_text()?;
        config.dotfiles_setup = Input::with_theme(&theme)
            .with_prompt("Setup script inside the repo (empty for clone-only)")
            .default(config.dotfiles_setup.clone())
            .allow_empty(true)
            .interact_text()?;
    }

    Ok(())
}

fn select_device(theme: &ColorfulTheme) -> Result<PathBuf> {
    let devices = disk::list_block_devices()?;
    if devices.is_empty() {
        bail!("No block devices found");
    }

    let items: Vec<String> = devices
        .iter()
        .map(|d| {
            format!(
                "{} - {} - {}{}",
                d.path,
                util::format_gb(d.size_bytes),
                d.model.as_deref().unwrap_or("Unknown"),
                if d.removable { " (removable)" } else { "" }
            )
        })
        .collect();

    let index = Select::with_theme(theme)
        .with_prompt("Target device (ALL DATA WILL BE ERASED)")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(PathBuf::from(&devices[index].path))
}

fn prompt_password_confirm(name: &str) -> Result<String> {
    loop {
        let pass1 = rpassword::prompt_password(format!("{}: ", name))
            .context("Failed to read password")?;

        if pass1.is_empty() {
            println!("Password cannot be empty");
            continue;
        }

        let pass2 = rpassword::prompt_password(format!("Confirm {}: ", name.to_lowercase()))
            .context("Failed to read password")?;

        if pass1 != pass2 {
            println!("Passwords do not match");
            continue;
        }

        return Ok(pass1);
    }
}

pub fn print_summary(config: &InstallConfig, profile: &Profile) {
    println!("\n=== Summary ===");
    println!("  Profile:    {} ({})", profile.name, profile.label);
    println!("  Device:     {}", config.device.display());
    println!("  Hostname:   {}", config.hostname);
    println!("  Username:   {}", config.username);
    println!("  Timezone:   {}", config.timezone);
    println!("  Locale:     {}", config.locale);
    println!("  Keymap:     {}", config.keymap);
    println!(
        "  Firewall:   {}",
        if config.enable_firewall { "enabled" } else { "disabled" }
    );
    if config.install_dotfiles {
        println!("  Dotfiles:   {}", config.dotfiles_url);
    } else {
        println!("  Dotfiles:   none");
    }
    println!(
        "\n{} This will DESTROY all data on {}\n",
        style("WARNING:").red().bold(),
        config.device.display()
    );
}

/// The destructive gate: the user must literally type YES.
pub fn confirm_destruction() -> Result<bool> {
    let answer: String = Input::new()
        .with_prompt("Type YES to continue")
        .allow_empty(true)
        .interact_text()?;
    Ok(answer == "YES")
}

/// Ask whether to pick up a previous run from its checkpoint.
pub fn confirm_resume(checkpoint: &Checkpoint) -> Result<bool> {
    println!(
        "Found a previous installation attempt (phase: {}, device: {}).",
        checkpoint.phase.as_tag(),
        checkpoint.config.device.display()
    );
    println!("Declining deletes the checkpoint and restarts from the beginning.");
    Ok(Confirm::new()
        .with_prompt("Resume from the last checkpoint?")
        .default(true)
        .interact()?)
}
