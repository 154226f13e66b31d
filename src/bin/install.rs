use anyhow::Result;
use std::env;
use std::path::Path;

use archusb::checkpoint::{Checkpoint, Phase};
use archusb::cli;
use archusb::disk;
use archusb::install::Installer;
use archusb::logging;
use archusb::paths;
use archusb::preflight;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let parsed = match cli::parse_install_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            print!("{}", cli::INSTALL_USAGE);
            std::process::exit(1);
        }
    };

    if parsed.help {
        print!("{}", cli::INSTALL_USAGE);
        return;
    }

    if let Err(e) = run(parsed) {
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: cli::InstallArgs) -> Result<()> {
    if !nix::unistd::Uid::effective().is_root() {
        anyhow::bail!("archusb-install must be run as root (use sudo)");
    }

    logging::init(&paths::LOG_FILE)?;

    println!("\n=== Arch USB Installer ===\n");

    let checkpoint_path = Path::new(paths::CHECKPOINT_FILE);
    let existing = Checkpoint::load(checkpoint_path)?;

    let (config, profile, completed) = match existing {
        Some(checkpoint) => {
            let resume = if args.automated || checkpoint.config.automated {
                true
            } else {
                cli::confirm_resume(&checkpoint)?
            };

            if resume {
                let profile = cli::resolve_profile(&args, &checkpoint.config)?;
                (checkpoint.config.clone(), profile, Some(checkpoint.phase))
            } else {
                Checkpoint::clear(checkpoint_path)?;
                let (config, profile) = cli::gather_config(&args)?;
                (config, profile, None)
            }
        }
        None => {
            let (config, profile) = cli::gather_config(&args)?;
            (config, profile, None)
        }
    };

    if completed == Some(Phase::InstallationComplete) {
        println!("Previous installation already completed.");
        println!("Delete {} to start a new one.", checkpoint_path.display());
        return Ok(());
    }

    println!("\n=== Preflight Checks ===\n");
    let device_size = disk::device_size(&config.device)?;
    let report = preflight::run_all(device_size, &profile);
    report.print_summary();
    if !report.is_ok() {
        anyhow::bail!("{} preflight check(s) failed", report.errors().len());
    }

    // Only a fresh run needs the destructive gate; a resumed run already
    // passed it before its first checkpoint was written.
    if completed.is_none() {
        cli::print_summary(&config, &profile);
        if !config.automated && !cli::confirm_destruction()? {
            println!("Aborted.");
            return Ok(());
        }
        Checkpoint::new(Phase::UserInputComplete, &config).save(checkpoint_path)?;
    }

    Installer::new(config, profile).run(completed)?;

    println!("\n=== Installation Complete ===\n");
    println!("You can now reboot into the new system.");
    println!("Remember to remove the installation media first.\n");

    Ok(())
}
