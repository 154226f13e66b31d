//! Interactive front end for the ISO builder. Produces the same
//! `BuildRequest` as the flag parser; the build itself runs on a worker
//! thread so a spinner can report liveness.

use anyhow::{anyhow, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use super::{artifact_name, BuildRequest, BuildSource, IsoVersion, VersionSelect};

/// Prompt for every field of a build request.
pub fn gather_request() -> Result<BuildRequest> {
    let theme = ColorfulTheme::default();

    let source_kind = Select::with_theme(&theme)
        .with_prompt("Installer source")
        .items(&["Local directory", "Remote git repository"])
        .default(0)
        .interact()?;

    let source = if source_kind == 0 {
        let path: String = Input::with_theme(&theme)
            .with_prompt("Path to the installer source tree")
            .interact_text()?;
        BuildSource::Local(PathBuf::from(path))
    } else {
        let url: String = Input::with_theme(&theme)
            .with_prompt("Git URL of the installer source")
            .interact_text()?;
        BuildSource::Remote(url)
    };

    let versions = match Select::with_theme(&theme)
        .with_prompt("Version to package")
        .items(&["256gb", "32gb", "both"])
        .default(0)
        .interact()?
    {
        0 => VersionSelect::One(IsoVersion::Full256),
        1 => VersionSelect::One(IsoVersion::Compact32),
        _ => VersionSelect::Both,
    };

    let output_dir: String = Input::with_theme(&theme)
        .with_prompt("Output directory")
        .default(".".to_string())
        .interact_text()?;

    let name: String = Input::with_theme(&theme)
        .with_prompt("Artifact base name")
        .default("archusb".to_string())
        .interact_text()?;

    Ok(BuildRequest {
        source,
        versions,
        output_dir: PathBuf::from(output_dir),
        name,
    })
}

/// Confirm and run the build with a progress spinner.
pub fn run() -> Result<()> {
    let request = gather_request()?;

    println!("\nWill build:");
    for version in request.versions.versions() {
        println!(
            "  {}",
            request.output_dir.join(artifact_name(&request.name, version)).display()
        );
    }

    if !Confirm::new()
        .with_prompt("Start the build")
        .default(true)
        .interact()?
    {
        println!("Aborted.");
        return Ok(());
    }

    let artifacts = build_with_spinner(request)?;

    println!("\nDone:");
    for artifact in artifacts {
        println!("  {}", artifact.display());
    }
    Ok(())
}

/// The spinner is cosmetic: the foreground thread only polls the worker's
/// liveness and blocks until it finishes.
fn build_with_spinner(request: BuildRequest) -> Result<Vec<PathBuf>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message("Building (mkarchiso output above)...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let handle = std::thread::spawn(move || super::build(&request));

    while !handle.is_finished() {
        std::thread::sleep(Duration::from_millis(200));
    }

    let result = handle
        .join()
        .map_err(|_| anyhow!("build thread panicked"))?
        .context("ISO build failed");

    pb.finish_and_clear();
    result
}
