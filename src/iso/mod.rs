//! ISO build orchestration: resolve a source tree, assemble an archiso
//! profile per selected version, run mkarchiso, and collect the renamed
//! artifacts. Both front ends feed this module the same `BuildRequest`.

pub mod cli;
pub mod interactive;

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::cmd;
use crate::paths;
use crate::util;

/// The two installer payloads an ISO can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoVersion {
    Full256,
    Compact32,
}

impl IsoVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsoVersion::Full256 => "256gb",
            IsoVersion::Compact32 => "32gb",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "256gb" => Some(IsoVersion::Full256),
            "32gb" => Some(IsoVersion::Compact32),
            _ => None,
        }
    }
}

/// Version selector: one profile or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelect {
    One(IsoVersion),
    Both,
}

impl VersionSelect {
    pub fn versions(&self) -> Vec<IsoVersion> {
        match self {
            VersionSelect::One(v) => vec![*v],
            VersionSelect::Both => vec![IsoVersion::Full256, IsoVersion::Compact32],
        }
    }
}

/// Where the installer payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    Local(PathBuf),
    Remote(String),
}

/// Everything one build invocation needs, regardless of which front end
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub source: BuildSource,
    pub versions: VersionSelect,
    pub output_dir: PathBuf,
    pub name: String,
}

/// Output artifact name for a version.
pub fn artifact_name(name: &str, version: IsoVersion) -> String {
    format!("{}-{}.iso", name, version.as_str())
}

/// Script started on login in the live environment.
fn autostart_script(version: IsoVersion) -> String {
    format!(
        "#!/bin/bash\n\
         # Launched from the live environment's login shell\n\
         echo \"Arch USB installer ({} profile)\"\n\
         echo \"Run 'archusb-install --profile {}' to begin.\"\n",
        version.as_str(),
        version.as_str()
    )
}

/// Hook mkarchiso runs inside the image root during assembly.
const CUSTOMIZE_HOOK: &str = "#!/bin/bash\n\
set -e\n\
# Keep journald quiet on the read-only live medium\n\
mkdir -p /etc/systemd/journald.conf.d\n\
printf '[Journal]\\nStorage=volatile\\n' > /etc/systemd/journald.conf.d/volatile.conf\n";

/// Run the whole build. Returns the final artifact paths in selection
/// order. The scratch directory is unique per run and removed on drop.
pub fn build(request: &BuildRequest) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&request.output_dir).with_context(|| {
        format!("Failed to create output directory {}", request.output_dir.display())
    })?;

    let scratch = tempfile::Builder::new()
        .prefix("archusb-iso-")
        .tempdir()
        .context("Failed to create scratch directory")?;

    let source_dir = resolve_source(&request.source, scratch.path())?;

    let mut artifacts = Vec::new();
    for version in request.versions.versions() {
        artifacts.push(build_one(&source_dir, version, request, scratch.path())?);
    }

    Ok(artifacts)
}

/// Resolve the payload source to a local directory, cloning if remote.
fn resolve_source(source: &BuildSource, scratch: &Path) -> Result<PathBuf> {
    match source {
        BuildSource::Local(path) => {
            if !path.is_dir() {
                bail!("Source directory {} does not exist", path.display());
            }
            Ok(path.clone())
        }
        BuildSource::Remote(url) => {
            let dest = scratch.join("source");
            cmd::run("git", ["clone", "--depth", "1", url, &dest.to_string_lossy()])
                .with_context(|| format!("Failed to clone {}", url))?;
            Ok(dest)
        }
    }
}

fn build_one(
    source_dir: &Path,
    version: IsoVersion,
    request: &BuildRequest,
    scratch: &Path,
) -> Result<PathBuf> {
    println!("\n=== Building {} ===", artifact_name(&request.name, version));

    let payload = source_dir.join("profiles").join(version.as_str());
    if !payload.is_dir() {
        bail!(
            "Source has no payload for version {} (expected {})",
            version.as_str(),
            payload.display()
        );
    }

    // Start from the stock releng profile, then overlay the payload
    let profile_dir = scratch.join(format!("profile-{}", version.as_str()));
    util::copy_dir_all(Path::new(paths::ARCHISO_BASE_PROFILE), &profile_dir)
        .context("Failed to copy base archiso profile")?;
    util::copy_dir_all(&payload, &profile_dir.join("airootfs"))
        .context("Failed to overlay installer payload")?;

    write_executable(
        &profile_dir.join("airootfs/etc/profile.d/archusb-autostart.sh"),
        &autostart_script(version),
    )?;
    write_executable(
        &profile_dir.join("airootfs/root/customize_airootfs.sh"),
        CUSTOMIZE_HOOK,
    )?;

    let work_dir = scratch.join(format!("work-{}", version.as_str()));
    let out_dir = scratch.join(format!("out-{}", version.as_str()));

    cmd::run(
        "mkarchiso",
        [
            "-v",
            "-w",
            &work_dir.to_string_lossy(),
            "-o",
            &out_dir.to_string_lossy(),
            &profile_dir.to_string_lossy(),
        ],
    )
    .context("mkarchiso failed")?;

    let produced = find_iso(&out_dir)?;
    let final_path = request.output_dir.join(artifact_name(&request.name, version));
    util::move_file(&produced, &final_path)?;

    println!("Created {}", final_path.display());
    tracing::info!(artifact = %final_path.display(), "iso built");
    Ok(final_path)
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))?;
    Ok(())
}

/// mkarchiso names its output itself; pick up whatever .iso it produced.
fn find_iso(dir: &Path) -> Result<PathBuf> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "iso") {
            return Ok(path);
        }
    }
    bail!("mkarchiso produced no .iso in {}", dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_carry_the_version_suffix() {
        assert_eq!(artifact_name("archusb", IsoVersion::Full256), "archusb-256gb.iso");
        assert_eq!(artifact_name("archusb", IsoVersion::Compact32), "archusb-32gb.iso");
    }

    #[test]
    fn both_expands_to_two_versions_in_order() {
        assert_eq!(
            VersionSelect::Both.versions(),
            vec![IsoVersion::Full256, IsoVersion::Compact32]
        );
        assert_eq!(
            VersionSelect::One(IsoVersion::Compact32).versions(),
            vec![IsoVersion::Compact32]
        );
    }

    #[test]
    fn version_parse_round_trip() {
        for version in [IsoVersion::Full256, IsoVersion::Compact32] {
            assert_eq!(IsoVersion::from_str(version.as_str()), Some(version));
        }
        assert_eq!(IsoVersion::from_str("128gb"), None);
    }

    #[test]
    fn autostart_script_mentions_its_profile() {
        let script = autostart_script(IsoVersion::Compact32);
        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("--profile 32gb"));
    }

    #[test]
    fn resolve_source_rejects_missing_local_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let missing = BuildSource::Local(scratch.path().join("nope"));
        assert!(resolve_source(&missing, scratch.path()).is_err());
    }

    #[test]
    fn resolve_source_accepts_existing_local_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let src = scratch.path().join("tree");
        fs::create_dir_all(&src).unwrap();
        let resolved = resolve_source(&BuildSource::Local(src.clone()), scratch.path()).unwrap();
        assert_eq!(resolved, src);
    }

    #[test]
    fn find_iso_picks_up_the_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("build.log"), "log").unwrap();
        fs::write(dir.path().join("arch.iso"), "image").unwrap();
        assert_eq!(find_iso(dir.path()).unwrap(), dir.path().join("arch.iso"));
    }

    #[test]
    fn find_iso_errors_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_iso(dir.path()).is_err());
    }

    #[test]
    fn write_executable_sets_exec_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/hook.sh");
        write_executable(&path, "#!/bin/bash\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
