//! Flag-driven front end for the ISO builder. Parsing is pure: nothing is
//! touched on disk until a complete `BuildRequest` exists.

use std::path::PathBuf;

use super::{BuildRequest, BuildSource, IsoVersion, VersionSelect};
use crate::cli::UsageError;

pub const ISO_USAGE: &str = r#"archusb-iso - package the USB installers into bootable ISO images

Usage:
    archusb-iso                      Interactive mode
    archusb-iso --cli [options]      Flag-driven mode

Options (CLI mode):
    --local <path>           Use a local installer source tree
    --remote <url>           Clone the installer source from a git URL
    --version <256gb|32gb|both>
                             Which installer payload(s) to package (required)
    --output <dir>           Output directory (default: current directory)
    --name <name>            Artifact base name (default: archusb)
    -h, --help               Show this help and exit
"#;

/// Parse the flags following `--cli` into a build request.
pub fn parse(args: &[String]) -> Result<BuildRequest, UsageError> {
    let mut local: Option<PathBuf> = None;
    let mut remote: Option<String> = None;
    let mut version: Option<VersionSelect> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut name: Option<String> = None;

    let mut iter = args.iter();
    let mut value = |flag: &str, iter: &mut std::slice::Iter<'_, String>| {
        iter.next()
            .cloned()
            .ok_or_else(|| UsageError::MissingValue(flag.to_string()))
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--local" => local = Some(value("--local", &mut iter)?.into()),
            "--remote" => remote = Some(value("--remote", &mut iter)?),
            "--version" => {
                let raw = value("--version", &mut iter)?;
                version = Some(match raw.as_str() {
                    "both" => VersionSelect::Both,
                    other => IsoVersion::from_str(other)
                        .map(VersionSelect::One)
                        .ok_or_else(|| UsageError::BadVersion(raw.clone()))?,
                });
            }
            "--output" => output_dir = Some(value("--output", &mut iter)?.into()),
            "--name" => name = Some(value("--name", &mut iter)?),
            other => return Err(UsageError::UnknownFlag(other.to_string())),
        }
    }

    let source = match (local, remote) {
        (Some(path), None) => BuildSource::Local(path),
        (None, Some(url)) => BuildSource::Remote(url),
        _ => return Err(UsageError::MissingSource),
    };

    Ok(BuildRequest {
        source,
        versions: version.ok_or(UsageError::MissingVersion)?,
        output_dir: output_dir.unwrap_or_else(|| PathBuf::from(".")),
        name: name.unwrap_or_else(|| "archusb".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::artifact_name;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn full_cli_invocation_builds_both_artifacts() {
        let request = parse(&args(&[
            "--local", "/src/installers",
            "--version", "both",
            "--output", "/out",
            "--name", "archusb",
        ]))
        .unwrap();

        assert_eq!(request.source, BuildSource::Local(PathBuf::from("/src/installers")));
        assert_eq!(request.output_dir, PathBuf::from("/out"));

        let names: Vec<String> = request
            .versions
            .versions()
            .into_iter()
            .map(|v| artifact_name(&request.name, v))
            .collect();
        assert_eq!(names, vec!["archusb-256gb.iso", "archusb-32gb.iso"]);
    }

    #[test]
    fn missing_version_is_rejected() {
        assert_eq!(
            parse(&args(&["--local", "/src"])),
            Err(UsageError::MissingVersion)
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert_eq!(
            parse(&args(&["--local", "/src", "--version", "128gb"])),
            Err(UsageError::BadVersion("128gb".into()))
        );
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert_eq!(
            parse(&args(&["--frobnicate"])),
            Err(UsageError::UnknownFlag("--frobnicate".into()))
        );
    }

    #[test]
    fn source_must_be_exactly_one_of_local_or_remote() {
        assert_eq!(
            parse(&args(&["--version", "both"])),
            Err(UsageError::MissingSource)
        );
        assert_eq!(
            parse(&args(&[
                "--local", "/a", "--remote", "https://example.com/r.git", "--version", "both",
            ])),
            Err(UsageError::MissingSource)
        );
    }

    #[test]
    fn remote_source_and_defaults() {
        let request = parse(&args(&[
            "--remote",
            "https://github.com/user/installers.git",
            "--version",
            "32gb",
        ]))
        .unwrap();

        assert_eq!(
            request.source,
            BuildSource::Remote("https://github.com/user/installers.git".into())
        );
        assert_eq!(request.versions, VersionSelect::One(IsoVersion::Compact32));
        assert_eq!(request.output_dir, PathBuf::from("."));
        assert_eq!(request.name, "archusb");
    }
}
