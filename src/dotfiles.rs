//! Dotfiles deployment: clone with SSH-then-HTTPS fallback, backup of any
//! existing directory, and an optional declared setup script.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::cmd;

#[derive(Debug, Clone, PartialEq)]
pub struct DotfilesSpec {
    pub url: String,
    /// Path of a setup script inside the clone, executed without a shell.
    /// None means clone-only.
    pub setup_script: Option<String>,
}

/// Rewrite a GitHub HTTPS URL to its SSH form:
/// `https://github.com/owner/repo[.git]` -> `git@github.com:owner/repo`.
/// Anything else returns None and is cloned as given.
pub fn ssh_url_from_https(url: &str) -> Option<String> {
    let rest = url.strip_prefix("https://github.com/")?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let mut segments = rest.split('/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;
    if segments.next().is_some() {
        return None;
    }

    Some(format!("git@github.com:{}/{}", owner, repo))
}

/// Backup path for a pre-existing dotfiles directory.
pub fn backup_path(dir: &Path, timestamp: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "dotfiles".into());
    dir.with_file_name(format!("{}.backup-{}", name, timestamp))
}

fn clone(url: &str, dest: &Path) -> Result<()> {
    cmd::run("git", ["clone", "--depth", "1", url, &dest.to_string_lossy()])
}

/// Clone the repository into `dest`, preferring SSH for GitHub HTTPS URLs
/// and falling back to the original URL, then run the declared setup
/// script if one is configured.
pub fn install(spec: &DotfilesSpec, dest: &Path) -> Result<()> {
    if dest.exists() {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let backup = backup_path(dest, &timestamp);
        println!(
            "Existing {} moved to {}",
            dest.display(),
            backup.display()
        );
        std::fs::rename(dest, &backup)
            .with_context(|| format!("Failed to back up {}", dest.display()))?;
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    match ssh_url_from_https(&spec.url) {
        Some(ssh_url) => {
            if let Err(e) = clone(&ssh_url, dest) {
                tracing::warn!(url = %ssh_url, error = %e, "SSH clone failed, falling back to HTTPS");
                println!("Warning: SSH clone failed, retrying over HTTPS");
                clone(&spec.url, dest)
                    .with_context(|| format!("Failed to clone {}", spec.url))?;
            }
        }
        None => {
            clone(&spec.url, dest).with_context(|| format!("Failed to clone {}", spec.url))?;
        }
    }

    if let Some(script) = &spec.setup_script {
        let script_path = dest.join(script);
        if !script_path.is_file() {
            anyhow::bail!(
                "Declared setup script {} not found in clone",
                script_path.display()
            );
        }
        // Run via the interpreter with the clone as cwd; the script path is
        // an argv element, never interpolated into a shell string.
        cmd::run_in(dest, "/bin/bash", [&*script_path.to_string_lossy()])
            .with_context(|| format!("Setup script {} failed", script))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_plain_github_https() {
        assert_eq!(
            ssh_url_from_https("https://github.com/owner/repo").as_deref(),
            Some("git@github.com:owner/repo")
        );
    }

    #[test]
    fn rewrites_dot_git_and_trailing_slash() {
        assert_eq!(
            ssh_url_from_https("https://github.com/owner/repo.git").as_deref(),
            Some("git@github.com:owner/repo")
        );
        assert_eq!(
            ssh_url_from_https("https://github.com/owner/repo/").as_deref(),
            Some("git@github.com:owner/repo")
        );
    }

    #[test]
    fn leaves_non_github_urls_alone() {
        assert_eq!(ssh_url_from_https("https://gitlab.com/owner/repo"), None);
        assert_eq!(ssh_url_from_https("http://github.com/owner/repo"), None);
        assert_eq!(ssh_url_from_https("git@github.com:owner/repo"), None);
    }

    #[test]
    fn rejects_incomplete_or_deep_paths() {
        assert_eq!(ssh_url_from_https("https://github.com/owner"), None);
        assert_eq!(ssh_url_from_https("https://github.com/"), None);
        assert_eq!(
            ssh_url_from_https("https://github.com/owner/repo/tree/main"),
            None
        );
    }

    #[test]
    fn backup_path_appends_timestamp_suffix() {
        let backup = backup_path(Path::new("/home/u/.dotfiles"), "20260807-120000");
        assert_eq!(
            backup,
            PathBuf::from("/home/u/.dotfiles.backup-20260807-120000")
        );
    }
}
