use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// CPU vendor enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
    Unknown,
}

impl CpuVendor {
    /// Microcode package installed alongside the base system
    pub fn microcode_package(&self) -> Option<&'static str> {
        match self {
            CpuVendor::Intel => Some("intel-ucode"),
            CpuVendor::Amd => Some("amd-ucode"),
            CpuVendor::Unknown => None,
        }
    }
}

/// Detect the CPU vendor from /proc/cpuinfo
pub fn detect_cpu_vendor() -> CpuVendor {
    let cpuinfo = match fs::read_to_string("/proc/cpuinfo") {
        Ok(content) => content,
        Err(_) => return CpuVendor::Unknown,
    };

    if cpuinfo.contains("GenuineIntel") {
        CpuVendor::Intel
    } else if cpuinfo.contains("AuthenticAMD") {
        CpuVendor::Amd
    } else {
        CpuVendor::Unknown
    }
}

/// Recursively copy a directory tree. Symlinks are copied as links.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory {}", dst.display()))?;

    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            // Replace any stale link left from a previous overlay pass
            let _ = fs::remove_file(&target);
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }

    Ok(())
}

/// Move a file, falling back to copy+remove when rename crosses filesystems.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    fs::remove_file(src)
        .with_context(|| format!("Failed to remove {}", src.display()))?;

    Ok(())
}

/// Render a byte count as decimal gigabytes, the way drive vendors label them.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intel_microcode_package() {
        assert_eq!(CpuVendor::Intel.microcode_package(), Some("intel-ucode"));
    }

    #[test]
    fn amd_microcode_package() {
        assert_eq!(CpuVendor::Amd.microcode_package(), Some("amd-ucode"));
    }

    #[test]
    fn unknown_has_no_microcode_package() {
        assert_eq!(CpuVendor::Unknown.microcode_package(), None);
    }

    #[test]
    fn format_gb_rounds_to_one_decimal() {
        assert_eq!(format_gb(256_060_514_304), "256.1 GB");
        assert_eq!(format_gb(0), "0.0 GB");
    }

    #[test]
    fn copy_dir_all_copies_nested_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), "payload").unwrap();

        let dest = dst.path().join("out");
        copy_dir_all(src.path(), &dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("a/b/file.txt")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn move_file_moves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.iso");
        let dst = dir.path().join("dst.iso");
        fs::write(&src, "image").unwrap();

        move_file(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "image");
    }
}
