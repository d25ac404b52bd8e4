//! Path normalization shared by the Index, Scanner, and Action Executor.
//!
//! One canonicalization is applied everywhere a path is compared or stored: absolute, and
//! case-folded on platforms whose filesystem is case-insensitive (Windows, legacy macOS HFS+).
//! Linux ext4/btrfs/xfs are case-sensitive, so no folding happens there.

use std::path::{Path, PathBuf};

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn normalize_for_compare(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn normalize_for_compare(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Resolve `path` to an absolute path without requiring it to exist (unlike `canonicalize`,
/// which fails on missing components and resolves symlinks we intentionally never follow).
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
