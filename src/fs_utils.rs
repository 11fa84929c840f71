//! Filesystem helpers shared by the resolver, tracker and watcher
//!
//! - `normalize_path`: lexical normalization so paths from the resolver and
//!   from watcher notifications compare equal
//! - `canonical_dir`: canonicalize a build context without the Windows `\\?\` prefix
//! - `read_lossy`: read file content as UTF-8, replacing invalid sequences
//! - `get_config_base_dir`: platform-appropriate configuration directory

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically: drop `.` components, resolve `..` against the
/// preceding component and strip the Windows extended-length prefix.
///
/// Does not touch the filesystem, so symlinks are left alone.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use layerprof::fs_utils::normalize_path;
///
/// assert_eq!(normalize_path(Path::new("/ctx/./src/../app")), PathBuf::from("/ctx/app"));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let path = strip_verbatim_prefix(path);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize a directory, normalized for comparisons
pub fn canonical_dir(path: &Path) -> io::Result<PathBuf> {
    let canonical = path.canonicalize()?;
    Ok(normalize_path(&canonical))
}

/// Read a file as UTF-8, replacing invalid byte sequences
pub fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Get platform-appropriate configuration base directory.
///
/// - **Windows**: `%APPDATA%\layerprof`
/// - **Unix**: `$XDG_CONFIG_HOME/layerprof` or `~/.config/layerprof`
/// - **Fallback**: current directory + `.layerprof`
pub fn get_config_base_dir() -> PathBuf {
    #[cfg(not(windows))]
    {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg_config.is_empty() {
                return PathBuf::from(xdg_config).join("layerprof");
            }
        }
    }

    if let Some(config) = dirs::config_dir() {
        return config.join("layerprof");
    }

    PathBuf::from(".layerprof")
}

#[cfg(windows)]
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{}", stripped));
    }
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        return PathBuf::from(stripped);
    }
    path.to_path_buf()
}

#[cfg(not(windows))]
fn strip_verbatim_prefix(path: &Path) -> PathBuf {
    path.to_path_buf()
}
