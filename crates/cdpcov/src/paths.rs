//! Lexical path helpers
//!
//! Working-set files and sample locations are compared as normalized
//! absolute paths. Normalization is purely lexical so both sides agree even
//! when the files sit behind symlinks.

use std::path::{Component, Path, PathBuf};

/// Resolve `..` and `.` components without touching the filesystem
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
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

/// Make `path` absolute against `base` (or the working directory) and normalize it
#[must_use]
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let joined = if joined.is_absolute() {
        joined
    } else {
        std::env::current_dir().map_or(joined.clone(), |cwd| cwd.join(&joined))
    };
    normalize(&joined)
}

/// `path` relative to `base` using `..` where needed, `/`-separated
///
/// Falls back to `path` itself when the two share no root.
#[must_use]
pub fn display_relative(path: &Path, base: &Path) -> String {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    if path_parts.first() != base_parts.first() {
        return path.to_string_lossy().replace('\\', "/");
    }

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<String> = vec!["..".to_string(); base_parts.len() - common];
    parts.extend(
        path_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
