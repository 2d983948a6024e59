use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const RESERVED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are invalid in file names with `_`.
///
/// No truncation or normalization; distinct names may collide.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| if RESERVED_CHARS.contains(&ch) { '_' } else { ch })
        .collect()
}

/// `<output_dir>/<sanitized space name>/<sanitized title>.txt`
pub fn page_output_path(output_dir: &Path, space_name: &str, title: &str) -> PathBuf {
    output_dir
        .join(sanitize_filename(space_name))
        .join(format!("{}.txt", sanitize_filename(title)))
}

/// Write a page file, creating its directory on demand. Existing files are overwritten.
pub fn write_page_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))
}

pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
