//! Finding bundle directories on disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use quire_shared::{QuireError, Result};

use crate::assembler::bundle_key;
use crate::ignore::IgnoreFilter;

/// Directories under `root` that directly hold at least one non-ignored file,
/// in path order.
///
/// `root` itself never counts. An ignored directory name prunes its subtree.
pub fn walk_bundle_dirs(root: &Path, ignore: &IgnoreFilter) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !ignore.is_ignored(&entry.file_name().to_string_lossy()));

    let mut dirs = BTreeSet::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            QuireError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            if parent != root {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    Ok(dirs.into_iter().collect())
}

/// Every bundle under `root` as `(key, directory)`.
pub fn bundles_under(root: &Path, ignore: &IgnoreFilter) -> Result<Vec<(String, PathBuf)>> {
    Ok(walk_bundle_dirs(root, ignore)?
        .into_iter()
        .map(|dir| {
            let key = bundle_key(dir.strip_prefix(root).unwrap_or(&dir));
            (key, dir)
        })
        .collect())
}
