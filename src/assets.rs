//! Asset directory resolution (component C9, SPEC_FULL.md §4.9). Named
//! out of scope by spec.md §1 as an external collaborator; implemented
//! minimally so the responder binary has a real directory to serve.
//!
//! Grounded on `original_source/server/src/utils.c`'s `get_asset_path`
//! and `get_assets_dir`, hardened against path traversal per DESIGN.md
//! Open Question 9 — the original concatenates the requested name onto
//! the asset root with no validation at all.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::{fs, io};

/// Joins `root` with `requested_name`, rejecting any name that isn't a
/// single plain path component (no `..`, no path separators, no
/// absolute paths). Returns `None` for a name that doesn't resolve to a
/// simple child of `root`.
pub fn resolve_asset_path(root: &Path, requested_name: &str) -> Option<PathBuf> {
    let candidate = Path::new(requested_name);
    let mut components = candidate.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Some(root.join(name)),
        _ => None,
    }
}

/// Lists the names of regular (non-directory) entries directly under
/// `root`, matching the original's "only non-directory entries are
/// listed or served" rule from spec.md §6.
pub fn list_asset_entries(root: &Path) -> io::Result<Vec<OsString>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.file_name());
        }
    }
    entries.sort();
    Ok(entries)
}
