//! Locating the DWARF executable inside a `.dSYM` bundle or `.xcarchive`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DSYM_SUFFIX: &str = ".dSYM";
const APP_SUFFIX: &str = ".app";
const DWARF_DIR: &str = "Contents/Resources/DWARF";

/// Name of the binary a bundle describes: `Foo.app.dSYM` gives `Foo`.
pub fn app_name(bundle: &Path) -> Option<String> {
    let name = bundle.file_name()?.to_str()?;
    let name = name.strip_suffix(DSYM_SUFFIX).unwrap_or(name);
    let name = name.strip_suffix(APP_SUFFIX).unwrap_or(name);
    Some(name.to_owned())
}

/// Finds `<bundle>/Contents/Resources/DWARF/<app name>`, falling back to the same
/// check inside each immediate `*.dSYM` child. Does not search deeper.
pub fn find_dwarf_executable(bundle: &Path) -> Option<PathBuf> {
    let name = app_name(bundle)?;

    if let Some(found) = dwarf_entry(bundle, &name) {
        return Some(found);
    }

    sorted_entries(bundle)
        .into_iter()
        .filter(|path| has_dsym_suffix(path) && path.is_dir())
        .find_map(|nested| dwarf_entry(&nested, &name))
}

/// As [`find_dwarf_executable`], reporting a lookup failure as an error.
pub fn require_dwarf_executable(bundle: &Path) -> Result<PathBuf> {
    find_dwarf_executable(bundle).ok_or_else(|| Error::LookupNotFound(bundle.to_path_buf()))
}

/// The `.app.dSYM` bundle for an archive. A path that already is one is returned as is;
/// otherwise the first matching entry of `<archive>/dSYMs` is used.
pub fn locate_in_archive(archive: &Path) -> Result<PathBuf> {
    let is_app_dsym = archive
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.ends_with(".app.dSYM"));
    if is_app_dsym {
        return Ok(archive.to_path_buf());
    }

    let dsyms = archive.join("dSYMs");
    sorted_entries(&dsyms)
        .into_iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| !name.starts_with('.') && name.contains(".app.dSYM"))
        })
        .ok_or_else(|| Error::LookupNotFound(archive.to_path_buf()))
}

fn dwarf_entry(bundle: &Path, name: &str) -> Option<PathBuf> {
    let candidate = bundle.join(DWARF_DIR).join(name);
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "found DWARF executable");
        Some(candidate)
    } else {
        None
    }
}

fn has_dsym_suffix(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "dSYM")
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read) => read.filter_map(|entry| entry.ok()).map(|e| e.path()).collect(),
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "cannot list directory");
            Vec::new()
        }
    };
    entries.sort();
    entries
}
