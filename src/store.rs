//! Manifest persistence and change detection.
//!
//! The manifest on disk is the only state normpic keeps between runs, so
//! it is never left half-written: [`save`] writes a temporary file in the
//! same directory, syncs it and renames it over the old one. A crash or an
//! error at any point leaves either the old manifest or the new one, never a
//! mixture.
//!
//! Loading is lenient. [`load`] treats a missing, unparsable or invalid
//! manifest as "no previous run" (the next run simply rebuilds everything);
//! [`load_required`] surfaces the reason for commands that need it.

use crate::manifest::{Manifest, PhotoRecord};
use crate::schema::{self, ValidationError};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest file name within the destination directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest file name written by dry runs.
pub const DRYRUN_FILE: &str = "manifest.dryrun.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Where a run reads and writes its manifest.
pub fn manifest_path(dest_dir: &Path, dry_run: bool) -> PathBuf {
    dest_dir.join(if dry_run { DRYRUN_FILE } else { MANIFEST_FILE })
}

/// Load and validate a manifest, reporting why it could not be used.
pub fn load_required(path: &Path) -> Result<Manifest, StoreError> {
    let content = fs::read_to_string(path)?;
    let doc: serde_json::Value = serde_json::from_str(&content)?;
    schema::validate(&doc)?;
    Ok(serde_json::from_value(doc)?)
}

/// Load a manifest, or `None` if there is no usable one at `path`.
pub fn load(path: &Path) -> Option<Manifest> {
    if !path.exists() {
        log::debug!("no previous manifest at {}", path.display());
        return None;
    }
    match load_required(path) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            log::warn!("ignoring manifest {}: {e}", path.display());
            None
        }
    }
}

/// Serialize, optionally validate, and atomically replace `path`.
pub fn save(manifest: &Manifest, path: &Path, validate: bool) -> Result<(), StoreError> {
    if validate {
        schema::validate(&serde_json::to_value(manifest)?)?;
    }
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    write_atomic(path, json.as_bytes(), |from, to| fs::rename(from, to))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn write_temp(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Write `bytes` next to `path`, then move it into place with `rename`.
///
/// The temporary file is removed if any step fails.
fn write_atomic<R>(path: &Path, bytes: &[u8], rename: R) -> io::Result<()>
where
    R: FnOnce(&Path, &Path) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let tmp = dir.join(format!(
        ".{}.tmp-{}",
        name.to_string_lossy(),
        std::process::id()
    ));

    let result = write_temp(&tmp, bytes).and_then(|()| rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;
    sync_dir(dir)
}

/// Flush the directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

// =============================================================================
// Change detection
// =============================================================================

/// Differences between two manifests, keyed by destination filename.
///
/// Every list is sorted. A name is in at most one list: `modified` (content
/// hash changed) wins over `metadata_changed` (timestamp, camera or GPS
/// changed with identical content).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    pub metadata_changed: Vec<String>,
}

impl ManifestDiff {
    /// Diff against no previous manifest: everything is new.
    pub fn all_added(manifest: &Manifest) -> Self {
        let mut added: Vec<String> = manifest.pics.iter().map(|p| p.dest_path.clone()).collect();
        added.sort();
        Self {
            added,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.metadata_changed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.metadata_changed.len()
    }
}

fn metadata_differs(a: &PhotoRecord, b: &PhotoRecord) -> bool {
    a.timestamp != b.timestamp || a.camera != b.camera || a.gps != b.gps
}

fn index_by_dest(manifest: &Manifest) -> HashMap<&str, &PhotoRecord> {
    manifest
        .pics
        .iter()
        .map(|p| (p.dest_path.as_str(), p))
        .collect()
}

/// Compare two manifests.
pub fn diff(old: &Manifest, new: &Manifest) -> ManifestDiff {
    let mut out = ManifestDiff::default();
    let old_index = index_by_dest(old);
    let new_index = index_by_dest(new);

    for pic in &new.pics {
        match old_index.get(pic.dest_path.as_str()) {
            None => out.added.push(pic.dest_path.clone()),
            Some(prev) if prev.hash != pic.hash => out.modified.push(pic.dest_path.clone()),
            Some(prev) if metadata_differs(prev, pic) => {
                out.metadata_changed.push(pic.dest_path.clone())
            }
            Some(_) => {}
        }
    }
    for pic in &old.pics {
        if !new_index.contains_key(pic.dest_path.as_str()) {
            out.removed.push(pic.dest_path.clone());
        }
    }

    out.added.sort();
    out.removed.sort();
    out.modified.sort();
    out.metadata_changed.sort();
    out
}
