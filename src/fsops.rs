//! Low-level filesystem primitives: content hashing and symlinks.
//!
//! The organize workflow never touches the destination directory directly.
//! It computes a [`LinkPlan`] (pure data) and hands it to [`apply_plan`],
//! which is the only place symlinks are created or removed.
//!
//! ## Symlink semantics
//!
//! - Targets are canonical absolute paths, so links survive the destination
//!   directory being moved relative to the source.
//! - Creation is atomic: a temporary link is made next to the destination
//!   and renamed over it. Readers see either the old link or the new one.
//! - A regular file or directory at the destination is never replaced.
//! - A link that already points at the right target is left alone.

use crate::types::{ErrorType, ProcessingIssue};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Prefix of every content hash stored in the manifest.
pub const HASH_PREFIX: &str = "sha256--";

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Source file does not exist: {0}")]
    SourceMissing(PathBuf),
    #[error("Destination exists and is not a symlink: {0}")]
    Occupied(PathBuf),
}

/// Streaming SHA-256 of a file's contents, rendered as `sha256--<hex>`.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{HASH_PREFIX}{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// True if `dest` is a symlink whose target is the canonical `source`.
pub fn link_points_to(dest: &Path, source: &Path) -> bool {
    match (fs::read_link(dest), fs::canonicalize(source)) {
        (Ok(target), Ok(expected)) => target == expected,
        _ => false,
    }
}

/// Create (or atomically retarget) a symlink at `dest` pointing to `source`.
pub fn create_symlink(source: &Path, dest: &Path) -> Result<(), LinkError> {
    let target =
        fs::canonicalize(source).map_err(|_| LinkError::SourceMissing(source.to_path_buf()))?;

    if let Ok(meta) = fs::symlink_metadata(dest) {
        if !meta.file_type().is_symlink() {
            return Err(LinkError::Occupied(dest.to_path_buf()));
        }
        if fs::read_link(dest).is_ok_and(|current| current == target) {
            return Ok(());
        }
    }

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = parent.join(format!(".{name}.tmp-{}", std::process::id()));
    if fs::symlink_metadata(&temp).is_ok() {
        fs::remove_file(&temp)?;
    }

    make_symlink(&target, &temp)?;
    if let Err(e) = fs::rename(&temp, dest) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

/// Remove `path` if it is a symlink. Returns whether anything was removed.
pub fn remove_symlink(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(path)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Every symlink under `dir` (recursively) whose target no longer resolves.
///
/// A missing or non-directory `dir` yields an empty list. Entries that cannot
/// be read are skipped.
pub fn detect_broken_symlinks(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut broken: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path_is_symlink() && fs::metadata(e.path()).is_err())
        .map(|e| e.into_path())
        .collect();
    broken.sort();
    broken
}

/// One symlink to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Everything the organize run wants changed in the destination directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPlan {
    pub links: Vec<PlannedLink>,
    /// Symlinks for names that no longer exist in the new manifest.
    pub stale: Vec<PathBuf>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.stale.is_empty()
    }
}

/// What [`apply_plan`] did.
#[derive(Debug, Default, PartialEq)]
pub struct LinkReport {
    pub created: usize,
    pub removed: usize,
    /// First failure. Links after it were not attempted.
    pub failure: Option<ProcessingIssue>,
}

/// Apply a plan in order, stopping at the first failed link.
///
/// Stale links are removed only after every planned link succeeded, so a
/// failed run never leaves the destination with fewer links than before.
pub fn apply_plan(plan: &LinkPlan) -> LinkReport {
    let mut report = LinkReport::default();

    for link in &plan.links {
        match create_symlink(&link.source, &link.dest) {
            Ok(()) => {
                log::debug!("linked {} -> {}", link.dest.display(), link.source.display());
                report.created += 1;
            }
            Err(e) => {
                log::error!("failed to link {}: {}", link.dest.display(), e);
                report.failure = Some(ProcessingIssue::new(
                    ErrorType::FilesystemError,
                    link.source.to_string_lossy(),
                    e.to_string(),
                ));
                return report;
            }
        }
    }

    for path in &plan.stale {
        match remove_symlink(path) {
            Ok(true) => {
                log::info!("removed stale link {}", path.display());
                report.removed += 1;
            }
            Ok(false) => {}
            Err(e) => {
                report.failure = Some(ProcessingIssue::new(
                    ErrorType::FilesystemError,
                    path.to_string_lossy(),
                    e.to_string(),
                ));
                return report;
            }
        }
    }

    report
}
