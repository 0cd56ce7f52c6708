//! Source directory scanning and per-file fact gathering.
//!
//! Collection turns a flat source directory into [`CollectedPhoto`] values,
//! one per supported and readable file, in path order:
//!
//! ```text
//! source/
//! ├── .DS_Store          ignored silently
//! ├── IMG_0042.JPG       collected
//! ├── IMG_0043.HEIC      collected
//! ├── notes.txt          unsupported_format (info)
//! ├── broken.jpg         corrupted_file (warning)
//! └── old/               not recursed
//! ```
//!
//! Per-file problems never fail the scan. They become [`ProcessingIssue`]
//! values, either on the photo (an unreadable EXIF block, the photo still
//! participates) or on the report (the file is excluded). Only a source
//! directory that cannot be listed is a [`CollectError`].
//!
//! ## Capture instant
//!
//! Resolved per photo in fixed precedence, recorded as [`TimestampSource`]:
//!
//! 1. EXIF `DateTimeOriginal` plus `SubSecTimeOriginal`
//! 2. a timestamp encoded in the filename ([`crate::naming`])
//! 3. the filesystem modification time, read as UTC
//! 4. unknown
//!
//! The run's `timestamp_offset_hours` is then added to whichever applied.
//!
//! Files are processed in parallel; results keep input order.

use crate::cache::{CacheStats, HashCache};
use crate::config::RunConfig;
use crate::metadata::MetadataSource;
use crate::naming::parse_filename_timestamp;
use crate::types::{CameraInfo, ErrorType, ExifData, ProcessingIssue, TimestampSource};
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Extensions collected, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("cannot read source directory {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CollectError {
    pub fn to_issue(&self) -> ProcessingIssue {
        match self {
            CollectError::Filesystem { path, source } => ProcessingIssue::new(
                ErrorType::FilesystemError,
                path.display().to_string(),
                source.to_string(),
            ),
        }
    }
}

/// Everything known about one supported, readable source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedPhoto {
    pub source_path: PathBuf,
    pub file_name: String,
    /// Extension as found, lowercased, without the dot.
    pub extension: String,
    pub size_bytes: u64,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    pub hash: String,
    pub exif: ExifData,
    pub camera: CameraInfo,
    /// Resolved capture instant, offset already applied.
    pub captured_at: Option<NaiveDateTime>,
    pub timestamp_source: TimestampSource,
    /// Problems that did not exclude the file.
    pub issues: Vec<ProcessingIssue>,
}

/// Result of scanning a source directory.
#[derive(Debug, Default)]
pub struct CollectionReport {
    /// Collected photos in path order.
    pub photos: Vec<CollectedPhoto>,
    /// Files excluded from processing, with the reason.
    pub issues: Vec<ProcessingIssue>,
    /// Files encountered, including excluded ones.
    pub total_files: usize,
    pub cache: CacheStats,
}

enum FileOutcome {
    Collected { photo: CollectedPhoto, reused: bool },
    Excluded(ProcessingIssue),
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Regular files directly inside `dir`, sorted, dotfiles skipped.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let fs_err = |source: io::Error| CollectError::Filesystem {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(fs_err)? {
        let entry = entry.map_err(fs_err)?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Seconds since the epoch, negative for pre-1970 times.
fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn mtime_instant(mtime: f64) -> Option<NaiveDateTime> {
    let secs = mtime.floor();
    let nanos = (((mtime - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos).map(|dt| dt.naive_utc())
}

/// Pick the capture instant by precedence: EXIF, filename, mtime.
pub fn resolve_instant(
    exif: &ExifData,
    file_name: &str,
    mtime: Option<f64>,
) -> (Option<NaiveDateTime>, TimestampSource) {
    if let Some(ts) = exif.capture_instant() {
        return (Some(ts), TimestampSource::Exif);
    }
    if let Some(ts) = parse_filename_timestamp(file_name) {
        return (Some(ts), TimestampSource::Filename);
    }
    if let Some(ts) = mtime.and_then(mtime_instant) {
        return (Some(ts), TimestampSource::Filesystem);
    }
    (None, TimestampSource::Unknown)
}

fn collect_one<S: MetadataSource>(
    path: &Path,
    source: &S,
    cache: &HashCache,
    offset: TimeDelta,
) -> FileOutcome {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !is_supported(path) {
        log::info!("skipping {file_name}: unsupported format");
        return FileOutcome::Excluded(ProcessingIssue::new(
            ErrorType::UnsupportedFormat,
            &file_name,
            format!("extension '{extension}' is not a supported photo format"),
        ));
    }

    let corrupted = |reason: String| {
        log::warn!("skipping {file_name}: {reason}");
        FileOutcome::Excluded(ProcessingIssue::new(
            ErrorType::CorruptedFile,
            &file_name,
            reason,
        ))
    };

    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return corrupted(format!("cannot stat: {e}")),
    };
    let size_bytes = meta.len();
    let mtime = meta.modified().ok().map(epoch_seconds);

    if let Err(e) = source.probe(path) {
        return corrupted(e.to_string());
    }

    let source_path = path.display().to_string();
    let cached = mtime.and_then(|m| cache.lookup(&source_path, size_bytes, m));
    let reused = cached.is_some();
    let hash = match cached {
        Some(h) => h.to_string(),
        None => match source.compute_hash(path) {
            Ok(h) => h,
            Err(e) => return corrupted(format!("cannot hash: {e}")),
        },
    };

    let mut issues = Vec::new();
    let exif = match source.extract_exif_data(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("{file_name}: unreadable EXIF, falling back: {e}");
            issues.push(ProcessingIssue::new(
                ErrorType::ExifError,
                &file_name,
                e.to_string(),
            ));
            ExifData::default()
        }
    };
    let camera = match source.extract_camera_info(path) {
        Ok(camera) => camera,
        Err(e) => {
            if issues.is_empty() {
                issues.push(ProcessingIssue::new(
                    ErrorType::ExifError,
                    &file_name,
                    e.to_string(),
                ));
            }
            CameraInfo::default()
        }
    };

    let (resolved, timestamp_source) = resolve_instant(&exif, &file_name, mtime);
    let captured_at = resolved.map(|t| t.checked_add_signed(offset).unwrap_or(t));
    log::debug!(
        "{file_name}: {} from {}, camera {}",
        captured_at.map(|t| t.to_string()).unwrap_or_else(|| "no time".into()),
        timestamp_source.as_str(),
        camera.identity()
    );

    FileOutcome::Collected {
        photo: CollectedPhoto {
            source_path: path.to_path_buf(),
            file_name,
            extension,
            size_bytes,
            mtime: mtime.unwrap_or_default(),
            hash,
            exif,
            camera,
            captured_at,
            timestamp_source,
            issues,
        },
        reused,
    }
}

/// Scan `dir` and collect every supported file.
pub fn collect<S: MetadataSource>(
    dir: &Path,
    source: &S,
    cache: &HashCache,
    run: &RunConfig,
) -> Result<CollectionReport, CollectError> {
    let files = list_source_files(dir)?;
    let offset = run.offset();

    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|path| collect_one(path, source, cache, offset))
        .collect();

    let mut report = CollectionReport {
        total_files: files.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            FileOutcome::Collected { photo, reused } => {
                if reused {
                    report.cache.reuse();
                } else {
                    report.cache.hash();
                }
                report.photos.push(photo);
            }
            FileOutcome::Excluded(issue) => report.issues.push(issue),
        }
    }
    log::info!(
        "collected {} of {} files ({})",
        report.photos.len(),
        report.total_files,
        report.cache
    );
    Ok(report)
}
