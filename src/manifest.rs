//! The manifest: a versioned, ordered description of an organized collection.
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "collection_name": "wedding",
//!   "collection_description": null,
//!   "generated_at": "2024-03-16T09:12:44.120Z",
//!   "config": { "source_dir": "...", "dest_dir": "...", ... },
//!   "pics": [
//!     {
//!       "source_path": "/photos/raw/IMG_0042.JPG",
//!       "dest_path": "wedding-20240315T143022-r5a.jpg",
//!       "hash": "sha256--9f86d0...",
//!       "size_bytes": 4821733,
//!       "mtime": 1710513022.0,
//!       "timestamp": "2024-03-15T14:30:22.250",
//!       "timestamp_source": "exif",
//!       "camera": "Canon EOS R5",
//!       "gps": { "lat": 41.14, "lon": -8.61 },
//!       "errors": []
//!     }
//!   ],
//!   "errors": [],
//!   "warnings": [],
//!   "processing_status": { "status": "completed", "total_files": 1, ... }
//! }
//! ```
//!
//! `pics` order is the chronological display order. Destination names are
//! pairwise unique.

use crate::config::RunConfig;
use crate::filename::NamedPhoto;
use crate::types::{Gps, ProcessingIssue, Severity, TimestampSource};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema version written into every manifest.
pub const MANIFEST_VERSION: &str = "0.1.0";

/// One organized photo (a manifest "pic").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub source_path: String,
    /// Filename relative to the destination directory.
    pub dest_path: String,
    pub hash: String,
    pub size_bytes: u64,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub timestamp_source: TimestampSource,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub gps: Option<Gps>,
    #[serde(default)]
    pub errors: Vec<ProcessingIssue>,
}

impl From<NamedPhoto> for PhotoRecord {
    fn from(named: NamedPhoto) -> Self {
        let photo = named.photo;
        Self {
            source_path: photo.source_path.display().to_string(),
            dest_path: named.dest_name,
            hash: photo.hash,
            size_bytes: photo.size_bytes,
            mtime: photo.mtime,
            timestamp: photo.captured_at,
            timestamp_source: photo.timestamp_source,
            camera: photo.camera.label(),
            gps: photo.exif.gps,
            errors: photo.issues,
        }
    }
}

/// Snapshot of the settings a manifest was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    pub source_dir: String,
    pub dest_dir: String,
    #[serde(default)]
    pub timestamp_offset_hours: i32,
    #[serde(default)]
    pub force_reprocess: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl ManifestConfig {
    pub fn new(source_dir: &Path, dest_dir: &Path, run: &RunConfig) -> Self {
        Self {
            source_dir: source_dir.display().to_string(),
            dest_dir: dest_dir.display().to_string(),
            timestamp_offset_hours: run.timestamp_offset_hours,
            force_reprocess: run.force,
            dry_run: run.dry_run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithWarnings => "completed_with_warnings",
            RunStatus::Failed => "failed",
        }
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub status: RunStatus,
    /// Every file seen in the source directory (dotfiles excluded).
    pub total_files: usize,
    pub processed_successfully: usize,
    pub warnings_count: usize,
    pub errors_count: usize,
    pub files_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub collection_name: String,
    #[serde(default)]
    pub collection_description: Option<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub config: Option<ManifestConfig>,
    pub pics: Vec<PhotoRecord>,
    #[serde(default)]
    pub errors: Vec<ProcessingIssue>,
    #[serde(default)]
    pub warnings: Vec<ProcessingIssue>,
    #[serde(default)]
    pub processing_status: Option<ProcessingStatus>,
}

impl Manifest {
    pub fn status(&self) -> RunStatus {
        match &self.processing_status {
            Some(s) => s.status,
            None => status_for(&self.pics, &self.errors, &self.warnings),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status() == RunStatus::Failed
    }

    /// Record a collection-level issue found after the manifest was built,
    /// updating counts and status.
    pub fn add_issue(&mut self, issue: ProcessingIssue) {
        match issue.severity() {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Info => {}
        }
        let status = status_for(&self.pics, &self.errors, &self.warnings);
        let (warnings, errors) = count_by_severity(&self.pics, &self.errors, &self.warnings);
        if let Some(ps) = self.processing_status.as_mut() {
            ps.status = status;
            ps.warnings_count = warnings;
            ps.errors_count = errors;
        }
    }
}

fn count_by_severity(
    pics: &[PhotoRecord],
    errors: &[ProcessingIssue],
    warnings: &[ProcessingIssue],
) -> (usize, usize) {
    let per_record = pics.iter().flat_map(|p| p.errors.iter());
    let all = per_record.chain(errors).chain(warnings);
    let mut counts = (0, 0);
    for issue in all {
        match issue.severity() {
            Severity::Warning => counts.0 += 1,
            Severity::Error => counts.1 += 1,
            Severity::Info => {}
        }
    }
    counts
}

fn status_for(
    pics: &[PhotoRecord],
    errors: &[ProcessingIssue],
    warnings: &[ProcessingIssue],
) -> RunStatus {
    match count_by_severity(pics, errors, warnings) {
        (_, e) if e > 0 => RunStatus::Failed,
        (w, _) if w > 0 => RunStatus::CompletedWithWarnings,
        _ => RunStatus::Completed,
    }
}

/// Assembles named photos and run issues into a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    collection_name: String,
    collection_description: Option<String>,
    config: Option<ManifestConfig>,
    generated_at: Option<DateTime<Utc>>,
}

impl ManifestBuilder {
    pub fn new(run: &RunConfig) -> Self {
        Self {
            collection_name: run.collection_name.clone(),
            collection_description: run.collection_description.clone(),
            config: None,
            generated_at: None,
        }
    }

    pub fn config(mut self, config: ManifestConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Fix the generation time instead of using the current clock.
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Build the manifest.
    ///
    /// `issues` are collection-level: they land in the global `errors` or
    /// `warnings` list by severity, info-level ones are only counted.
    /// `total_files` is every file encountered; whatever did not become a
    /// record counts as skipped.
    pub fn build(
        self,
        named: Vec<NamedPhoto>,
        issues: Vec<ProcessingIssue>,
        total_files: usize,
    ) -> Manifest {
        let pics: Vec<PhotoRecord> = named.into_iter().map(PhotoRecord::from).collect();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for issue in issues {
            match issue.severity() {
                Severity::Error => errors.push(issue),
                Severity::Warning => warnings.push(issue),
                Severity::Info => {}
            }
        }

        let (warnings_count, errors_count) = count_by_severity(&pics, &errors, &warnings);
        let status = status_for(&pics, &errors, &warnings);
        let processing_status = ProcessingStatus {
            status,
            total_files,
            processed_successfully: pics.len(),
            warnings_count,
            errors_count,
            files_skipped: total_files.saturating_sub(pics.len()),
        };

        Manifest {
            version: MANIFEST_VERSION.to_string(),
            collection_name: self.collection_name,
            collection_description: self.collection_description,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            config: self.config,
            pics,
            errors,
            warnings,
            processing_status: Some(processing_status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::types::ErrorType;

    fn named(name: &str, dest: &str) -> NamedPhoto {
        NamedPhoto {
            photo: photo(name).at("2024-03-15 14:30:22").build(),
            dest_name: dest.into(),
        }
    }

    #[test]
    fn clean_run_is_completed() {
        let manifest = ManifestBuilder::new(&run_config("c")).build(
            vec![named("a.jpg", "c-1.jpg"), named("b.jpg", "c-2.jpg")],
            vec![],
            2,
        );
        let status = manifest.processing_status.clone().unwrap();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.total_files, 2);
        assert_eq!(status.processed_successfully, 2);
        assert_eq!(status.files_skipped, 0);
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.collection_name, "c");
    }

    #[test]
    fn record_order_is_preserved() {
        let manifest = ManifestBuilder::new(&run_config("")).build(
            vec![named("z.jpg", "3.jpg"), named("a.jpg", "1.jpg"), named("m.jpg", "2.jpg")],
            vec![],
            3,
        );
        let dests: Vec<_> = manifest.pics.iter().map(|p| p.dest_path.as_str()).collect();
        assert_eq!(dests, vec!["3.jpg", "1.jpg", "2.jpg"]);
    }

    #[test]
    fn per_record_warning_gives_completed_with_warnings() {
        let mut n = named("a.jpg", "a.jpg");
        n.photo.issues.push(ProcessingIssue::new(
            ErrorType::ExifError,
            "a.jpg",
            "bad IFD",
        ));
        let manifest = ManifestBuilder::new(&run_config("")).build(vec![n], vec![], 1);
        assert_eq!(manifest.status(), RunStatus::CompletedWithWarnings);
        assert_eq!(manifest.pics[0].errors.len(), 1);
        assert!(manifest.warnings.is_empty());
        assert_eq!(manifest.processing_status.unwrap().warnings_count, 1);
    }

    #[test]
    fn global_issues_sorted_by_severity_and_info_not_listed() {
        let issues = vec![
            ProcessingIssue::new(ErrorType::UnsupportedFormat, "notes.txt", "txt"),
            ProcessingIssue::new(ErrorType::CorruptedFile, "bad.jpg", "empty"),
            ProcessingIssue::new(ErrorType::NamingCollision, "x.jpg", "dup"),
        ];
        let manifest =
            ManifestBuilder::new(&run_config("")).build(vec![named("a.jpg", "a.jpg")], issues, 4);
        assert_eq!(manifest.errors.len(), 1);
        assert_eq!(manifest.warnings.len(), 1);
        let status = manifest.processing_status.clone().unwrap();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.errors_count, 1);
        assert_eq!(status.warnings_count, 1);
        assert_eq!(status.files_skipped, 3);
        assert!(manifest.is_failed());
    }

    #[test]
    fn add_issue_updates_status() {
        let mut manifest =
            ManifestBuilder::new(&run_config("")).build(vec![named("a.jpg", "a.jpg")], vec![], 1);
        assert_eq!(manifest.status(), RunStatus::Completed);
        manifest.add_issue(ProcessingIssue::new(
            ErrorType::FilesystemError,
            "a.jpg",
            "permission denied",
        ));
        assert_eq!(manifest.status(), RunStatus::Failed);
        assert_eq!(manifest.processing_status.as_ref().unwrap().errors_count, 1);
    }

    #[test]
    fn record_carries_camera_label_and_source() {
        let n = NamedPhoto {
            photo: photo("IMG_1.JPG")
                .camera("Canon", "Canon EOS R5")
                .source(TimestampSource::Filesystem)
                .build(),
            dest_name: "x.jpg".into(),
        };
        let record = PhotoRecord::from(n);
        assert_eq!(record.camera.as_deref(), Some("Canon EOS R5"));
        assert_eq!(record.timestamp_source, TimestampSource::Filesystem);
        assert!(record.source_path.ends_with("IMG_1.JPG"));
    }

    #[test]
    fn pic_serializes_nulls_and_wire_names() {
        let record = PhotoRecord::from(named("a.jpg", "a.jpg"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2024-03-15T14:30:22");
        assert_eq!(json["gps"], serde_json::Value::Null);
        assert_eq!(json["errors"], serde_json::json!([]));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::CompletedWithWarnings).unwrap();
        assert_eq!(json, "\"completed_with_warnings\"");
    }
}
