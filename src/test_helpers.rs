//! Shared test utilities for the normpic test suite.
//!
//! Provides builders for pipeline values and a recording [`MockSource`] so
//! collection can be tested without real EXIF-bearing images.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let p = photo("IMG_1.jpg")
//!     .at("2024-03-15 14:30:22.250")
//!     .camera("Canon", "EOS R5")
//!     .build();
//!
//! let source = MockSource::new()
//!     .camera("a.jpg", "Canon", "EOS R5")
//!     .corrupt("bad.jpg");
//! ```

use chrono::{NaiveDateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::collect::CollectedPhoto;
use crate::config::RunConfig;
use crate::filename::NamedPhoto;
use crate::fsops::HASH_PREFIX;
use crate::manifest::{Manifest, ManifestBuilder, PhotoRecord};
use crate::metadata::{MetadataError, MetadataSource};
use crate::types::{CameraInfo, ExifData, TimestampSource};

// =========================================================================
// Value builders
// =========================================================================

/// Parse `"YYYY-MM-DD HH:MM:SS[.fff]"`. Panics on bad input.
pub fn instant(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .unwrap_or_else(|e| panic!("bad test instant '{text}': {e}"))
}

pub struct PhotoBuilder {
    photo: CollectedPhoto,
    source: Option<TimestampSource>,
}

/// Start a [`CollectedPhoto`] with no instant and an unknown camera.
pub fn photo(name: &str) -> PhotoBuilder {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    PhotoBuilder {
        photo: CollectedPhoto {
            source_path: PathBuf::from("/src").join(name),
            file_name: name.to_string(),
            extension,
            size_bytes: 1024,
            mtime: 1_700_000_000.0,
            hash: fake_hash(name),
            exif: ExifData::default(),
            camera: CameraInfo::default(),
            captured_at: None,
            timestamp_source: TimestampSource::Unknown,
            issues: Vec::new(),
        },
        source: None,
    }
}

impl PhotoBuilder {
    /// Set the capture instant. Source defaults to EXIF.
    pub fn at(mut self, when: &str) -> Self {
        self.photo.captured_at = Some(instant(when));
        self
    }

    pub fn camera(mut self, make: &str, model: &str) -> Self {
        self.photo.camera = CameraInfo::new(Some(make), Some(model));
        self
    }

    pub fn source(mut self, source: TimestampSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn hash(mut self, hash: &str) -> Self {
        self.photo.hash = hash.to_string();
        self
    }

    pub fn build(mut self) -> CollectedPhoto {
        self.photo.timestamp_source = match (self.source, self.photo.captured_at) {
            (Some(s), _) => s,
            (None, Some(_)) => TimestampSource::Exif,
            (None, None) => TimestampSource::Unknown,
        };
        self.photo
    }
}

/// A well-formed manifest hash derived from `seed`.
pub fn fake_hash(seed: &str) -> String {
    format!("{HASH_PREFIX}{:x}", Sha256::digest(seed.as_bytes()))
}

/// Run config with a collection name and everything else default.
pub fn run_config(collection: &str) -> RunConfig {
    RunConfig {
        collection_name: collection.to_string(),
        ..RunConfig::default()
    }
}

/// A dated manifest record whose destination is `name`.
pub fn record(name: &str) -> PhotoRecord {
    PhotoRecord::from(NamedPhoto {
        photo: photo(name).at("2024-03-15 14:30:22").build(),
        dest_name: name.to_string(),
    })
}

/// A completed manifest holding `pics`, with a fixed generation time.
pub fn manifest_with(pics: Vec<PhotoRecord>) -> Manifest {
    let mut manifest = ManifestBuilder::new(&run_config("test"))
        .generated_at(Utc.with_ymd_and_hms(2024, 3, 16, 9, 0, 0).unwrap())
        .build(vec![], vec![], 0);
    if let Some(status) = manifest.processing_status.as_mut() {
        status.total_files = pics.len();
        status.processed_successfully = pics.len();
    }
    manifest.pics = pics;
    manifest
}

// =========================================================================
// Mock metadata source
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Probe(String),
    ReadExif(String),
    ReadCamera(String),
    Hash(String),
}

/// Metadata source that answers from in-memory tables keyed by file name.
///
/// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
/// Hashes are real SHA-256 of the file on disk.
#[derive(Default)]
pub struct MockSource {
    exif: HashMap<String, ExifData>,
    cameras: HashMap<String, CameraInfo>,
    corrupt: HashSet<String>,
    failing_exif: HashSet<String>,
    pub operations: Mutex<Vec<RecordedOp>>,
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exif(mut self, name: &str, timestamp: NaiveDateTime, subsec_nanos: Option<u32>) -> Self {
        self.exif.insert(
            name.to_string(),
            ExifData {
                timestamp: Some(timestamp),
                subsec_nanos,
                ..Default::default()
            },
        );
        self
    }

    pub fn camera(mut self, name: &str, make: &str, model: &str) -> Self {
        self.cameras
            .insert(name.to_string(), CameraInfo::new(Some(make), Some(model)));
        self
    }

    /// `probe` fails for this file.
    pub fn corrupt(mut self, name: &str) -> Self {
        self.corrupt.insert(name.to_string());
        self
    }

    /// EXIF and camera extraction fail for this file.
    pub fn failing_exif(mut self, name: &str) -> Self {
        self.failing_exif.insert(name.to_string());
        self
    }

    pub fn get_operations(&self) -> Vec<RecordedOp> {
        self.operations.lock().unwrap().clone()
    }

    pub fn hash_calls(&self) -> usize {
        self.get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Hash(_)))
            .count()
    }

    fn record_op(&self, op: RecordedOp) {
        self.operations.lock().unwrap().push(op);
    }
}

impl MetadataSource for MockSource {
    fn probe(&self, path: &Path) -> Result<(), MetadataError> {
        let key = file_key(path);
        self.record_op(RecordedOp::Probe(key.clone()));
        if self.corrupt.contains(&key) {
            return Err(MetadataError::Corrupt("mock corrupt file".into()));
        }
        Ok(())
    }

    fn extract_exif_data(&self, path: &Path) -> Result<ExifData, MetadataError> {
        let key = file_key(path);
        self.record_op(RecordedOp::ReadExif(key.clone()));
        if self.failing_exif.contains(&key) {
            return Err(MetadataError::Corrupt("mock unreadable EXIF".into()));
        }
        Ok(self.exif.get(&key).cloned().unwrap_or_default())
    }

    fn extract_camera_info(&self, path: &Path) -> Result<CameraInfo, MetadataError> {
        let key = file_key(path);
        self.record_op(RecordedOp::ReadCamera(key.clone()));
        if self.failing_exif.contains(&key) {
            return Err(MetadataError::Corrupt("mock unreadable EXIF".into()));
        }
        Ok(self.cameras.get(&key).cloned().unwrap_or_default())
    }

    fn compute_hash(&self, path: &Path) -> Result<String, MetadataError> {
        self.record_op(RecordedOp::Hash(file_key(path)));
        Ok(crate::fsops::hash_file(path)?)
    }
}
