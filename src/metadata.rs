//! Per-file metadata extraction.
//!
//! The [`MetadataSource`] trait is the seam between the collector and the
//! outside world: readability probing, EXIF extraction, camera identity and
//! content hashing. The collector only ever talks to the trait, so tests
//! drive it with an in-memory mock and production uses [`FsMetadataSource`].
//!
//! | Operation | Implementation |
//! |-----------|----------------|
//! | `probe` | size check, then `image::ImageReader::into_dimensions` for formats with a compiled decoder |
//! | `extract_exif_data` | `kamadak-exif` container reader, primary IFD |
//! | `extract_camera_info` | `Make` / `Model` ASCII tags |
//! | `compute_hash` | streaming SHA-256 via [`fsops::hash_file`](crate::fsops::hash_file) |
//!
//! A file without any EXIF block is not an error: it yields an empty
//! [`ExifData`]. Only a block that is present but unreadable is reported.
//!
//! The capture instant is `DateTimeOriginal` with `SubSecTimeOriginal` and
//! nothing else. IFD0 `DateTime` is rewritten by editors on every save, so a
//! file lacking `DateTimeOriginal` falls through to the filename instead.

use crate::types::{CameraInfo, ExifData, Gps, parse_subsec};
use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use image::ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("Unreadable image: {0}")]
    Corrupt(String),
}

/// Collaborators the collector calls for every supported file.
///
/// Implementations must be `Sync`: collection fans out over rayon.
pub trait MetadataSource: Sync {
    /// Fail if the file cannot be read or does not decode as an image.
    fn probe(&self, path: &Path) -> Result<(), MetadataError>;

    /// Structured EXIF payload. Missing EXIF is `Ok(ExifData::default())`.
    fn extract_exif_data(&self, path: &Path) -> Result<ExifData, MetadataError>;

    /// Camera make/model. Missing tags yield an unknown camera.
    fn extract_camera_info(&self, path: &Path) -> Result<CameraInfo, MetadataError>;

    /// Content hash in manifest form (`sha256--<hex>`).
    fn compute_hash(&self, path: &Path) -> Result<String, MetadataError>;
}

/// Extensions whose headers are checked with the `image` decoders.
const DECODABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Production metadata source reading from the local filesystem.
pub struct FsMetadataSource;

impl FsMetadataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FsMetadataSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the EXIF container, mapping "no EXIF here" to `None`.
fn read_container(path: &Path) -> Result<Option<Exif>, MetadataError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// First ASCII component of a tag, trimmed. Empty values become `None`.
fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches(['\0', ' ']).to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

/// Degrees/minutes/seconds rationals plus a hemisphere reference to decimal degrees.
fn gps_coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().any(|r| r.denom == 0) {
        return None;
    }
    let mut coord = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    if let Some(reference) = ascii_field(exif, ref_tag)
        && (reference.starts_with('S') || reference.starts_with('W'))
    {
        coord = -coord;
    }
    Some(coord)
}

fn exif_to_data(exif: &Exif) -> ExifData {
    let timestamp =
        ascii_field(exif, Tag::DateTimeOriginal).and_then(|raw| parse_exif_datetime(&raw));
    let subsec_nanos = timestamp
        .and_then(|_| ascii_field(exif, Tag::SubSecTimeOriginal))
        .and_then(|raw| parse_subsec(&raw));
    let timezone_offset = ascii_field(exif, Tag::OffsetTimeOriginal)
        .or_else(|| ascii_field(exif, Tag::OffsetTimeDigitized));

    let lat = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
    let lon = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);
    let gps = match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Gps { lat, lon }),
        _ => None,
    };

    let extra = exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .map(|f| (f.tag.to_string(), f.display_value().to_string()))
        .collect();

    ExifData {
        timestamp,
        subsec_nanos,
        timezone_offset,
        gps,
        extra,
    }
}

fn exif_to_camera(exif: &Exif) -> CameraInfo {
    let make = ascii_field(exif, Tag::Make);
    let model = ascii_field(exif, Tag::Model);
    CameraInfo::new(make.as_deref(), model.as_deref())
}

fn has_decoder(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DECODABLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

impl MetadataSource for FsMetadataSource {
    fn probe(&self, path: &Path) -> Result<(), MetadataError> {
        let meta = std::fs::metadata(path)?;
        if meta.len() == 0 {
            return Err(MetadataError::Corrupt("empty file".into()));
        }
        if has_decoder(path) {
            ImageReader::open(path)?
                .with_guessed_format()?
                .into_dimensions()
                .map_err(|e| MetadataError::Corrupt(e.to_string()))?;
        } else {
            File::open(path)?;
        }
        Ok(())
    }

    fn extract_exif_data(&self, path: &Path) -> Result<ExifData, MetadataError> {
        Ok(read_container(path)?
            .map(|exif| exif_to_data(&exif))
            .unwrap_or_default())
    }

    fn extract_camera_info(&self, path: &Path) -> Result<CameraInfo, MetadataError> {
        Ok(read_container(path)?
            .map(|exif| exif_to_camera(&exif))
            .unwrap_or_default())
    }

    fn compute_hash(&self, path: &Path) -> Result<String, MetadataError> {
        Ok(crate::fsops::hash_file(path)?)
    }
}
