//! Shared types used across all pipeline stages.
//!
//! These types flow from collection through ordering and naming into the
//! manifest. [`ProcessingIssue`], [`TimestampSource`] and [`Gps`] are
//! serialized verbatim into `manifest.json` and must stay schema-compatible.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How bad an issue is. Intrinsic to its [`ErrorType`], never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Expected condition: silently skipped, counted.
    Info,
    /// Skip or fall back, keep going.
    Warning,
    /// May halt the rest of the run; blocks publishing the manifest.
    Error,
}

/// Kinds of problems recorded on records and manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    UnsupportedFormat,
    FileSkipped,
    CorruptedFile,
    ExifError,
    FilesystemError,
    ValidationError,
    NamingCollision,
}

impl ErrorType {
    pub const ALL: [ErrorType; 7] = [
        ErrorType::UnsupportedFormat,
        ErrorType::FileSkipped,
        ErrorType::CorruptedFile,
        ErrorType::ExifError,
        ErrorType::FilesystemError,
        ErrorType::ValidationError,
        ErrorType::NamingCollision,
    ];

    pub fn severity(self) -> Severity {
        match self {
            ErrorType::UnsupportedFormat | ErrorType::FileSkipped => Severity::Info,
            ErrorType::CorruptedFile | ErrorType::ExifError => Severity::Warning,
            ErrorType::FilesystemError
            | ErrorType::ValidationError
            | ErrorType::NamingCollision => Severity::Error,
        }
    }

    /// The wire name used in the manifest.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::UnsupportedFormat => "unsupported_format",
            ErrorType::FileSkipped => "file_skipped",
            ErrorType::CorruptedFile => "corrupted_file",
            ErrorType::ExifError => "exif_error",
            ErrorType::FilesystemError => "filesystem_error",
            ErrorType::ValidationError => "validation_error",
            ErrorType::NamingCollision => "naming_collision",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured problem tied to one source file.
///
/// Per-file problems never abort collection or naming; they travel as values
/// and end up either on the record (`pics[].errors`) or in the manifest's
/// global `errors`/`warnings` lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingIssue {
    pub error_type: ErrorType,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProcessingIssue {
    pub fn new(
        error_type: ErrorType,
        source_file: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error_type,
            source_file: source_file.into(),
            details: Some(details.into()),
        }
    }

    pub fn severity(&self) -> Severity {
        self.error_type.severity()
    }
}

impl fmt::Display for ProcessingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(d) => write!(f, "{} ({}): {}", self.error_type, self.source_file, d),
            None => write!(f, "{} ({})", self.error_type, self.source_file),
        }
    }
}

/// Which signal produced a record's capture instant.
///
/// Precedence is fixed: `Exif` > `Filename` > `Filesystem` > `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    Exif,
    Filename,
    Filesystem,
    #[default]
    Unknown,
}

impl TimestampSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TimestampSource::Exif => "exif",
            TimestampSource::Filename => "filename",
            TimestampSource::Filesystem => "filesystem",
            TimestampSource::Unknown => "unknown",
        }
    }
}

/// Decimal-degree coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub lat: f64,
    pub lon: f64,
}

/// Camera make and model as reported by the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CameraInfo {
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Sentinel used in camera identities when make or model is missing.
pub const UNKNOWN_CAMERA: &str = "unknown";

impl CameraInfo {
    pub fn new(make: Option<&str>, model: Option<&str>) -> Self {
        let clean = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            make: clean(make),
            model: clean(model),
        }
    }

    pub fn is_known(&self) -> bool {
        self.make.is_some() || self.model.is_some()
    }

    /// Grouping key for burst detection: `make/model`, missing parts replaced
    /// by [`UNKNOWN_CAMERA`].
    pub fn identity(&self) -> String {
        format!(
            "{}/{}",
            self.make.as_deref().unwrap_or(UNKNOWN_CAMERA),
            self.model.as_deref().unwrap_or(UNKNOWN_CAMERA)
        )
    }

    /// Human-readable label stored in the manifest's `camera` field.
    ///
    /// Models that already repeat the make (`Canon` + `Canon EOS R5`) are not
    /// doubled.
    pub fn label(&self) -> Option<String> {
        match (self.make.as_deref(), self.model.as_deref()) {
            (Some(make), Some(model)) => {
                if model.to_lowercase().starts_with(&make.to_lowercase()) {
                    Some(model.to_string())
                } else {
                    Some(format!("{make} {model}"))
                }
            }
            (Some(make), None) => Some(make.to_string()),
            (None, Some(model)) => Some(model.to_string()),
            (None, None) => None,
        }
    }
}

/// Structured EXIF payload.
///
/// The fields ordering and naming depend on are typed; everything else read
/// from the primary IFD lands in `extra` as rendered strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    /// `DateTimeOriginal`, second precision.
    pub timestamp: Option<NaiveDateTime>,
    /// `SubSecTimeOriginal` as nanoseconds.
    pub subsec_nanos: Option<u32>,
    /// `OffsetTimeOriginal`, e.g. `+02:00`. Informational only.
    pub timezone_offset: Option<String>,
    pub gps: Option<Gps>,
    pub extra: BTreeMap<String, String>,
}

impl ExifData {
    /// Timestamp with the subsecond part applied.
    pub fn capture_instant(&self) -> Option<NaiveDateTime> {
        let ts = self.timestamp?;
        match self.subsec_nanos {
            Some(nanos) => ts.with_nanosecond(nanos).or(Some(ts)),
            None => Some(ts),
        }
    }
}

/// Parse EXIF subsecond digits as a decimal fraction of a second.
///
/// `"5"` is half a second and `"123"` is 123 ms. Digits beyond nanosecond
/// precision are dropped. Returns `None` for empty or non-numeric input.
pub fn parse_subsec(digits: &str) -> Option<u32> {
    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn severity_is_intrinsic_to_type() {
        assert_eq!(ErrorType::UnsupportedFormat.severity(), Severity::Info);
        assert_eq!(ErrorType::CorruptedFile.severity(), Severity::Warning);
        assert_eq!(ErrorType::ExifError.severity(), Severity::Warning);
        assert_eq!(ErrorType::NamingCollision.severity(), Severity::Error);
        assert_eq!(ErrorType::FilesystemError.severity(), Severity::Error);
    }

    #[test]
    fn error_type_serializes_to_wire_name() {
        for t in ErrorType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn issue_without_details_omits_field() {
        let issue = ProcessingIssue {
            error_type: ErrorType::ExifError,
            source_file: "a.jpg".into(),
            details: None,
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert_eq!(json, r#"{"error_type":"exif_error","source_file":"a.jpg"}"#);
    }

    #[test]
    fn camera_identity_uses_unknown_sentinel() {
        assert_eq!(CameraInfo::default().identity(), "unknown/unknown");
        assert_eq!(
            CameraInfo::new(Some("Canon"), None).identity(),
            "Canon/unknown"
        );
    }

    #[test]
    fn camera_new_drops_blank_parts() {
        let cam = CameraInfo::new(Some("  "), Some(" EOS R5 "));
        assert_eq!(cam.make, None);
        assert_eq!(cam.model.as_deref(), Some("EOS R5"));
        assert!(cam.is_known());
        assert!(!CameraInfo::new(Some(""), None).is_known());
    }

    #[test]
    fn camera_label_does_not_repeat_make() {
        assert_eq!(
            CameraInfo::new(Some("Canon"), Some("Canon EOS R5")).label(),
            Some("Canon EOS R5".into())
        );
        assert_eq!(
            CameraInfo::new(Some("Apple"), Some("iPhone 15")).label(),
            Some("Apple iPhone 15".into())
        );
        assert_eq!(CameraInfo::default().label(), None);
    }

    #[test]
    fn subsec_is_a_decimal_fraction() {
        assert_eq!(parse_subsec("5"), Some(500_000_000));
        assert_eq!(parse_subsec("123"), Some(123_000_000));
        assert_eq!(parse_subsec("05"), Some(50_000_000));
        assert_eq!(parse_subsec("1234567891"), Some(123_456_789));
        assert_eq!(parse_subsec(" 42 "), Some(420_000_000));
        assert_eq!(parse_subsec(""), None);
        assert_eq!(parse_subsec("ab"), None);
    }

    #[test]
    fn capture_instant_applies_subseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 22)
            .unwrap();
        let exif = ExifData {
            timestamp: Some(ts),
            subsec_nanos: Some(250_000_000),
            ..Default::default()
        };
        let instant = exif.capture_instant().unwrap();
        assert_eq!(instant.nanosecond(), 250_000_000);
        assert_eq!(instant.with_nanosecond(0).unwrap(), ts);
        assert_eq!(ExifData::default().capture_instant(), None);
    }
}
