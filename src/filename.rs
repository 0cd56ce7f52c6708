//! Deterministic destination filenames.
//!
//! Every organized photo gets a name derived only from its position in the
//! canonical order and its own metadata:
//!
//! ```text
//! {collection-}{YYYYMMDDTHHMMSS}{-camera}{-counter}.{ext}
//!
//! wedding-20240315T143022-r5a.jpg      single shot
//! wedding-20240315T143022-r5a-0.jpg    burst, first frame
//! wedding-20240315T143022-r5a-1.jpg    burst, second frame
//! 20240315T143022.png                  no collection, unknown camera
//! ```
//!
//! ## Buckets and counters
//!
//! Records sharing the same second and camera segment form a bucket. A
//! bucket of one gets no counter. A bucket of two or more numbers every
//! member in order with one base-32 digit (`0-9a-v`), starting at `0`. A
//! bucket larger than the alphabet is a `naming_collision`, never a
//! wraparound.
//!
//! ## Camera codes
//!
//! Short codes come from a lookup table of lowercase substring patterns
//! matched against `"make model"`, longest pattern first. Unmapped cameras
//! get the first alphanumeric character of the make followed by two base-32
//! characters of the SHA-256 of the normalized name, which is stable across
//! runs and machines. Unknown cameras get no segment at all.

use crate::collect::CollectedPhoto;
use crate::config::RunConfig;
use crate::types::{CameraInfo, ErrorType, ProcessingIssue};
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Counter digits, in lexical order.
pub const COUNTER_ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Time segment used when a record has no capture instant at all.
pub const UNDATED: &str = "undated";

/// Stock camera code table.
pub const DEFAULT_CAMERA_CODES: &[(&str, &str)] = &[
    ("canon eos r5", "r5a"),
    ("canon eos r6", "r6a"),
    ("canon eos 5d", "5da"),
    ("canon eos 6d", "6da"),
    ("nikon d850", "d85"),
    ("nikon d750", "d75"),
    ("sony a7r", "a7r"),
    ("sony a7 iii", "a73"),
    ("iphone 15", "i15"),
    ("iphone 14", "i14"),
    ("iphone 13", "i13"),
    ("iphone 12", "i12"),
    ("iphone", "iph"),
];

/// The stock table as an owned map (the shape config files use).
pub fn default_camera_table() -> BTreeMap<String, String> {
    DEFAULT_CAMERA_CODES
        .iter()
        .map(|(pattern, code)| (pattern.to_string(), code.to_string()))
        .collect()
}

/// Camera → short code lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCodes {
    /// `(pattern, code)`, longest pattern first, ties lexical.
    patterns: Vec<(String, String)>,
}

impl Default for CameraCodes {
    fn default() -> Self {
        Self::new(default_camera_table())
    }
}

impl CameraCodes {
    pub fn new(table: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut patterns: Vec<(String, String)> = table
            .into_iter()
            .map(|(pattern, code)| (normalize_camera_name(&pattern), code))
            .filter(|(pattern, _)| !pattern.is_empty())
            .collect();
        patterns.sort_by(|a, b| {
            (Reverse(a.0.len()), &a.0, &a.1).cmp(&(Reverse(b.0.len()), &b.0, &b.1))
        });
        patterns.dedup_by(|a, b| a.0 == b.0);
        Self { patterns }
    }

    /// Short code for a camera, or `None` when the camera is unknown.
    pub fn code_for(&self, camera: &CameraInfo) -> Option<String> {
        if !camera.is_known() {
            return None;
        }
        let combined = normalize_camera_name(&format!(
            "{} {}",
            camera.make.as_deref().unwrap_or_default(),
            camera.model.as_deref().unwrap_or_default()
        ));
        if let Some((_, code)) = self.patterns.iter().find(|(p, _)| combined.contains(p.as_str())) {
            return Some(code.clone());
        }
        fallback_code(&combined)
    }
}

/// Lowercase, whitespace collapsed to single spaces.
fn normalize_camera_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn fallback_code(normalized: &str) -> Option<String> {
    let lead = normalized.chars().find(|c| c.is_ascii_alphanumeric())?;
    let digest = Sha256::digest(normalized.as_bytes());
    let a = COUNTER_ALPHABET[(digest[0] % 32) as usize] as char;
    let b = COUNTER_ALPHABET[(digest[1] % 32) as usize] as char;
    Some(format!("{lead}{a}{b}"))
}

/// Canonical lowercase extension: `JPEG` → `jpg`, `HEIC` → `heic`.
pub fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim_start_matches('.').to_lowercase();
    match lower.as_str() {
        "jpeg" | "jpe" => "jpg".to_string(),
        _ => lower,
    }
}

/// Make a collection name safe to use as a filename segment.
///
/// Non-alphanumeric characters (other than `-` and `_`) become dashes,
/// runs of dashes collapse, and leading/trailing dashes are stripped.
pub fn sanitize_collection(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// A collected photo with its destination filename.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPhoto {
    pub photo: CollectedPhoto,
    pub dest_name: String,
}

/// Result of naming an ordered list.
///
/// On a collision, `named` holds every record named before it and `issues`
/// holds the `naming_collision` plus a `file_skipped` for each record that
/// was never reached.
#[derive(Debug, Clone, Default)]
pub struct NamingOutcome {
    pub named: Vec<NamedPhoto>,
    pub issues: Vec<ProcessingIssue>,
}

impl NamingOutcome {
    pub fn collided(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.error_type == ErrorType::NamingCollision)
    }
}

/// Filename without counter or extension; also the bucket key.
fn base_name(photo: &CollectedPhoto, prefix: &str, codes: &CameraCodes) -> String {
    let time = photo
        .captured_at
        .map(|t| t.format("%Y%m%dT%H%M%S").to_string())
        .unwrap_or_else(|| UNDATED.to_string());
    match codes.code_for(&photo.camera) {
        Some(code) => format!("{prefix}{time}-{code}"),
        None => format!("{prefix}{time}"),
    }
}

/// Name every photo in canonical order.
pub fn generate_names(ordered: Vec<CollectedPhoto>, run: &RunConfig) -> NamingOutcome {
    let collection = sanitize_collection(&run.collection_name);
    let prefix = if collection.is_empty() {
        String::new()
    } else {
        format!("{collection}-")
    };

    let bases: Vec<String> = ordered
        .iter()
        .map(|p| base_name(p, &prefix, &run.camera_codes))
        .collect();
    let mut bucket_sizes: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *bucket_sizes.entry(base.as_str()).or_default() += 1;
    }

    let mut outcome = NamingOutcome::default();
    let mut next_counter: HashMap<&str, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut photos = ordered.into_iter().enumerate();

    while let Some((i, photo)) = photos.next() {
        let base = bases[i].as_str();
        let size = bucket_sizes[base];
        let ext = normalize_extension(&photo.extension);

        let name = if size > COUNTER_ALPHABET.len() {
            Err(format!(
                "{size} photos share '{base}', more than the {} counter values available",
                COUNTER_ALPHABET.len()
            ))
        } else if size > 1 {
            let counter = next_counter.entry(base).or_default();
            let digit = COUNTER_ALPHABET[*counter] as char;
            *counter += 1;
            Ok(format!("{base}-{digit}.{ext}"))
        } else {
            Ok(format!("{base}.{ext}"))
        };

        let name = name.and_then(|n| {
            if taken.contains(&n) {
                Err(format!("destination name '{n}' already assigned"))
            } else {
                Ok(n)
            }
        });

        match name {
            Ok(dest_name) => {
                taken.insert(dest_name.clone());
                outcome.named.push(NamedPhoto { photo, dest_name });
            }
            Err(details) => {
                log::error!("naming halted at {}: {}", photo.file_name, details);
                outcome.issues.push(ProcessingIssue::new(
                    ErrorType::NamingCollision,
                    photo.file_name.clone(),
                    details,
                ));
                for (_, rest) in photos.by_ref() {
                    outcome.issues.push(ProcessingIssue::new(
                        ErrorType::FileSkipped,
                        rest.file_name.clone(),
                        "not named: naming halted by an earlier collision",
                    ));
                }
                break;
            }
        }
    }

    outcome
}
