//! Structural validation of manifest documents.
//!
//! Works on raw JSON rather than the typed [`Manifest`] so that files
//! written by other tools, or edited by hand, are checked for exactly what
//! the format promises. Every violation is collected, not just the first:
//!
//! ```text
//! manifest failed validation: pics[2].hash: expected "sha256--" followed by
//! 64 hex digits; pics[4].dest_path: duplicate of pics[1]
//! ```

use crate::fsops::HASH_PREFIX;
use crate::manifest::{MANIFEST_VERSION, Manifest};
use crate::types::{ErrorType, ProcessingIssue};
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

const TIMESTAMP_SOURCES: &[&str] = &["exif", "filename", "filesystem", "unknown"];
const RUN_STATUSES: &[&str] = &["completed", "completed_with_warnings", "failed"];
const STATUS_COUNTS: &[&str] = &[
    "total_files",
    "processed_successfully",
    "warnings_count",
    "errors_count",
    "files_skipped",
];

#[derive(Error, Debug, Clone, PartialEq)]
#[error("manifest failed validation: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn to_issue(&self, source_file: &str) -> ProcessingIssue {
        ProcessingIssue::new(
            ErrorType::ValidationError,
            source_file,
            self.violations.join("; "),
        )
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<String>,
}

impl Checker {
    fn fail(&mut self, at: &str, msg: impl AsRef<str>) {
        self.violations.push(format!("{at}: {}", msg.as_ref()));
    }

    fn required<'a>(&mut self, obj: &'a Map<String, Value>, at: &str, key: &str) -> Option<&'a Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.fail(&format!("{at}{key}"), "required field missing");
        }
        value
    }

    fn string(&mut self, value: Option<&Value>, at: &str, nullable: bool) -> Option<String> {
        match value {
            None => None,
            Some(Value::Null) if nullable => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.fail(at, "expected a string");
                None
            }
        }
    }

    fn one_of(&mut self, value: Option<&Value>, at: &str, allowed: &[&str], nullable: bool) {
        if let Some(s) = self.string(value, at, nullable)
            && !allowed.contains(&s.as_str())
        {
            self.fail(at, format!("'{s}' is not one of {allowed:?}"));
        }
    }

    fn issue_list(&mut self, value: Option<&Value>, at: &str) {
        let Some(value) = value else { return };
        let Some(items) = value.as_array() else {
            self.fail(at, "expected an array");
            return;
        };
        let types: Vec<&str> = ErrorType::ALL.iter().map(|t| t.as_str()).collect();
        for (i, item) in items.iter().enumerate() {
            let here = format!("{at}[{i}]");
            let Some(obj) = item.as_object() else {
                self.fail(&here, "expected an object");
                continue;
            };
            let prefix = format!("{here}.");
            let error_type = self.required(obj, &prefix, "error_type");
            self.one_of(error_type, &format!("{here}.error_type"), &types, false);
            let source_file = self.required(obj, &prefix, "source_file");
            self.string(source_file, &format!("{here}.source_file"), false);
            self.string(obj.get("details"), &format!("{here}.details"), true);
        }
    }

    fn gps(&mut self, value: Option<&Value>, at: &str) {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };
        let Some(obj) = value.as_object() else {
            self.fail(at, "expected an object or null");
            return;
        };
        for (key, limit) in [("lat", 90.0), ("lon", 180.0)] {
            match obj.get(key).and_then(Value::as_f64) {
                Some(v) if (-limit..=limit).contains(&v) => {}
                Some(v) => self.fail(&format!("{at}.{key}"), format!("{v} out of range ±{limit}")),
                None => self.fail(&format!("{at}.{key}"), "expected a number"),
            }
        }
    }

    fn pic(&mut self, value: &Value, at: &str) -> Option<String> {
        let Some(obj) = value.as_object() else {
            self.fail(at, "expected an object");
            return None;
        };
        let prefix = format!("{at}.");

        let source_path = self.required(obj, &prefix, "source_path");
        if let Some(s) = self.string(source_path, &format!("{at}.source_path"), false)
            && s.is_empty()
        {
            self.fail(&format!("{at}.source_path"), "must not be empty");
        }

        let dest = self.required(obj, &prefix, "dest_path");
        let dest = self.string(dest, &format!("{at}.dest_path"), false);
        if let Some(d) = &dest
            && (d.is_empty() || d.contains('/'))
        {
            self.fail(&format!("{at}.dest_path"), "must be a bare, non-empty filename");
        }

        let hash = self.required(obj, &prefix, "hash");
        if let Some(h) = self.string(hash, &format!("{at}.hash"), false)
            && !is_valid_hash(&h)
        {
            self.fail(
                &format!("{at}.hash"),
                format!("expected \"{HASH_PREFIX}\" followed by 64 hex digits"),
            );
        }

        if let Some(size) = self.required(obj, &prefix, "size_bytes")
            && size.as_u64().is_none()
        {
            self.fail(&format!("{at}.size_bytes"), "expected a non-negative integer");
        }

        if let Some(mtime) = self.required(obj, &prefix, "mtime")
            && !mtime.is_number()
        {
            self.fail(&format!("{at}.mtime"), "expected a number");
        }

        if let Some(ts) = self.string(obj.get("timestamp"), &format!("{at}.timestamp"), true)
            && !is_iso_timestamp(&ts)
        {
            self.fail(&format!("{at}.timestamp"), format!("'{ts}' is not ISO-8601"));
        }

        self.one_of(
            obj.get("timestamp_source"),
            &format!("{at}.timestamp_source"),
            TIMESTAMP_SOURCES,
            true,
        );
        self.string(obj.get("camera"), &format!("{at}.camera"), true);
        self.gps(obj.get("gps"), &format!("{at}.gps"));
        self.issue_list(obj.get("errors"), &format!("{at}.errors"));

        dest
    }

    fn processing_status(&mut self, value: Option<&Value>) {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };
        let Some(obj) = value.as_object() else {
            self.fail("processing_status", "expected an object or null");
            return;
        };
        let status = self.required(obj, "processing_status.", "status");
        self.one_of(status, "processing_status.status", RUN_STATUSES, false);
        for key in STATUS_COUNTS {
            if let Some(v) = obj.get(*key)
                && v.as_u64().is_none()
            {
                self.fail(
                    &format!("processing_status.{key}"),
                    "expected a non-negative integer",
                );
            }
        }
    }
}

fn is_valid_hash(hash: &str) -> bool {
    hash.strip_prefix(HASH_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_iso_timestamp(text: &str) -> bool {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
}

/// Validate a manifest JSON document, reporting every violation.
pub fn validate(doc: &Value) -> Result<(), ValidationError> {
    let mut check = Checker::default();
    let Some(root) = doc.as_object() else {
        return Err(ValidationError {
            violations: vec!["manifest: expected a JSON object".into()],
        });
    };

    let version = check.required(root, "", "version");
    if let Some(v) = check.string(version, "version", false)
        && v != MANIFEST_VERSION
    {
        check.fail(
            "version",
            format!("unsupported version '{v}', expected '{MANIFEST_VERSION}'"),
        );
    }
    let name = check.required(root, "", "collection_name");
    check.string(name, "collection_name", false);
    check.string(
        root.get("collection_description"),
        "collection_description",
        true,
    );
    let generated_at = check.required(root, "", "generated_at");
    if let Some(at) = check.string(generated_at, "generated_at", false)
        && DateTime::parse_from_rfc3339(&at).is_err()
    {
        check.fail("generated_at", format!("'{at}' is not an RFC 3339 timestamp"));
    }
    if let Some(config) = root.get("config")
        && !(config.is_null() || config.is_object())
    {
        check.fail("config", "expected an object or null");
    }

    match root.get("pics") {
        None => check.fail("pics", "required field missing"),
        Some(Value::Array(pics)) => {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (i, pic) in pics.iter().enumerate() {
                let at = format!("pics[{i}]");
                if let Some(dest) = check.pic(pic, &at) {
                    if let Some(first) = seen.get(&dest) {
                        check.fail(&format!("{at}.dest_path"), format!("duplicate of pics[{first}]"));
                    } else {
                        seen.insert(dest, i);
                    }
                }
            }
        }
        Some(_) => check.fail("pics", "expected an array"),
    }

    check.issue_list(root.get("errors"), "errors");
    check.issue_list(root.get("warnings"), "warnings");
    check.processing_status(root.get("processing_status"));

    if check.violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            violations: check.violations,
        })
    }
}

/// Validate a typed manifest through its JSON form.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ValidationError> {
    let doc = serde_json::to_value(manifest).map_err(|e| ValidationError {
        violations: vec![format!("manifest: cannot serialize: {e}")],
    })?;
    validate(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        serde_json::to_value(manifest_with(vec![record("a.jpg"), record("b.jpg")])).unwrap()
    }

    fn violations(doc: &Value) -> Vec<String> {
        validate(doc).unwrap_err().violations
    }

    #[test]
    fn built_manifest_is_valid() {
        assert_eq!(validate(&valid_doc()), Ok(()));
        assert!(validate_manifest(&manifest_with(vec![record("a.jpg")])).is_ok());
    }

    #[test]
    fn minimal_document_is_valid() {
        let doc = json!({
            "version": "0.1.0",
            "collection_name": "",
            "generated_at": "2024-03-16T09:00:00Z",
            "pics": [{
                "source_path": "/src/a.jpg",
                "dest_path": "a.jpg",
                "hash": fake_hash("a"),
                "size_bytes": 0,
                "mtime": 1.5
            }]
        });
        assert_eq!(validate(&doc), Ok(()));
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(violations(&json!([1, 2])).len(), 1);
    }

    #[test]
    fn missing_required_fields_all_reported() {
        let v = violations(&json!({}));
        assert!(v.iter().any(|m| m.starts_with("version")));
        assert!(v.iter().any(|m| m.starts_with("collection_name")));
        assert!(v.iter().any(|m| m.starts_with("generated_at")));
        assert!(v.iter().any(|m| m.starts_with("pics")));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut doc = valid_doc();
        doc["version"] = json!("9.9.9");
        assert!(violations(&doc)[0].contains("unsupported version"));
    }

    #[test]
    fn bad_generated_at_rejected() {
        let mut doc = valid_doc();
        doc["generated_at"] = json!("yesterday");
        assert!(violations(&doc)[0].starts_with("generated_at"));
    }

    #[test]
    fn bad_hash_rejected() {
        let mut doc = valid_doc();
        doc["pics"][1]["hash"] = json!("md5--abc");
        assert_eq!(violations(&doc), vec![
            "pics[1].hash: expected \"sha256--\" followed by 64 hex digits".to_string()
        ]);
    }

    #[test]
    fn negative_size_and_string_mtime_rejected() {
        let mut doc = valid_doc();
        doc["pics"][0]["size_bytes"] = json!(-1);
        doc["pics"][0]["mtime"] = json!("now");
        let v = violations(&doc);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn bad_timestamp_and_source_rejected() {
        let mut doc = valid_doc();
        doc["pics"][0]["timestamp"] = json!("15/03/2024");
        doc["pics"][0]["timestamp_source"] = json!("guess");
        assert_eq!(violations(&doc).len(), 2);
    }

    #[test]
    fn null_optionals_accepted() {
        let mut doc = valid_doc();
        doc["pics"][0]["timestamp"] = Value::Null;
        doc["pics"][0]["camera"] = Value::Null;
        doc["pics"][0]["gps"] = Value::Null;
        assert_eq!(validate(&doc), Ok(()));
    }

    #[test]
    fn gps_out_of_range_rejected() {
        let mut doc = valid_doc();
        doc["pics"][0]["gps"] = json!({"lat": 91.0, "lon": -8.6});
        let v = violations(&doc);
        assert_eq!(v.len(), 1);
        assert!(v[0].starts_with("pics[0].gps.lat"));
    }

    #[test]
    fn unknown_error_type_rejected() {
        let mut doc = valid_doc();
        doc["errors"] = json!([{"error_type": "oops", "source_file": "a.jpg"}]);
        assert!(violations(&doc)[0].starts_with("errors[0].error_type"));
    }

    #[test]
    fn bad_status_rejected() {
        let mut doc = valid_doc();
        doc["processing_status"]["status"] = json!("done");
        assert!(violations(&doc)[0].starts_with("processing_status.status"));
    }

    #[test]
    fn duplicate_dest_paths_rejected() {
        let mut doc = valid_doc();
        doc["pics"][1]["dest_path"] = json!("a.jpg");
        assert_eq!(
            violations(&doc),
            vec!["pics[1].dest_path: duplicate of pics[0]".to_string()]
        );
    }

    #[test]
    fn error_converts_to_issue() {
        let err = ValidationError {
            violations: vec!["a".into(), "b".into()],
        };
        let issue = err.to_issue("manifest.json");
        assert_eq!(issue.error_type, ErrorType::ValidationError);
        assert_eq!(issue.details.as_deref(), Some("a; b"));
    }
}
