//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Organize
//!
//! ```text
//! Collection wedding → /photos/organized/wedding
//!     Status: completed_with_warnings
//!     Files: 45 found, 42 organized, 3 skipped
//!     Hashes: 40 reused, 2 hashed (42 total)
//!     Changes: 2 added, 0 removed, 1 modified, 0 metadata changed
//!     Links: 3 created, 0 removed
//!     Manifest: /photos/organized/wedding/manifest.json
//! Warnings
//!     corrupted_file (broken.jpg): empty file
//! ```
//!
//! ## Photo listing (`organize --list`)
//!
//! ```text
//! Photos
//! 001 wedding-20240315T143022-r5a-0.jpg
//!     Source: IMG_0042.JPG
//!     Taken: 2024-03-15 14:30:22.250 (exif)
//! ```
//!
//! ## Diff
//!
//! ```text
//! Added (1)
//!     wedding-20240316T101500.jpg
//! Modified (1)
//!     wedding-20240315T143022-r5a-0.jpg
//! 2 changes
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::manifest::Manifest;
use crate::organize::OrganizeOutcome;
use crate::store::ManifestDiff;
use crate::types::ProcessingIssue;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn issue_section(lines: &mut Vec<String>, title: &str, issues: &[ProcessingIssue]) {
    if issues.is_empty() {
        return;
    }
    lines.push(title.to_string());
    for issue in issues {
        lines.push(format!("{}{}", indent(1), issue));
    }
}

/// Final path component of a stored source path.
fn file_part(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

// ============================================================================
// Organize
// ============================================================================

pub fn format_organize_summary(outcome: &OrganizeOutcome, dest_dir: &Path) -> Vec<String> {
    let manifest = &outcome.manifest;
    let mut lines = Vec::new();

    let title = if manifest.collection_name.is_empty() {
        "Collection".to_string()
    } else {
        format!("Collection {}", manifest.collection_name)
    };
    lines.push(format!("{} → {}", title, dest_dir.display()));
    lines.push(format!("{}Status: {}", indent(1), manifest.status().as_str()));

    if let Some(status) = &manifest.processing_status {
        lines.push(format!(
            "{}Files: {} found, {} organized, {} skipped",
            indent(1),
            status.total_files,
            status.processed_successfully,
            status.files_skipped
        ));
    }
    lines.push(format!("{}Hashes: {}", indent(1), outcome.cache));

    let diff = &outcome.diff;
    lines.push(format!(
        "{}Changes: {} added, {} removed, {} modified, {} metadata changed",
        indent(1),
        diff.added.len(),
        diff.removed.len(),
        diff.modified.len(),
        diff.metadata_changed.len()
    ));

    let dry_run = manifest.config.as_ref().is_some_and(|c| c.dry_run);
    if dry_run {
        lines.push(format!("{}Links: none (dry run)", indent(1)));
    } else {
        lines.push(format!(
            "{}Links: {} created, {} removed",
            indent(1),
            outcome.links.created,
            outcome.links.removed
        ));
    }

    if outcome.published {
        lines.push(format!(
            "{}Manifest: {}",
            indent(1),
            outcome.manifest_path.display()
        ));
    } else {
        lines.push(format!(
            "{}Manifest: not written, previous manifest kept",
            indent(1)
        ));
    }

    issue_section(&mut lines, "Warnings", &manifest.warnings);
    issue_section(&mut lines, "Errors", &manifest.errors);
    lines
}

pub fn print_organize_summary(outcome: &OrganizeOutcome, dest_dir: &Path) {
    for line in format_organize_summary(outcome, dest_dir) {
        println!("{}", line);
    }
}

/// Every record in manifest order, with its source and capture time.
pub fn format_photo_listing(manifest: &Manifest) -> Vec<String> {
    let mut lines = vec!["Photos".to_string()];
    for (i, pic) in manifest.pics.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), pic.dest_path));
        lines.push(format!("{}Source: {}", indent(1), file_part(&pic.source_path)));
        let taken = pic
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        lines.push(format!(
            "{}Taken: {} ({})",
            indent(1),
            taken,
            pic.timestamp_source.as_str()
        ));
        if let Some(camera) = &pic.camera {
            lines.push(format!("{}Camera: {}", indent(1), camera));
        }
        for issue in &pic.errors {
            lines.push(format!("{}Issue: {}", indent(1), issue));
        }
    }
    lines
}

pub fn print_photo_listing(manifest: &Manifest) {
    for line in format_photo_listing(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Diff
// ============================================================================

pub fn format_diff(diff: &ManifestDiff) -> Vec<String> {
    if diff.is_empty() {
        return vec!["No changes".to_string()];
    }
    let mut lines = Vec::new();
    let sections = [
        ("Added", &diff.added),
        ("Removed", &diff.removed),
        ("Modified", &diff.modified),
        ("Metadata changed", &diff.metadata_changed),
    ];
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        lines.push(format!("{} ({})", title, names.len()));
        for name in names {
            lines.push(format!("{}{}", indent(1), name));
        }
    }
    let n = diff.change_count();
    lines.push(format!("{} change{}", n, if n == 1 { "" } else { "s" }));
    lines
}

pub fn print_diff(diff: &ManifestDiff) {
    for line in format_diff(diff) {
        println!("{}", line);
    }
}

// ============================================================================
// Verify
// ============================================================================

pub fn format_broken_links(dir: &Path, broken: &[PathBuf]) -> Vec<String> {
    if broken.is_empty() {
        return vec![format!("No broken symlinks in {}", dir.display())];
    }
    let mut lines = vec![format!(
        "{} broken symlink{} in {}",
        broken.len(),
        if broken.len() == 1 { "" } else { "s" },
        dir.display()
    )];
    for path in broken {
        let shown = path.strip_prefix(dir).unwrap_or(path);
        lines.push(format!("{}{}", indent(1), shown.display()));
    }
    lines
}

pub fn print_broken_links(dir: &Path, broken: &[PathBuf]) {
    for line in format_broken_links(dir, broken) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::fsops::LinkReport;
    use crate::test_helpers::*;
    use crate::types::ErrorType;

    fn outcome(manifest: Manifest, published: bool) -> OrganizeOutcome {
        OrganizeOutcome {
            diff: ManifestDiff::all_added(&manifest),
            manifest,
            links_planned: 2,
            links: LinkReport {
                created: 2,
                removed: 0,
                failure: None,
            },
            cache: CacheStats {
                reused: 0,
                hashed: 2,
            },
            manifest_path: PathBuf::from("/out/manifest.json"),
            published,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn summary_for_clean_run() {
        let manifest = manifest_with(vec![record("a.jpg"), record("b.jpg")]);
        let lines = format_organize_summary(&outcome(manifest, true), Path::new("/out"));
        assert_eq!(
            lines,
            vec![
                "Collection test → /out",
                "    Status: completed",
                "    Files: 2 found, 2 organized, 0 skipped",
                "    Hashes: 2 hashed",
                "    Changes: 2 added, 0 removed, 0 modified, 0 metadata changed",
                "    Links: 2 created, 0 removed",
                "    Manifest: /out/manifest.json",
            ]
        );
    }

    #[test]
    fn summary_lists_errors_when_not_published() {
        let mut manifest = manifest_with(vec![record("a.jpg")]);
        manifest.add_issue(ProcessingIssue::new(
            ErrorType::FilesystemError,
            "a.jpg",
            "occupied",
        ));
        let lines = format_organize_summary(&outcome(manifest, false), Path::new("/out"));
        assert!(lines.contains(&"    Status: failed".to_string()));
        assert!(lines.contains(&"    Manifest: not written, previous manifest kept".to_string()));
        assert_eq!(lines[lines.len() - 2], "Errors");
        assert_eq!(
            lines[lines.len() - 1],
            "    filesystem_error (a.jpg): occupied"
        );
    }

    #[test]
    fn listing_shows_order_source_and_time() {
        let manifest = manifest_with(vec![record("x.jpg")]);
        let lines = format_photo_listing(&manifest);
        assert_eq!(
            lines,
            vec![
                "Photos",
                "001 x.jpg",
                "    Source: x.jpg",
                "    Taken: 2024-03-15 14:30:22.000 (exif)",
            ]
        );
    }

    #[test]
    fn diff_sections_and_count() {
        let diff = ManifestDiff {
            added: vec!["b.jpg".into()],
            modified: vec!["a.jpg".into(), "c.jpg".into()],
            ..Default::default()
        };
        assert_eq!(
            format_diff(&diff),
            vec![
                "Added (1)",
                "    b.jpg",
                "Modified (2)",
                "    a.jpg",
                "    c.jpg",
                "3 changes",
            ]
        );
    }

    #[test]
    fn empty_diff() {
        assert_eq!(format_diff(&ManifestDiff::default()), vec!["No changes"]);
    }

    #[test]
    fn broken_links_relative_to_dir() {
        let dir = Path::new("/out");
        let lines = format_broken_links(dir, &[PathBuf::from("/out/a.jpg")]);
        assert_eq!(lines, vec!["1 broken symlink in /out", "    a.jpg"]);
        assert_eq!(
            format_broken_links(dir, &[]),
            vec!["No broken symlinks in /out"]
        );
    }
}
