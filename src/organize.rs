//! The organize workflow: source directory in, symlinks and manifest out.
//!
//! ```text
//! load previous manifest ─┐
//!                         ▼
//! collect ─► order ─► name ─► build manifest
//!                                   │
//!                         failed? ──┴─► stop (nothing touched)
//!                                   │
//!                       diff against previous
//!                                   │
//!                  link plan ─► apply (not in dry runs)
//!                                   │
//!                     link failed? ─┴─► stop (manifest not published)
//!                                   │
//!                        save manifest atomically
//! ```
//!
//! The previous manifest stays authoritative until the very last step, so
//! any failure along the way leaves the destination exactly as the last
//! successful run described it (plus whichever links were already
//! retargeted).

use crate::cache::{CacheStats, HashCache};
use crate::collect::{CollectError, collect};
use crate::config::RunConfig;
use crate::filename::generate_names;
use crate::fsops::{LinkPlan, LinkReport, PlannedLink, apply_plan, link_points_to};
use crate::manifest::{Manifest, ManifestBuilder, ManifestConfig};
use crate::metadata::{FsMetadataSource, MetadataSource};
use crate::order::order;
use crate::store::{self, ManifestDiff, StoreError};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error("cannot prepare destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot save manifest: {0}")]
    Store(#[from] StoreError),
}

/// What an organize run did.
#[derive(Debug)]
pub struct OrganizeOutcome {
    pub manifest: Manifest,
    /// Changes relative to the previous manifest (everything added if none).
    pub diff: ManifestDiff,
    pub links_planned: usize,
    pub links: LinkReport,
    pub cache: CacheStats,
    pub manifest_path: PathBuf,
    /// Whether the manifest was written to `manifest_path`.
    pub published: bool,
}

impl OrganizeOutcome {
    pub fn succeeded(&self) -> bool {
        self.published && !self.manifest.is_failed()
    }
}

/// Organize `source_dir` into `dest_dir` using the local filesystem.
pub fn organize(
    source_dir: &Path,
    dest_dir: &Path,
    run: &RunConfig,
) -> Result<OrganizeOutcome, OrganizeError> {
    organize_with(source_dir, dest_dir, run, &FsMetadataSource::new())
}

/// Compute which symlinks to (re)create and which to remove.
///
/// A record is linked when it is new, its content changed, the run is
/// forced, or its destination is missing or points elsewhere. Names that
/// disappeared since the previous manifest are removed.
pub fn plan_links(manifest: &Manifest, diff: &ManifestDiff, dest_dir: &Path, force: bool) -> LinkPlan {
    let changed: HashSet<&str> = diff
        .added
        .iter()
        .chain(&diff.modified)
        .map(String::as_str)
        .collect();

    let links = manifest
        .pics
        .iter()
        .filter_map(|pic| {
            let source = PathBuf::from(&pic.source_path);
            let dest = dest_dir.join(&pic.dest_path);
            let needed = force
                || changed.contains(pic.dest_path.as_str())
                || !link_points_to(&dest, &source);
            needed.then_some(PlannedLink { source, dest })
        })
        .collect();

    let stale = diff.removed.iter().map(|name| dest_dir.join(name)).collect();

    LinkPlan { links, stale }
}

/// Organize with an explicit metadata source.
pub fn organize_with<S: MetadataSource>(
    source_dir: &Path,
    dest_dir: &Path,
    run: &RunConfig,
    source: &S,
) -> Result<OrganizeOutcome, OrganizeError> {
    let source_dir = fs::canonicalize(source_dir).map_err(|e| CollectError::Filesystem {
        path: source_dir.to_path_buf(),
        source: e,
    })?;
    let dest_err = |e: io::Error| OrganizeError::Destination {
        path: dest_dir.to_path_buf(),
        source: e,
    };
    fs::create_dir_all(dest_dir).map_err(dest_err)?;
    let dest_dir = fs::canonicalize(dest_dir).map_err(dest_err)?;

    let manifest_path = store::manifest_path(&dest_dir, run.dry_run);
    let previous = store::load(&manifest_path);
    let cache = match &previous {
        Some(prev) if run.trust_mtime && !run.force => HashCache::from_manifest(prev),
        _ => HashCache::empty(),
    };

    let report = collect(&source_dir, source, &cache, run)?;
    let naming = generate_names(order(report.photos), run);
    let mut issues = report.issues;
    issues.extend(naming.issues);

    let mut manifest = ManifestBuilder::new(run)
        .config(ManifestConfig::new(&source_dir, &dest_dir, run))
        .build(naming.named, issues, report.total_files);

    let diff = match &previous {
        Some(prev) => store::diff(prev, &manifest),
        None => ManifestDiff::all_added(&manifest),
    };

    let mut outcome = OrganizeOutcome {
        manifest: manifest.clone(),
        diff,
        links_planned: 0,
        links: LinkReport::default(),
        cache: report.cache,
        manifest_path: manifest_path.clone(),
        published: false,
    };

    if manifest.is_failed() {
        log::error!("run failed, leaving {} untouched", dest_dir.display());
        return Ok(outcome);
    }

    if !run.dry_run {
        let plan = plan_links(&manifest, &outcome.diff, &dest_dir, run.force);
        outcome.links_planned = plan.links.len();
        let links = apply_plan(&plan);
        if let Some(issue) = links.failure.clone() {
            manifest.add_issue(issue);
            outcome.manifest = manifest;
            outcome.links = links;
            return Ok(outcome);
        }
        outcome.links = links;
    }

    match store::save(&manifest, &manifest_path, true) {
        Ok(()) => {
            log::info!(
                "wrote {} ({} photos)",
                manifest_path.display(),
                manifest.pics.len()
            );
            outcome.published = true;
        }
        Err(StoreError::Invalid(e)) => {
            log::error!("{e}");
            manifest.add_issue(e.to_issue(&manifest_path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    outcome.manifest = manifest;
    Ok(outcome)
}
