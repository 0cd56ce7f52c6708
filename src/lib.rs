//! # normpic
//!
//! Normalizes a directory of photos from one or more cameras into a
//! chronologically ordered collection of deterministically named symlinks,
//! described by a JSON manifest. Source files are never modified.
//!
//! # Architecture: One Pipeline, One Manifest
//!
//! An organize run is a straight pipeline whose only persistent state is the
//! manifest it publishes:
//!
//! ```text
//! 1. Collect   source/   →  records      (metadata, capture instant, hash)
//! 2. Order     records   →  records      (chronological, bursts kept together)
//! 3. Name      records   →  named        (collection-time-camera-counter.ext)
//! 4. Build     named     →  Manifest     (status, counts, issues)
//! 5. Diff      previous  →  ManifestDiff (added, removed, modified, metadata)
//! 6. Link      diff      →  dest/        (symlinks created and removed)
//! 7. Publish   Manifest  →  manifest.json (validated, atomic rename)
//! ```
//!
//! Each stage takes its inputs and the run's [`config::RunConfig`]
//! explicitly and returns values, so ordering and naming can be tested
//! without touching the filesystem. Per-file problems travel as
//! [`types::ProcessingIssue`] values; only failures that stop the run are
//! `Err`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`organize`] | Runs the pipeline end to end: collect, order, name, diff, link, publish |
//! | [`collect`] | Lists supported files and resolves metadata, capture instant and hash per file |
//! | [`order`] | Chronological ordering with same-second burst grouping per camera |
//! | [`filename`] | Destination filename generation, camera codes and collision counters |
//! | [`manifest`] | Manifest data model and builder (status, counts, issue lists) |
//! | [`schema`] | Structural validation of manifest documents |
//! | [`store`] | Atomic manifest persistence, lenient loading, manifest diffing |
//! | [`cache`] | Hash reuse from the previous manifest, cache statistics |
//! | [`metadata`] | EXIF and camera extraction behind the [`metadata::MetadataSource`] trait |
//! | [`naming`] | Capture instants embedded in camera filenames (`IMG_20240315_143022.jpg`) |
//! | [`fsops`] | File hashing and symlink primitives, link plans |
//! | [`config`] | Layered `normpic.toml` / environment / CLI configuration |
//! | [`types`] | Shared value types: issues, timestamp sources, camera info, EXIF data |
//! | [`output`] | CLI output formatting for run summaries, diffs and link checks |
//!
//! # Design Decisions
//!
//! ## Symlinks, Not Copies
//!
//! The destination holds only symlinks and the manifest. Reorganizing a
//! collection is cheap, nothing is duplicated, and the originals stay exactly
//! where the camera import put them.
//!
//! ## Capture Time Precedence
//!
//! EXIF `DateTimeOriginal` (with sub-seconds) wins, then a timestamp embedded
//! in the filename, then the file's modification time. The chosen source is
//! recorded per photo so a reader can tell a trusted instant from a guess.
//! A configured clock offset is applied to every resolved instant.
//!
//! ## Deterministic Names
//!
//! The same inputs always produce the same names. Photos taken in the same
//! second by the same camera share a name stem and are told apart by a
//! single-character counter (`0-9a-v`) in capture order; a bucket that would
//! need more than 32 names is reported as a naming collision instead of
//! wrapping around.
//!
//! ## Incremental Runs
//!
//! A rerun hashes every file again and diffs against the previous manifest,
//! relinks only what changed, and removes links whose names disappeared.
//! With `trust_mtime = true`, files whose size and mtime are unchanged reuse
//! their previous hash instead. The previous manifest is replaced only by a
//! valid new one, atomically, after every link succeeded.

pub mod cache;
pub mod collect;
pub mod config;
pub mod filename;
pub mod fsops;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod order;
pub mod organize;
pub mod output;
pub mod schema;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
