//! Chronological ordering with burst preservation.
//!
//! [`order`] is a pure function: the same photos in any input order always
//! come out in the same sequence.
//!
//! ## Pass 1: baseline
//!
//! Stable sort by capture instant (second, then subsecond), then filename,
//! then source path. Photos without an instant go last, by filename.
//!
//! ## Pass 2: bursts
//!
//! Two cameras firing in the same second can produce subsecond values that
//! interleave, which would splice one camera's burst into the other's:
//!
//! ```text
//! baseline:  A1 .10   B1 .20   A2 .30   B2 .40
//! result:    A1 .10   A2 .30   B1 .20   B2 .40
//! ```
//!
//! Each maximal run of photos sharing a truncated second that holds more
//! than one camera identity is split into per-camera sub-runs (each keeping
//! its baseline order), and the sub-runs are placed by their earliest
//! instant. Ties keep the sub-run that appeared first. Single-camera runs
//! pass through untouched; undated photos never form a run.

use crate::collect::CollectedPhoto;
use chrono::{NaiveDateTime, Timelike};
use std::cmp::Ordering;

fn truncated_second(photo: &CollectedPhoto) -> Option<NaiveDateTime> {
    photo
        .captured_at
        .map(|t| t.with_nanosecond(0).unwrap_or(t))
}

fn baseline_cmp(a: &CollectedPhoto, b: &CollectedPhoto) -> Ordering {
    let time = match (a.captured_at, b.captured_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    time.then_with(|| a.file_name.cmp(&b.file_name))
        .then_with(|| a.source_path.cmp(&b.source_path))
}

/// Reorder one same-second run so each camera's shots stay contiguous.
fn split_burst(run: Vec<CollectedPhoto>) -> Vec<CollectedPhoto> {
    if run.len() < 2 {
        return run;
    }
    let mut groups: Vec<(String, Vec<CollectedPhoto>)> = Vec::new();
    for photo in run {
        let identity = photo.camera.identity();
        match groups.iter_mut().find(|(id, _)| *id == identity) {
            Some((_, members)) => members.push(photo),
            None => groups.push((identity, vec![photo])),
        }
    }
    if groups.len() > 1 {
        log::debug!(
            "burst at {:?}: {} cameras kept contiguous",
            groups[0].1[0].captured_at,
            groups.len()
        );
        groups.sort_by_key(|(_, members)| members.iter().filter_map(|p| p.captured_at).min());
    }
    groups.into_iter().flat_map(|(_, members)| members).collect()
}

/// Put photos in canonical chronological order.
pub fn order(mut photos: Vec<CollectedPhoto>) -> Vec<CollectedPhoto> {
    photos.sort_by(baseline_cmp);

    let mut ordered = Vec::with_capacity(photos.len());
    let mut iter = photos.into_iter().peekable();
    while let Some(first) = iter.next() {
        let Some(second) = truncated_second(&first) else {
            ordered.push(first);
            continue;
        };
        let mut run = vec![first];
        while let Some(next) = iter.next_if(|p| truncated_second(p) == Some(second)) {
            run.push(next);
        }
        ordered.extend(split_burst(run));
    }
    ordered
}
