//! Capture instants recovered from source filenames.
//!
//! Cameras, phones and export tools often encode the capture time in the
//! filename. When a photo has no usable EXIF timestamp this is the next best
//! signal, ahead of the filesystem modification time (which `cp`, `git` and
//! cloud sync all happily rewrite).
//!
//! ## Recognized shapes
//!
//! All shapes are matched against runs of ASCII digits in the file stem:
//!
//! - One run of 14–17 digits: `YYYYMMDDHHMMSS` plus up to three fraction
//!   digits (`20240315143022.jpg`, `PXL_20240315143022123`).
//! - An 8-digit date run followed by a 6–9 digit time run, separated by one
//!   of `_`, `-`, `T` or a space (`IMG_20240315_143022.jpg`,
//!   `PXL_20240315_143022123.jpg`, `20240315T143022.jpg`).
//! - Six runs shaped `YYYY MM DD HH MM SS` with single-character separators
//!   inside the date and the time and at most four characters between them
//!   (`2024-03-15 14.30.22.png`, `Screenshot 2024-03-15 at 14.30.22.png`),
//!   optionally followed by `.fff` fraction digits.
//!
//! The first match scanning left to right wins. Years outside 1900–2100 and
//! impossible dates are rejected so that counters and serial numbers do not
//! masquerade as timestamps.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;

/// A run of ASCII digits inside the stem, as byte offsets.
#[derive(Debug, Clone, Copy)]
struct DigitRun {
    start: usize,
    end: usize,
}

impl DigitRun {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Parse a capture instant from a filename (extension optional).
///
/// - `"IMG_20240315_143022.jpg"` → 2024-03-15 14:30:22
/// - `"PXL_20240315_143022123.jpg"` → 2024-03-15 14:30:22.123
/// - `"2024-03-15 14.30.22.png"` → 2024-03-15 14:30:22
/// - `"photo_a.jpg"` → `None`
pub fn parse_filename_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let runs = digit_runs(&stem);

    for i in 0..runs.len() {
        if let Some(ts) = compact_run(&stem, runs[i]) {
            return Some(ts);
        }
        if let Some(ts) = date_then_time(&stem, &runs[i..]) {
            return Some(ts);
        }
        if let Some(ts) = separated_fields(&stem, &runs[i..]) {
            return Some(ts);
        }
    }
    None
}

fn digit_runs(s: &str) -> Vec<DigitRun> {
    let bytes = s.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            runs.push(DigitRun { start, end: i });
        } else {
            i += 1;
        }
    }
    runs
}

fn compact_run(s: &str, run: DigitRun) -> Option<NaiveDateTime> {
    if !(14..=17).contains(&run.len()) {
        return None;
    }
    let d = &s[run.start..run.end];
    build(
        &d[0..4],
        &d[4..6],
        &d[6..8],
        &d[8..10],
        &d[10..12],
        &d[12..14],
        &d[14..],
    )
}

fn date_then_time(s: &str, runs: &[DigitRun]) -> Option<NaiveDateTime> {
    let [date, time, ..] = runs else {
        return None;
    };
    if date.len() != 8 || !(6..=9).contains(&time.len()) {
        return None;
    }
    let sep = &s[date.end..time.start];
    if !matches!(sep, "_" | "-" | "T" | " ") {
        return None;
    }
    let d = &s[date.start..date.end];
    let t = &s[time.start..time.end];
    build(&d[0..4], &d[4..6], &d[6..8], &t[0..2], &t[2..4], &t[4..6], &t[6..])
}

fn separated_fields(s: &str, runs: &[DigitRun]) -> Option<NaiveDateTime> {
    let [y, mo, d, h, mi, sec, rest @ ..] = runs else {
        return None;
    };
    let widths = [y.len(), mo.len(), d.len(), h.len(), mi.len(), sec.len()];
    if widths != [4, 2, 2, 2, 2, 2] {
        return None;
    }
    let gap = |a: &DigitRun, b: &DigitRun| b.start - a.end;
    let tight = [(y, mo), (mo, d), (h, mi), (mi, sec)];
    if tight.iter().any(|(a, b)| gap(a, b) != 1) || gap(d, h) == 0 || gap(d, h) > 4 {
        return None;
    }
    let fraction = match rest.first() {
        Some(f) if gap(sec, f) == 1 && &s[sec.end..f.start] == "." && f.len() <= 9 => {
            &s[f.start..f.end]
        }
        _ => "",
    };
    let field = |r: &DigitRun| &s[r.start..r.end];
    build(
        field(y),
        field(mo),
        field(d),
        field(h),
        field(mi),
        field(sec),
        fraction,
    )
}

fn build(
    year: &str,
    month: &str,
    day: &str,
    hour: &str,
    minute: &str,
    second: &str,
    fraction: &str,
) -> Option<NaiveDateTime> {
    let year: i32 = year.parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        crate::types::parse_subsec(fraction)?
    };
    let time = NaiveTime::from_hms_nano_opt(
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
        nanos,
    )?;
    Some(NaiveDateTime::new(date, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn android_style_date_underscore_time() {
        assert_eq!(
            parse_filename_timestamp("IMG_20240315_143022.jpg"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn pixel_style_with_milliseconds() {
        let parsed = parse_filename_timestamp("PXL_20240315_143022123.jpg").unwrap();
        assert_eq!(parsed.with_nanosecond(0).unwrap(), ts(2024, 3, 15, 14, 30, 22));
        assert_eq!(parsed.nanosecond(), 123_000_000);
    }

    #[test]
    fn iso_basic_with_t_separator() {
        assert_eq!(
            parse_filename_timestamp("20240315T143022.heic"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn compact_fourteen_digits() {
        assert_eq!(
            parse_filename_timestamp("20240315143022.png"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn dashed_date_dotted_time() {
        assert_eq!(
            parse_filename_timestamp("2024-03-15 14.30.22.png"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn screenshot_with_at_between_date_and_time() {
        assert_eq!(
            parse_filename_timestamp("Screenshot 2024-03-15 at 14.30.22.png"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn separated_fields_with_fraction() {
        let parsed = parse_filename_timestamp("2024-03-15_14-30-22.5.jpg").unwrap();
        assert_eq!(parsed.nanosecond(), 500_000_000);
    }

    #[test]
    fn plain_names_have_no_timestamp() {
        assert_eq!(parse_filename_timestamp("photo_a.jpg"), None);
        assert_eq!(parse_filename_timestamp("DSC_0042.JPG"), None);
        assert_eq!(parse_filename_timestamp(""), None);
    }

    #[test]
    fn impossible_dates_rejected() {
        assert_eq!(parse_filename_timestamp("IMG_20241345_143022.jpg"), None);
        assert_eq!(parse_filename_timestamp("IMG_20240315_256022.jpg"), None);
    }

    #[test]
    fn implausible_years_rejected() {
        assert_eq!(parse_filename_timestamp("12345678901234.jpg"), None);
    }

    #[test]
    fn later_match_found_after_leading_counter() {
        assert_eq!(
            parse_filename_timestamp("001_IMG_20240315_143022.jpg"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }

    #[test]
    fn extension_digits_are_ignored() {
        assert_eq!(
            parse_filename_timestamp("IMG_20240315_143022.mp4"),
            Some(ts(2024, 3, 15, 14, 30, 22))
        );
    }
}
