//! Date-partitioned path layout
//!
//! Inputs live at `{year}/{month}/{day}/{subdirectory}/*.csv` and the merged
//! output at `{year}/{month}/{day}/{subdirectory}/combined_data.csv`.

use chrono::{Datelike, NaiveDate};
use std::borrow::Cow;

/// `YYYY/MM/DD/` prefix for one day's partition.
pub fn date_prefix(date: NaiveDate) -> String {
    format!("{}/{:02}/{:02}/", date.year(), date.month(), date.day())
}

/// Directory path for one subdirectory of a date prefix, always ending in `/`.
pub fn directory_path(date_prefix: &str, subdirectory: &str) -> String {
    format!("{}{}/", ensure_trailing_slash(date_prefix), subdirectory)
}

/// First path segment of `blob_name` below `prefix`.
///
/// Returns `None` when the blob is not under the prefix or the remainder is empty.
pub fn first_segment<'a>(prefix: &str, blob_name: &'a str) -> Option<&'a str> {
    let rest = blob_name.strip_prefix(prefix)?;
    let segment = rest.split('/').next().unwrap_or_default();
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

pub fn ensure_trailing_slash(path: &str) -> Cow<'_, str> {
    if path.is_empty() || path.ends_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("{}/", path))
    }
}
