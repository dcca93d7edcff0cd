//! Subdirectory discovery for a date partition.

use std::collections::BTreeSet;
use tracing::debug;

use crate::error::DiscoverError;
use crate::partition::first_segment;
use crate::storage::BlobStore;

/// Distinct first-level subdirectory names below `date_prefix`.
///
/// Every blob under the prefix contributes the segment that follows it, so a
/// blob stored directly in the date folder contributes its own file name.
/// An empty partition yields an empty set.
pub async fn discover(
    store: &dyn BlobStore,
    date_prefix: &str,
) -> Result<BTreeSet<String>, DiscoverError> {
    let blobs = store
        .list(date_prefix)
        .await
        .map_err(|source| DiscoverError::Listing {
            prefix: date_prefix.to_string(),
            source,
        })?;

    let subdirectories: BTreeSet<String> = blobs
        .iter()
        .filter_map(|name| first_segment(date_prefix, name))
        .map(str::to_string)
        .collect();

    debug!(
        prefix = %date_prefix,
        blobs = blobs.len(),
        subdirectories = subdirectories.len(),
        "discovered"
    );

    Ok(subdirectories)
}
