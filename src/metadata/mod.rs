//! Maven repository metadata.

mod model;
mod service;
mod snapshot;

pub use model::{
    LAST_UPDATED_FORMAT, Metadata, Snapshot, SnapshotVersion, SnapshotVersions, Versioning,
    Versions, parse_metadata, serialize_metadata,
};
pub use service::{GeneratedMetadata, MetadataService, merge_metadata};
pub use snapshot::{
    SnapshotFile, base_version, is_snapshot_version, parse_build_id, parse_snapshot_file,
    snapshot_file_name, with_build_id,
};

use crate::types::Location;

pub const METADATA_FILE: &str = "maven-metadata.xml";

#[must_use]
pub fn is_metadata_file(location: &Location) -> bool {
    location.file_name() == METADATA_FILE
}

/// True for the metadata document and its checksum siblings.
#[must_use]
pub fn is_metadata_location(location: &Location) -> bool {
    location
        .file_name()
        .strip_prefix(METADATA_FILE)
        .is_some_and(|rest| rest.is_empty() || crate::checksum::is_checksum_file(rest))
}

/// The metadata document a metadata location refers to: the location
/// itself, or the document a checksum sibling belongs to.
#[must_use]
pub fn metadata_target(location: &Location) -> Option<Location> {
    if is_metadata_file(location) {
        return Some(location.clone());
    }
    if !is_metadata_location(location) {
        return None;
    }
    location.sibling(METADATA_FILE).ok()
}
