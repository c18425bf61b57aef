//! Snapshot file name handling.
//!
//! A snapshot file is named `<artifactId>-<baseVersion>-<buildId>[-<classifier>].<extension>`,
//! where the build id is either the literal `SNAPSHOT` or
//! `<yyyyMMdd.HHmmss>-<buildNumber>`.

use super::model::{Snapshot, SnapshotVersion};

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

const TIMESTAMP_LEN: usize = "yyyyMMdd.HHmmss".len();

/// Parts of a file name inside a snapshot version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub build_id: String,
    pub classifier: Option<String>,
    pub extension: String,
}

#[must_use]
pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Version without the `-SNAPSHOT` suffix.
#[must_use]
pub fn base_version(version: &str) -> &str {
    version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(version)
}

/// Splits a snapshot file name. Returns `None` for names that do not
/// belong to this artifact and version.
#[must_use]
pub fn parse_snapshot_file(file_name: &str, artifact_id: &str, version: &str) -> Option<SnapshotFile> {
    let prefix = format!("{artifact_id}-{}-", base_version(version));
    let rest = file_name.strip_prefix(&prefix)?;

    let search_from = if has_timestamp_prefix(rest) {
        TIMESTAMP_LEN
    } else {
        0
    };
    let dot = search_from + rest[search_from..].find('.')?;
    let (stem, extension) = (&rest[..dot], &rest[dot + 1..]);
    if stem.is_empty() || extension.is_empty() {
        return None;
    }

    // Only the last dash is examined, so classifiers containing a dash
    // keep their head in the build id.
    let (build_id, classifier) = match stem.rsplit_once('-') {
        Some((head, tail))
            if !head.is_empty() && !tail.chars().all(|c| c.is_ascii_digit()) =>
        {
            (head, Some(tail.to_string()))
        }
        _ => (stem, None),
    };

    Some(SnapshotFile {
        build_id: build_id.to_string(),
        classifier,
        extension: extension.to_string(),
    })
}

/// Splits a timestamped build id into its snapshot pair.
#[must_use]
pub fn parse_build_id(build_id: &str) -> Option<Snapshot> {
    if !has_timestamp_prefix(build_id) {
        return None;
    }
    let (timestamp, build_number) = build_id.rsplit_once('-')?;
    let build_number = build_number.parse::<u32>().ok()?;

    Some(Snapshot {
        timestamp: Some(timestamp.to_string()),
        build_number: Some(build_number),
        local_copy: None,
    })
}

/// File name a snapshot metadata entry refers to.
#[must_use]
pub fn snapshot_file_name(artifact_id: &str, entry: &SnapshotVersion) -> String {
    match &entry.classifier {
        Some(classifier) => format!(
            "{artifact_id}-{}-{classifier}.{}",
            entry.value, entry.extension
        ),
        None => format!("{artifact_id}-{}.{}", entry.value, entry.extension),
    }
}

/// Replaces the `SNAPSHOT` marker of a file name with a concrete build id.
#[must_use]
pub fn with_build_id(file_name: &str, artifact_id: &str, version: &str, build_id: &str) -> Option<String> {
    let marker = format!("{artifact_id}-{}-SNAPSHOT", base_version(version));
    let rest = file_name.strip_prefix(&marker)?;
    if !(rest.starts_with('.') || rest.starts_with('-')) {
        return None;
    }
    Some(format!(
        "{artifact_id}-{}-{build_id}{rest}",
        base_version(version)
    ))
}

fn has_timestamp_prefix(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() > TIMESTAMP_LEN
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'.'
        && bytes[9..TIMESTAMP_LEN].iter().all(u8::is_ascii_digit)
        && bytes[TIMESTAMP_LEN] == b'-'
}
