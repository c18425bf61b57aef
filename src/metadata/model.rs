use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Format of `lastUpdated` and snapshot `updated` stamps.
pub const LAST_UPDATED_FORMAT: &str = "%Y%m%d%H%M%S";

/// Root of a `maven-metadata.xml` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "metadata", rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Versions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_versions: Option<SnapshotVersions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default, rename = "version")]
    pub versions: Vec<String>,
}

/// The newest build of a snapshot version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u32>,
    /// Set when no timestamped build has been deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_copy: Option<bool>,
}

impl Snapshot {
    /// `<timestamp>-<buildNumber>` when both halves are present.
    #[must_use]
    pub fn build_id(&self) -> Option<String> {
        match (&self.timestamp, self.build_number) {
            (Some(timestamp), Some(build_number)) => Some(format!("{timestamp}-{build_number}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotVersions {
    #[serde(default, rename = "snapshotVersion")]
    pub entries: Vec<SnapshotVersion>,
}

/// One deployed file of a snapshot build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    pub updated: String,
}

impl Metadata {
    /// Listed versions, empty when the document has none.
    #[must_use]
    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .and_then(|v| v.versions.as_ref())
            .map(|v| v.versions.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.versioning.as_ref().and_then(|v| v.snapshot.as_ref())
    }

    #[must_use]
    pub fn snapshot_versions(&self) -> &[SnapshotVersion] {
        self.versioning
            .as_ref()
            .and_then(|v| v.snapshot_versions.as_ref())
            .map(|v| v.entries.as_slice())
            .unwrap_or_default()
    }
}

pub fn parse_metadata(content: &[u8]) -> Result<Metadata> {
    let text = std::str::from_utf8(content)
        .map_err(|e| Error::Serialization(format!("metadata is not valid UTF-8: {e}")))?;
    quick_xml::de::from_str(text)
        .map_err(|e| Error::Serialization(format!("invalid maven metadata: {e}")))
}

pub fn serialize_metadata(metadata: &Metadata) -> Result<String> {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut serializer = quick_xml::se::Serializer::new(&mut xml);
    serializer.indent(' ', 2);
    metadata
        .serialize(serializer)
        .map_err(|e| Error::Serialization(format!("failed to write maven metadata: {e}")))?;
    xml.push('\n');
    Ok(xml)
}
