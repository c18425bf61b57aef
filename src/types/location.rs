use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

const MAX_SEGMENT_LEN: usize = 255;

/// A normalized, repository-relative path.
///
/// Always slash separated, without a leading slash, doubled slashes or
/// traversal segments. The empty location is the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Parses and normalizes a raw path.
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim();

        if path.contains('\\') || path.contains(':') || path.contains('~') || path.contains("..")
        {
            return Err(Error::bad_request(format!(
                "Path contains forbidden characters: {path}"
            )));
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Err(Error::bad_request("Path cannot be empty"));
        }

        for segment in &segments {
            validate_segment(segment)?;
        }

        Ok(Self(segments.join("/")))
    }

    /// The repository root.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last path segment, empty for the root.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Everything after the last dot of the file name.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.')
            .filter(|&idx| idx > 0 && idx + 1 < name.len())
            .map(|idx| &name[idx + 1..])
    }

    #[must_use]
    pub fn parent(&self) -> Option<Location> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Appends a relative path to this location.
    pub fn resolve(&self, child: &str) -> Result<Location> {
        let child = Self::parse(child)?;
        if self.is_root() {
            return Ok(child);
        }
        Ok(Self(format!("{}/{}", self.0, child.0)))
    }

    /// Returns a sibling location with the given file name.
    pub fn sibling(&self, file_name: &str) -> Result<Location> {
        self.parent().unwrap_or_else(Self::root).resolve(file_name)
    }

    /// Appends a suffix to the file name, e.g. a checksum extension.
    pub fn with_suffix(&self, suffix: &str) -> Result<Location> {
        Self::parse(&format!("{}{suffix}", self.0))
    }

    /// Path used when matching token routes: `/<repository>/<location>`.
    #[must_use]
    pub fn route_path(&self, repository: &str) -> String {
        if self.is_root() {
            format!("/{repository}")
        } else {
            format!("/{repository}/{}", self.0)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Location {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(Error::bad_request(
            "Path segment cannot exceed 255 characters",
        ));
    }

    const INVALID_CHARS: &[char] = &['\0', '\n', '\r'];
    if segment.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(Error::bad_request(
            "Path segment contains invalid characters",
        ));
    }

    if segment == "." {
        return Err(Error::bad_request("Path segment cannot be '.'"));
    }

    Ok(())
}
