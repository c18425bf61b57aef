use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Permission;

/// Repository access tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    /// Unlisted, files fetchable without a token, browsing requires one.
    Hidden,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileDetails {
    Document(DocumentInfo),
    Directory(DirectoryInfo),
}

impl FileDetails {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Document(doc) => &doc.name,
            Self::Directory(dir) => &dir.name,
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub content_type: String,
    pub content_length: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl DocumentInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, content_length: u64) -> Self {
        let name = name.into();
        Self {
            content_type: content_type_for(&name).to_string(),
            name,
            content_length,
            last_modified: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryInfo {
    pub name: String,
    pub files: Vec<FileDetails>,
}

/// A (path prefix, permission) pair granted to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub permission: Permission,
}

impl Route {
    #[must_use]
    pub fn new(path: impl Into<String>, permission: Permission) -> Self {
        Self {
            path: path.into(),
            permission,
        }
    }

    /// Case-insensitive prefix match against a `/<repository>/<path>` string.
    /// The prefix has to end on a segment boundary, `/releases` does not
    /// cover `/releases-private`.
    #[must_use]
    pub fn covers(&self, route_path: &str) -> bool {
        is_path_prefix(&self.path, route_path)
    }

    /// True when the route grants something inside `route_path`.
    #[must_use]
    pub fn is_within(&self, route_path: &str) -> bool {
        is_path_prefix(route_path, &self.path)
    }
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
    let prefix = prefix.to_lowercase();
    let prefix = prefix.trim_end_matches('/');
    path.to_lowercase()
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenIdentity {
    pub name: String,
    pub permissions: Permission,
    pub routes: Vec<Route>,
}

impl AccessTokenIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Permission::default(),
            routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_route(mut self, path: impl Into<String>, permission: Permission) -> Self {
        self.routes.push(Route::new(path, permission));
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Permission) -> Self {
        self.permissions = self.permissions.union(permissions);
        self
    }

    #[must_use]
    pub fn is_manager(&self) -> bool {
        self.permissions.has(Permission::MANAGER)
    }

    /// Returns true if a route covering `route_path` grants `required`.
    #[must_use]
    pub fn has_route_permission(&self, route_path: &str, required: Permission) -> bool {
        self.routes
            .iter()
            .any(|route| route.permission.has(required) && route.covers(route_path))
    }
}

/// Guesses a MIME type from a file name.
#[must_use]
pub fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit('.').next().unwrap_or_default();
    match extension {
        "pom" | "xml" => "application/xml",
        "jar" | "war" | "ear" => "application/java-archive",
        "md5" | "sha1" | "sha256" | "sha512" | "txt" => "text/plain",
        "asc" => "application/pgp-signature",
        "json" | "module" => "application/json",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "html" => "text/html",
        _ => "application/octet-stream",
    }
}
