use std::fmt;
use std::time::Duration;

use reqwest::Client;

use crate::config::{MirrorCredentials, MirrorHostConfig};
use crate::error::{Error, Result};
use crate::types::Location;

const USER_AGENT: &str = concat!("depot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorReference {
    /// Another repository served by this engine.
    Loopback(String),
    /// Base URL of an upstream repository, without a trailing slash.
    Remote(String),
}

impl fmt::Display for MirrorReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loopback(name) => write!(f, "local:{name}"),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// An upstream consulted when a file is missing locally.
pub struct MirrorHost {
    pub reference: MirrorReference,
    pub store: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub credentials: Option<MirrorCredentials>,
    /// Accepted file suffixes, each starting with a dot. Empty accepts all.
    pub allowed_extensions: Vec<String>,
    /// Accepted group path prefixes in slash form. Empty accepts all.
    pub allowed_groups: Vec<String>,
    client: Option<Client>,
}

impl MirrorHost {
    pub fn from_config(config: &MirrorHostConfig) -> Result<Self> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let read_timeout = Duration::from_secs(config.read_timeout_secs);

        let (reference, client) = if config.is_remote() {
            let client = Client::builder()
                .connect_timeout(connect_timeout)
                .read_timeout(read_timeout)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| {
                    Error::Config(format!("failed to build client for {}: {e}", config.reference))
                })?;
            let base = config.reference.trim_end_matches('/').to_string();
            (MirrorReference::Remote(base), Some(client))
        } else {
            (MirrorReference::Loopback(config.reference.clone()), None)
        };

        let allowed_extensions = config
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim())
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.to_string()
                } else {
                    format!(".{ext}")
                }
            })
            .collect();

        let allowed_groups = config
            .allowed_groups
            .iter()
            .map(|group| group.trim().trim_matches('/').replace('.', "/"))
            .filter(|group| !group.is_empty())
            .collect();

        Ok(Self {
            reference,
            store: config.store,
            connect_timeout,
            read_timeout,
            credentials: config.credentials.clone(),
            allowed_extensions,
            allowed_groups,
            client,
        })
    }

    /// Returns true if the allow-lists admit this location.
    #[must_use]
    pub fn accepts(&self, location: &Location) -> bool {
        let extension_allowed = self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|ext| location.file_name().ends_with(ext.as_str()));

        let path = location.as_str();
        let group_allowed = self.allowed_groups.is_empty()
            || self.allowed_groups.iter().any(|group| {
                path == group
                    || path
                        .strip_prefix(group.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            });

        extension_allowed && group_allowed
    }

    #[must_use]
    pub fn loopback_name(&self) -> Option<&str> {
        match &self.reference {
            MirrorReference::Loopback(name) => Some(name),
            MirrorReference::Remote(_) => None,
        }
    }

    /// Full upstream URL of a location for remote hosts.
    #[must_use]
    pub fn url_for(&self, location: &Location) -> Option<String> {
        match &self.reference {
            MirrorReference::Remote(base) => Some(format!("{base}/{location}")),
            MirrorReference::Loopback(_) => None,
        }
    }

    pub(crate) fn request(
        &self,
        method: reqwest::Method,
        location: &Location,
    ) -> Option<reqwest::RequestBuilder> {
        let client = self.client.as_ref()?;
        let url = self.url_for(location)?;
        let request = client.request(method, url);
        Some(match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.login, Some(&credentials.password))
            }
            None => request,
        })
    }
}

impl fmt::Debug for MirrorHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorHost")
            .field("reference", &self.reference)
            .field("store", &self.store)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("allowed_groups", &self.allowed_groups)
            .finish_non_exhaustive()
    }
}
