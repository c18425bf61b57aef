use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::validation::validate_repository_name;
use crate::error::{Error, Result};
use crate::storage::Quota;
use crate::types::Visibility;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Root of all repository trees, `<data_dir>/repositories/<name>`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default, rename = "repository")]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub redeployment: bool,
    /// Number of snapshot builds to keep, -1 keeps everything.
    #[serde(default = "default_preserved")]
    pub preserved: i32,
    /// `"NN%"` or `"<number>[B|KB|MB|GB]"`, unlimited when absent.
    #[serde(default)]
    pub quota: Option<String>,
    #[serde(default, rename = "mirror")]
    pub mirrors: Vec<MirrorHostConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorHostConfig {
    /// Either the name of another local repository or a remote base URL.
    pub reference: String,
    #[serde(default)]
    pub store: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default)]
    pub credentials: Option<MirrorCredentials>,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorCredentials {
    pub login: String,
    pub password: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_preserved() -> i32 {
    -1
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    #[must_use]
    pub fn repositories_dir(&self) -> PathBuf {
        self.data_dir.join("repositories")
    }

    #[must_use]
    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for repository in &self.repositories {
            repository.validate()?;
            if !names.insert(repository.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate repository name: {}",
                    repository.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            repositories: Vec::new(),
        }
    }
}

impl RepositoryConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::default(),
            redeployment: false,
            preserved: default_preserved(),
            quota: None,
            mirrors: Vec::new(),
        }
    }

    pub fn parsed_quota(&self) -> Result<Quota> {
        match &self.quota {
            Some(quota) => Quota::parse(quota),
            None => Ok(Quota::Unlimited),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_repository_name(&self.name).map_err(Error::Config)?;

        if self.preserved < -1 {
            return Err(Error::Config(format!(
                "repository {}: preserved must be -1 or greater",
                self.name
            )));
        }

        self.parsed_quota()?;

        for mirror in &self.mirrors {
            if mirror.reference.trim().is_empty() {
                return Err(Error::Config(format!(
                    "repository {}: mirror reference cannot be empty",
                    self.name
                )));
            }
            if mirror.reference == self.name {
                return Err(Error::Config(format!(
                    "repository {} cannot mirror itself",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

impl MirrorHostConfig {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            store: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            credentials: None,
            allowed_extensions: Vec::new(),
            allowed_groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.reference.starts_with("http://") || self.reference.starts_with("https://")
    }
}
