use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AccessTokenIdentity, Permission, Route};

/// A persisted access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub name: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub permissions: Permission,
    pub routes: Vec<Route>,
}

impl AccessTokenRecord {
    #[must_use]
    pub fn identity(&self) -> AccessTokenIdentity {
        AccessTokenIdentity {
            name: self.name.clone(),
            permissions: self.permissions,
            routes: self.routes.clone(),
        }
    }
}

/// Lookup of access tokens. Persistence lives outside the engine.
pub trait AccessTokenStore: Send + Sync {
    fn find_by_name(&self, name: &str) -> Result<Option<AccessTokenRecord>>;
}

/// Keeps token records in memory.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AccessTokenRecord>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record by name.
    pub fn insert(&self, record: AccessTokenRecord) {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.name.clone(), record);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }
}

impl AccessTokenStore for MemoryTokenStore {
    fn find_by_name(&self, name: &str) -> Result<Option<AccessTokenRecord>> {
        Ok(self
            .tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned())
    }
}
