//! # Depot
//!
//! An embeddable Maven-style artifact repository engine.
//!
//! Repositories store files on disk under a quota, generate
//! `maven-metadata.xml` from their directory listings, fall back to mirror
//! hosts on misses and enforce token based access rules.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use depot::config::EngineConfig;
//! use depot::repository::{RepositoryRegistry, RepositoryService};
//! use depot::types::Location;
//!
//! let config = EngineConfig::load("depot.toml".as_ref())?;
//! let registry = Arc::new(RepositoryRegistry::from_config(&config).await?);
//! let service = RepositoryService::new(registry);
//!
//! let location = Location::parse("com/example/lib/maven-metadata.xml")?;
//! let metadata = service.find_bytes(None, "releases", &location).await?;
//! ```

pub mod auth;
pub mod checksum;
pub mod config;
pub mod error;
pub mod events;
pub mod metadata;
pub mod mirror;
pub mod repository;
pub mod storage;
pub mod types;
pub mod version;
