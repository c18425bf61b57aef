mod engine;
mod validation;

pub use engine::{EngineConfig, MirrorCredentials, MirrorHostConfig, RepositoryConfig};
pub use validation::validate_repository_name;
