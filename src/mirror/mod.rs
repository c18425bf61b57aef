//! Upstream mirrors consulted on local misses.

mod host;
mod resolver;

pub use host::{MirrorHost, MirrorReference};
pub use resolver::MirrorResolver;
