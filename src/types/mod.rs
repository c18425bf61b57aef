mod location;
mod models;
mod permission;

pub use location::Location;
pub use models::*;
pub use permission::Permission;
