mod authenticator;
mod security;
mod store;
mod token;

pub use authenticator::{Authenticator, extract_basic_credentials};
pub use security::SecurityProvider;
pub use store::{AccessTokenRecord, AccessTokenStore, MemoryTokenStore};
pub use token::TokenGenerator;
