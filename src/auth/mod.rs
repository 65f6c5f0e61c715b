//! Credential issuance and validation

pub mod oauth2;
pub mod token;
pub mod user;

// Re-export main components
pub use oauth2::{AuthorizationCode, AuthorizationServer, ClientInfo, TokenInfo};
pub use token::{Claims, TokenSigner};
pub use user::{UserInfo, UserLoader};
