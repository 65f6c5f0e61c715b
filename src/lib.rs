//! Rusty Authz - An embeddable authorization core implemented in Rust
//!
//! This library issues and validates credentials (signed JWTs and an
//! in-process OAuth2 authorization-code grant) and decides whether a
//! principal may perform an action, using role-based or attribute-based
//! policies.

pub mod auth;
pub mod authz;
pub mod config;
pub mod constants;
pub mod error;
pub mod manager;
pub mod security;
pub mod value;

// Re-export main components
pub use config::*;
pub use error::{AuthzError, Result};
pub use manager::{AuthManager, Principal};
pub use value::{AttrValue, Attributes};
