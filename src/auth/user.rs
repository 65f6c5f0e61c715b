use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::value::Attributes;

/// User details supplied by the hosting application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Unique user identifier
    pub id: u64,
    /// Name for display
    pub display_name: String,
    pub roles: Vec<String>,
    /// Subject attributes for ABAC decisions
    #[serde(default)]
    pub attrs: Attributes,
}

impl UserInfo {
    /// Creates a user with no roles or attributes
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            roles: Vec::new(),
            attrs: Attributes::new(),
        }
    }
}

/// Callback resolving a user id to its details.
///
/// Called synchronously on the request path and possibly from several
/// threads at once.
pub type UserLoader = Arc<dyn Fn(u64) -> Result<UserInfo> + Send + Sync>;
