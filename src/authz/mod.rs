//! Permission decisions

pub mod abac;
pub mod rbac;

// Re-export main components
pub use abac::{Attribute, Condition, Effect, Operator, Policy, PolicyEngine};
pub use rbac::{Permission, Role, RoleRegistry};
