use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    // Configuration errors
    ConfigError(String),

    // Credential validation errors
    InvalidSignature,
    InvalidToken,
    TokenExpired,
    TokenNotYetValid,
    TokenMalformed(String),
    InvalidRefreshToken,
    TokenGeneration(String),

    // OAuth2 protocol errors
    UnknownClient(String),
    RedirectMismatch,
    InvalidClientCredentials,
    InvalidCode,
    CodeExpired,
    ClientMismatch,

    // RBAC errors
    UnknownRole(String),
    PermissionDenied {
        user_id: u64,
        resource: String,
        action: String,
    },

    // ABAC errors
    AccessDenied(Option<String>),

    // Facade misuse
    UnsupportedFlow(String),
    NoPermissionManager,

    // User loader errors
    UserNotFound(u64),

    // System errors
    LockPoisoned(String),
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidSignature => write!(f, "Invalid token signature"),
            Self::InvalidToken => write!(f, "Invalid token"),
            Self::TokenExpired => write!(f, "Token expired"),
            Self::TokenNotYetValid => write!(f, "Token not yet valid"),
            Self::TokenMalformed(msg) => write!(f, "Malformed token: {}", msg),
            Self::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            Self::TokenGeneration(msg) => write!(f, "Failed to generate token: {}", msg),
            Self::UnknownClient(id) => write!(f, "Unknown client: {}", id),
            Self::RedirectMismatch => write!(f, "Redirect URI mismatch"),
            Self::InvalidClientCredentials => write!(f, "Invalid client credentials"),
            Self::InvalidCode => write!(f, "Invalid authorization code"),
            Self::CodeExpired => write!(f, "Authorization code expired"),
            Self::ClientMismatch => write!(f, "Authorization code was issued to another client"),
            Self::UnknownRole(name) => write!(f, "Unknown role: {}", name),
            Self::PermissionDenied {
                user_id,
                resource,
                action,
            } => write!(
                f,
                "Permission denied: user {} cannot {} on {}",
                user_id, action, resource
            ),
            Self::AccessDenied(Some(policy)) => write!(f, "Access denied by policy {}", policy),
            Self::AccessDenied(None) => write!(f, "Access denied: no matching policy"),
            Self::UnsupportedFlow(msg) => write!(f, "Unsupported flow: {}", msg),
            Self::NoPermissionManager => write!(f, "No permission manager configured"),
            Self::UserNotFound(id) => write!(f, "User not found: {}", id),
            Self::LockPoisoned(msg) => write!(f, "Lock poisoned: {}", msg),
        }
    }
}

impl Error for AuthzError {}

// Converting from PoisonError to facilitate poisoned lock handling
impl<T> From<PoisonError<T>> for AuthzError {
    fn from(err: PoisonError<T>) -> Self {
        AuthzError::LockPoisoned(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthzError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                AuthzError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => AuthzError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthzError::TokenNotYetValid,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthzError::TokenMalformed(err.to_string()),
            _ => AuthzError::InvalidToken,
        }
    }
}

// Generic result type for rusty-authz
pub type Result<T> = std::result::Result<T, AuthzError>;
