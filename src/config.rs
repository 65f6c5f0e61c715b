//! Authorization core configuration
//! Selects the credential and permission engines and carries their parameters

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_ISSUER, DEFAULT_REFRESH_TOKEN_TTL_SECS,
};
use crate::error::{AuthzError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How credentials are issued and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Jwt,
    OAuth2,
}

impl FromStr for CredentialMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jwt" => Ok(Self::Jwt),
            "oauth2" | "oauth" => Ok(Self::OAuth2),
            other => Err(AuthzError::ConfigError(format!(
                "unknown credential mode '{}', expected 'jwt' or 'oauth2'",
                other
            ))),
        }
    }
}

/// How permission decisions are made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Rbac,
    Abac,
}

impl FromStr for PermissionMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rbac" => Ok(Self::Rbac),
            "abac" => Ok(Self::Abac),
            other => Err(AuthzError::ConfigError(format!(
                "unknown permission mode '{}', expected 'rbac' or 'abac'",
                other
            ))),
        }
    }
}

/// JWT signer parameters
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret, must not be empty
    pub secret_key: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub issuer: String,
}

impl JwtConfig {
    /// Creates a JWT configuration with default lifetimes and issuer
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS as u64),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS as u64),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }
}

/// OAuth2 authorization server parameters
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS as u64),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS as u64),
        }
    }
}

/// Top-level configuration consumed by `AuthManager::new`
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credential_mode: CredentialMode,
    /// `None` leaves the manager without a permission engine
    pub permission_mode: Option<PermissionMode>,
    /// Required when `credential_mode` is `Jwt`
    pub jwt: Option<JwtConfig>,
    pub oauth2: OAuth2Config,
}

impl AuthConfig {
    /// JWT credentials with the given permission model
    pub fn jwt(jwt: JwtConfig, permission_mode: PermissionMode) -> Self {
        Self {
            credential_mode: CredentialMode::Jwt,
            permission_mode: Some(permission_mode),
            jwt: Some(jwt),
            oauth2: OAuth2Config::default(),
        }
    }

    /// OAuth2 credentials with the given permission model
    pub fn oauth2(oauth2: OAuth2Config, permission_mode: PermissionMode) -> Self {
        Self {
            credential_mode: CredentialMode::OAuth2,
            permission_mode: Some(permission_mode),
            jwt: None,
            oauth2,
        }
    }

    /// Checks that the selected credential mode has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.credential_mode == CredentialMode::Jwt {
            match &self.jwt {
                None => {
                    return Err(AuthzError::ConfigError(
                        "JWT credential mode requires a JWT configuration".to_string(),
                    ))
                }
                Some(jwt) if jwt.secret_key.is_empty() => {
                    return Err(AuthzError::ConfigError(
                        "JWT secret key must not be empty".to_string(),
                    ))
                }
                Some(jwt) if jwt.access_token_ttl.is_zero() || jwt.refresh_token_ttl.is_zero() => {
                    return Err(AuthzError::ConfigError(
                        "JWT token lifetimes must be positive".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        if self.oauth2.access_token_ttl.is_zero() {
            return Err(AuthzError::ConfigError(
                "OAuth2 access token lifetime must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let credential_mode = env::var("AUTHZ_CREDENTIAL_MODE")
            .ok()
            .map(|m| m.parse::<CredentialMode>())
            .transpose()?
            .unwrap_or(CredentialMode::Jwt);

        let permission_mode = match env::var("AUTHZ_PERMISSION_MODE") {
            Ok(m) if m.trim().eq_ignore_ascii_case("none") => None,
            Ok(m) => Some(m.parse::<PermissionMode>()?),
            Err(_) => Some(PermissionMode::Rbac),
        };

        let jwt = match credential_mode {
            CredentialMode::Jwt => {
                let secret = env::var("AUTHZ_JWT_SECRET")
                    .or_else(|_| env::var("JWT_SECRET"))
                    .map_err(|_| {
                        AuthzError::ConfigError(
                            "AUTHZ_JWT_SECRET environment variable is required in jwt mode. \
                             Generate one with: openssl rand -base64 32"
                                .to_string(),
                        )
                    })?;

                let mut jwt = JwtConfig::new(secret);
                if let Ok(issuer) = env::var("AUTHZ_JWT_ISSUER") {
                    jwt.issuer = issuer;
                }
                if let Some(ttl) = secs_from_env("AUTHZ_JWT_ACCESS_TTL_SECS") {
                    jwt.access_token_ttl = ttl;
                }
                if let Some(ttl) = secs_from_env("AUTHZ_JWT_REFRESH_TTL_SECS") {
                    jwt.refresh_token_ttl = ttl;
                }
                Some(jwt)
            }
            CredentialMode::OAuth2 => None,
        };

        let mut oauth2 = OAuth2Config::default();
        if let Some(ttl) = secs_from_env("AUTHZ_OAUTH2_ACCESS_TTL_SECS") {
            oauth2.access_token_ttl = ttl;
        }
        if let Some(ttl) = secs_from_env("AUTHZ_OAUTH2_REFRESH_TTL_SECS") {
            oauth2.refresh_token_ttl = ttl;
        }

        let config = Self {
            credential_mode,
            permission_mode,
            jwt,
            oauth2,
        };
        config.validate()?;
        Ok(config)
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
