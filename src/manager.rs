//! Authorization facade
//!
//! `AuthManager` owns one credential engine (JWT signer or OAuth2 server) and
//! at most one permission engine (RBAC registry or ABAC policy engine), both
//! chosen from configuration at construction time and never swapped.

use std::sync::Arc;

use crate::auth::oauth2::AuthorizationServer;
use crate::auth::token::TokenSigner;
use crate::auth::user::{UserInfo, UserLoader};
use crate::authz::abac::PolicyEngine;
use crate::authz::rbac::RoleRegistry;
use crate::config::{AuthConfig, CredentialMode, PermissionMode};
use crate::error::{AuthzError, Result};
use crate::value::{AttrValue, Attributes};

enum Credentials {
    Jwt(TokenSigner),
    OAuth2(Arc<AuthorizationServer>),
}

enum Permissions {
    Rbac(RoleRegistry),
    Abac(PolicyEngine),
}

/// Identity recovered from a validated credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: u64,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// Single entry point for issuing, validating and authorizing
pub struct AuthManager {
    credentials: Credentials,
    permissions: Option<Permissions>,
    user_loader: Option<UserLoader>,
}

impl AuthManager {
    /// Builds the engines selected by `config`
    pub fn new(config: AuthConfig, user_loader: Option<UserLoader>) -> Result<Self> {
        config.validate()?;

        let credentials = match config.credential_mode {
            CredentialMode::Jwt => {
                let jwt = config.jwt.ok_or_else(|| {
                    AuthzError::ConfigError(
                        "JWT credential mode requires a JWT configuration".to_string(),
                    )
                })?;
                Credentials::Jwt(TokenSigner::try_new(jwt)?)
            }
            CredentialMode::OAuth2 => {
                Credentials::OAuth2(Arc::new(AuthorizationServer::new(config.oauth2)))
            }
        };

        let permissions = config.permission_mode.map(|mode| match mode {
            PermissionMode::Rbac => Permissions::Rbac(RoleRegistry::new()),
            PermissionMode::Abac => Permissions::Abac(PolicyEngine::new()),
        });

        log::info!(
            "AuthManager ready: credentials={:?}, permissions={:?}",
            config.credential_mode,
            config.permission_mode
        );

        Ok(Self {
            credentials,
            permissions,
            user_loader,
        })
    }

    /// Issues an access/refresh pair. Only available with JWT credentials;
    /// OAuth2 tokens come from the authorization-code exchange.
    pub fn issue_token(
        &self,
        user_id: u64,
        display_name: &str,
        roles: &[String],
        extra: &Attributes,
    ) -> Result<(String, String)> {
        match &self.credentials {
            Credentials::Jwt(signer) => {
                signer.issue_token_pair(user_id, display_name, roles, extra)
            }
            Credentials::OAuth2(_) => Err(AuthzError::UnsupportedFlow(
                "OAuth2 tokens are only issued through the authorization code exchange".to_string(),
            )),
        }
    }

    /// Validates a credential and returns who it belongs to
    pub fn validate_token(&self, token: &str) -> Result<Principal> {
        match &self.credentials {
            Credentials::Jwt(signer) => {
                let claims = signer.validate(token)?;
                Ok(Principal {
                    user_id: claims.sub,
                    display_name: claims.name,
                    roles: claims.roles,
                })
            }
            Credentials::OAuth2(server) => {
                let info = server.validate_token(token)?;
                let user = self.load_user(info.subject_id);
                Ok(Principal {
                    user_id: info.subject_id,
                    display_name: user.as_ref().map(|u| u.display_name.clone()).unwrap_or_default(),
                    roles: user.map(|u| u.roles).unwrap_or_default(),
                })
            }
        }
    }

    /// Exchanges a refresh token for a new access token
    pub fn refresh_token(&self, refresh_token: &str) -> Result<String> {
        match &self.credentials {
            Credentials::Jwt(signer) => signer.refresh(refresh_token),
            Credentials::OAuth2(server) => server
                .refresh_access_token(refresh_token)
                .map(|info| info.access_token),
        }
    }

    /// Decides whether `user_id` may perform `action` on `resource`.
    ///
    /// RBAC consults role assignments for `resource`; ABAC evaluates
    /// policies against the loaded subject attributes and `resource_attrs`.
    pub fn check_permission(
        &self,
        user_id: u64,
        resource: &str,
        action: &str,
        resource_attrs: &Attributes,
    ) -> Result<()> {
        match &self.permissions {
            Some(Permissions::Rbac(registry)) => {
                registry.check_permission(user_id, resource, action)
            }
            Some(Permissions::Abac(engine)) => {
                let mut subject = self
                    .load_user(user_id)
                    .map(|u| u.attrs)
                    .unwrap_or_default();
                subject.insert("id".to_string(), AttrValue::from(user_id));

                engine.check_access_with_error(&subject, resource_attrs, action)
            }
            None => Err(AuthzError::NoPermissionManager),
        }
    }

    pub fn has_permission(
        &self,
        user_id: u64,
        resource: &str,
        action: &str,
        resource_attrs: &Attributes,
    ) -> bool {
        self.check_permission(user_id, resource, action, resource_attrs)
            .is_ok()
    }

    pub fn jwt(&self) -> Option<&TokenSigner> {
        match &self.credentials {
            Credentials::Jwt(signer) => Some(signer),
            Credentials::OAuth2(_) => None,
        }
    }

    pub fn oauth2(&self) -> Option<&Arc<AuthorizationServer>> {
        match &self.credentials {
            Credentials::OAuth2(server) => Some(server),
            Credentials::Jwt(_) => None,
        }
    }

    pub fn rbac(&self) -> Option<&RoleRegistry> {
        match &self.permissions {
            Some(Permissions::Rbac(registry)) => Some(registry),
            _ => None,
        }
    }

    pub fn abac(&self) -> Option<&PolicyEngine> {
        match &self.permissions {
            Some(Permissions::Abac(engine)) => Some(engine),
            _ => None,
        }
    }

    /// Runs the loader; a missing loader or a failed lookup yields `None`
    fn load_user(&self, user_id: u64) -> Option<UserInfo> {
        let loader = self.user_loader.as_ref()?;
        match loader(user_id) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("User loader failed for user {}: {}", user_id, e);
                None
            }
        }
    }
}
