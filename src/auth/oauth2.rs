//! In-process OAuth2 authorization server
//!
//! Implements the authorization-code grant: clients are registered up front,
//! an authorization code is issued for a subject, and the client exchanges
//! that code (once) for an opaque access/refresh token pair.
//!
//! Every artifact is an opaque random string validated only by registry
//! lookup. Expiry is always checked on read; the periodic sweep started by
//! [`AuthorizationServer::start_cleanup_task`] only reclaims memory.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::config::OAuth2Config;
use crate::constants::{
    AUTHORIZATION_CODE_TTL_SECS, CODE_SWEEP_INTERVAL_SECS, OPAQUE_TOKEN_BYTES, OPAQUE_TOKEN_LEN,
};
use crate::error::{AuthzError, Result};
use crate::security::timing::constant_time_eq;

/// A registered OAuth2 client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub secret: String,
    /// Registered redirect URI, compared verbatim
    pub redirect_uri: String,
    pub scopes: HashSet<String>,
}

/// A one-time authorization code awaiting exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub subject_id: u64,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Tokens issued by a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub client_id: String,
    pub subject_id: u64,
    pub scopes: Vec<String>,
    /// Expiry of the current access token
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Issued tokens, keyed by access token, plus the refresh-token index
#[derive(Default)]
struct TokenStore {
    by_access: HashMap<String, TokenInfo>,
    /// refresh token -> current access token
    by_refresh: HashMap<String, String>,
}

/// OAuth2 authorization-code grant server
pub struct AuthorizationServer {
    clients: RwLock<HashMap<String, ClientInfo>>,
    codes: RwLock<HashMap<String, AuthorizationCode>>,
    tokens: RwLock<TokenStore>,
    config: OAuth2Config,
}

impl AuthorizationServer {
    pub fn new(config: OAuth2Config) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            tokens: RwLock::new(TokenStore::default()),
            config,
        }
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Registers a client, replacing any previous registration with the same id
    pub fn register_client(
        &self,
        id: &str,
        secret: &str,
        redirect_uri: &str,
        scopes: &[&str],
    ) -> Result<()> {
        let client = ClientInfo {
            id: id.to_string(),
            secret: secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        };

        self.clients.write()?.insert(id.to_string(), client);
        log::info!("OAuth2 client registered: {}", id);
        Ok(())
    }

    pub fn get_client(&self, id: &str) -> Result<Option<ClientInfo>> {
        Ok(self.clients.read()?.get(id).cloned())
    }

    /// Issues a single-use authorization code valid for ten minutes
    pub fn issue_authorization_code(
        &self,
        client_id: &str,
        subject_id: u64,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String> {
        {
            let clients = self.clients.read()?;
            let client = clients
                .get(client_id)
                .ok_or_else(|| AuthzError::UnknownClient(client_id.to_string()))?;
            if client.redirect_uri != redirect_uri {
                log::debug!("Redirect URI mismatch for client {}", client_id);
                return Err(AuthzError::RedirectMismatch);
            }
        }

        let code = generate_opaque_token();
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: client_id.to_string(),
            subject_id,
            redirect_uri: redirect_uri.to_string(),
            scopes: scopes.to_vec(),
            expires_at: Utc::now() + Duration::seconds(AUTHORIZATION_CODE_TTL_SECS),
        };

        self.codes.write()?.insert(code.clone(), record);
        log::debug!(
            "Authorization code issued to client {} for subject {}",
            client_id,
            subject_id
        );
        Ok(code)
    }

    /// Exchanges an authorization code for an access/refresh token pair
    pub fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenInfo> {
        {
            let clients = self.clients.read()?;
            let authenticated = clients
                .get(client_id)
                .map(|c| constant_time_eq(&c.secret, client_secret))
                .unwrap_or(false);
            if !authenticated {
                log::debug!("Client authentication failed for {}", client_id);
                return Err(AuthzError::InvalidClientCredentials);
            }
        }

        let grant = {
            let mut codes = self.codes.write()?;
            let grant = codes.get(code).ok_or(AuthzError::InvalidCode)?;

            if grant.client_id != client_id {
                return Err(AuthzError::ClientMismatch);
            }
            if grant.is_expired() {
                codes.remove(code);
                return Err(AuthzError::CodeExpired);
            }

            // Single use: the code is gone before any token exists
            codes.remove(code).ok_or(AuthzError::InvalidCode)?
        };

        let info = TokenInfo {
            access_token: generate_opaque_token(),
            refresh_token: generate_opaque_token(),
            client_id: grant.client_id,
            subject_id: grant.subject_id,
            scopes: grant.scopes,
            expires_at: self.access_expiry(),
        };

        let mut tokens = self.tokens.write()?;
        tokens
            .by_refresh
            .insert(info.refresh_token.clone(), info.access_token.clone());
        tokens
            .by_access
            .insert(info.access_token.clone(), info.clone());

        log::debug!(
            "Authorization code exchanged by client {} for subject {}",
            client_id,
            info.subject_id
        );
        Ok(info)
    }

    /// Looks up a live access token
    pub fn validate_token(&self, access_token: &str) -> Result<TokenInfo> {
        let tokens = self.tokens.read()?;
        let info = tokens
            .by_access
            .get(access_token)
            .ok_or(AuthzError::InvalidToken)?;

        if info.is_expired() {
            return Err(AuthzError::TokenExpired);
        }

        Ok(info.clone())
    }

    /// Rotates the access token bound to a refresh token.
    ///
    /// The refresh token itself is kept; only the access token and its
    /// expiry change.
    pub fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenInfo> {
        let mut tokens = self.tokens.write()?;

        let old_access = tokens
            .by_refresh
            .get(refresh_token)
            .cloned()
            .ok_or(AuthzError::InvalidRefreshToken)?;
        let mut info = tokens
            .by_access
            .remove(&old_access)
            .ok_or(AuthzError::InvalidRefreshToken)?;

        info.access_token = generate_opaque_token();
        info.expires_at = self.access_expiry();

        tokens
            .by_refresh
            .insert(refresh_token.to_string(), info.access_token.clone());
        tokens
            .by_access
            .insert(info.access_token.clone(), info.clone());

        log::debug!("Access token rotated for subject {}", info.subject_id);
        Ok(info)
    }

    /// Revokes an access token and the refresh token issued with it
    pub fn revoke_token(&self, access_token: &str) -> Result<()> {
        let mut tokens = self.tokens.write()?;
        if let Some(info) = tokens.by_access.remove(access_token) {
            tokens.by_refresh.remove(&info.refresh_token);
            log::info!(
                "Tokens revoked for subject {} (client {})",
                info.subject_id,
                info.client_id
            );
        }
        Ok(())
    }

    /// Drops expired authorization codes, returning how many were removed
    pub fn purge_expired_codes(&self) -> Result<usize> {
        let mut codes = self.codes.write()?;
        let before = codes.len();
        codes.retain(|_, grant| !grant.is_expired());
        let removed = before - codes.len();

        if removed > 0 {
            log::info!("Cleaned up {} expired authorization codes", removed);
        }
        Ok(removed)
    }

    /// Number of codes currently held, expired ones included
    pub fn pending_code_count(&self) -> Result<usize> {
        Ok(self.codes.read()?.len())
    }

    /// Start background sweep of expired authorization codes
    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let server = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(CODE_SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = server.purge_expired_codes() {
                    log::error!("Failed to clean up expired authorization codes: {}", e);
                }
            }
        })
    }

    fn access_expiry(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.config.access_token_ttl.as_secs() as i64)
    }

    #[cfg(test)]
    fn expire_code(&self, code: &str) {
        if let Some(grant) = self.codes.write().unwrap().get_mut(code) {
            grant.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    #[cfg(test)]
    fn expire_access_token(&self, access_token: &str) {
        if let Some(info) = self.tokens.write().unwrap().by_access.get_mut(access_token) {
            info.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

impl Default for AuthorizationServer {
    fn default() -> Self {
        Self::new(OAuth2Config::default())
    }
}

/// 32 random bytes, URL-safe base64, truncated to 32 characters
fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    token.truncate(OPAQUE_TOKEN_LEN);
    token
}
