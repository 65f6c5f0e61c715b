use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::JwtConfig;
use crate::error::{AuthzError, Result};
use crate::value::Attributes;

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID), encoded as a decimal string on the wire
    #[serde(with = "subject_id")]
    pub sub: u64,
    /// Display name
    pub name: String,
    /// Assigned roles, absent on refresh tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Caller supplied claims, absent on refresh tokens
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub extra: Attributes,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Not before (as UTC timestamp)
    pub nbf: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    /// Creates claims valid from now for `ttl`
    pub fn new(
        sub: u64,
        name: String,
        roles: Vec<String>,
        extra: Attributes,
        issuer: String,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now().timestamp();

        Self {
            sub,
            name,
            roles,
            extra,
            exp: now + ttl.as_secs() as i64,
            iat: now,
            nbf: now,
            iss: issuer,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

mod subject_id {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Creates and verifies HMAC-signed access and refresh tokens
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl TokenSigner {
    /// Creates a signer from its configuration.
    ///
    /// # Panics
    ///
    /// Panics if the secret key is empty. A signer without a key is a
    /// startup misconfiguration; use [`TokenSigner::try_new`] to handle it.
    pub fn new(config: JwtConfig) -> Self {
        match Self::try_new(config) {
            Ok(signer) => signer,
            Err(e) => panic!("TokenSigner cannot be created: {}", e),
        }
    }

    /// Creates a signer, reporting an empty secret as a configuration error
    pub fn try_new(config: JwtConfig) -> Result<Self> {
        if config.secret_key.is_empty() {
            return Err(AuthzError::ConfigError(
                "JWT secret key must not be empty".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            validation,
            config,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issues an access token carrying roles and extra claims
    pub fn issue_access_token(
        &self,
        subject_id: u64,
        display_name: &str,
        roles: &[String],
        extra: &Attributes,
    ) -> Result<String> {
        let claims = Claims::new(
            subject_id,
            display_name.to_string(),
            roles.to_vec(),
            extra.clone(),
            self.config.issuer.clone(),
            self.config.access_token_ttl,
        );
        log::debug!("Issuing access token {} for subject {}", claims.jti, subject_id);
        self.sign(&claims)
    }

    /// Issues a refresh token, which never carries roles or extra claims
    pub fn issue_refresh_token(&self, subject_id: u64, display_name: &str) -> Result<String> {
        let claims = Claims::new(
            subject_id,
            display_name.to_string(),
            Vec::new(),
            Attributes::new(),
            self.config.issuer.clone(),
            self.config.refresh_token_ttl,
        );
        log::debug!("Issuing refresh token {} for subject {}", claims.jti, subject_id);
        self.sign(&claims)
    }

    /// Issues an access/refresh pair for the same subject
    pub fn issue_token_pair(
        &self,
        subject_id: u64,
        display_name: &str,
        roles: &[String],
        extra: &Attributes,
    ) -> Result<(String, String)> {
        let access = self.issue_access_token(subject_id, display_name, roles, extra)?;
        let refresh = self.issue_refresh_token(subject_id, display_name)?;
        Ok((access, refresh))
    }

    /// Signs arbitrary claims with the configured key
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthzError::TokenGeneration(e.to_string()))
    }

    /// Verifies signature, issuer and time bounds, then returns the claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("JWT validation failed: {}", e);
                match AuthzError::from(e) {
                    // Algorithms jsonwebtoken cannot name, such as `none`,
                    // fail header parsing before the algorithm check runs
                    AuthzError::TokenMalformed(_)
                        if declared_algorithm(token).is_some_and(|alg| !alg.starts_with("HS")) =>
                    {
                        AuthzError::InvalidSignature
                    }
                    other => other,
                }
            })
    }

    /// Exchanges a valid refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self
            .validate(refresh_token)
            .map_err(|_| AuthzError::InvalidRefreshToken)?;

        self.issue_access_token(claims.sub, &claims.name, &claims.roles, &claims.extra)
    }

    /// Parses claims without checking signature or time bounds.
    ///
    /// Only meant for diagnostics; never base an authorization decision on it.
    pub fn extract_unverified(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthzError::TokenMalformed(e.to_string()))
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// The `alg` header field as written, without checking it names a known algorithm
fn declared_algorithm(token: &str) -> Option<String> {
    let segment = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<RawHeader>(&bytes)
        .ok()
        .map(|header| header.alg)
}
