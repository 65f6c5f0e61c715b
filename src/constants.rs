// Token lifetimes (seconds)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;
pub const AUTHORIZATION_CODE_TTL_SECS: i64 = 10 * 60;

// JWT defaults
pub const DEFAULT_ISSUER: &str = "rusty-authz";

// Opaque OAuth2 artifacts: 32 random bytes, URL-safe base64, cut to 32 chars
pub const OPAQUE_TOKEN_BYTES: usize = 32;
pub const OPAQUE_TOKEN_LEN: usize = 32;

// Expired authorization code sweep
pub const CODE_SWEEP_INTERVAL_SECS: u64 = 60;

// Wildcard matching any resource, action, attribute key or value
pub const WILDCARD: &str = "*";
