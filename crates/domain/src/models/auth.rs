use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims embedded in the short-lived access credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub account_id: i64,
    /// The account's e-mail; doubles as the JWT `sub`.
    pub sub: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub is_admin: bool,
    pub is_teacher: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in the signed wrapper around a persisted refresh-token row.
///
/// Authority over a refresh credential lies in the row the dispatcher can still find by
/// `refresh_token_string`, not in the signature alone — the signature only proves the
/// wrapper hasn't been tampered with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub refresh_id: i64,
    pub refresh_token_string: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// A live or spent refresh-token row. `(family_id, generation)` is unique across all rows;
/// `generation` is strictly monotone within a family.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub token: String,
    pub account_id: i64,
    pub expiry: DateTime<Utc>,
    pub mobile: bool,
    pub identifier: Option<String>,
    pub family_id: i64,
    pub generation: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub account_id: i64,
    pub token: String,
    pub expiry: DateTime<Utc>,
    pub mobile: bool,
    pub identifier: Option<String>,
    pub family_id: i64,
    pub generation: i32,
}
