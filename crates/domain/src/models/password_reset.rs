use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invariant: at most one valid (not used, not expired) row per account at any instant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub account_id: i64,
    pub token: String,
    pub expiry: DateTime<Utc>,
    pub used: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_error: Option<String>,
    pub email_retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expiry
    }
}

#[derive(Debug, Clone)]
pub struct NewPasswordResetToken {
    pub account_id: i64,
    pub token: String,
    pub expiry: DateTime<Utc>,
}
