use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvitationToken {
    pub id: i64,
    pub email: String,
    pub token: String,
    pub role_id: i64,
    pub created_by: i64,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_error: Option<String>,
    pub email_retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl InvitationToken {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired(now)
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub token: String,
    pub role_id: i64,
    pub created_by: i64,
    pub expires_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Returned by `InvitationService::validate` — a read-only projection, not the full row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationSummary {
    pub email: String,
    pub role_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}
