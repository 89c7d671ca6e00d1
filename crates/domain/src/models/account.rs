use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Email, Username};

/// Persisted account row. `password_hash` is absent only for accounts created purely as
/// invitation placeholders before acceptance completes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub email: Email,
    pub username: Option<Username>,
    pub password_hash: Option<String>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: Email,
    pub username: Option<Username>,
    pub password_hash: Option<String>,
}

/// Forward-only aggregate assembled for session credentials: roles/permissions/person
/// are loaded alongside the account on demand, never stored back-referenced on it.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub account: Account,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl AccountProfile {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }

    pub fn is_teacher(&self) -> bool {
        self.roles.iter().any(|r| r == "teacher")
    }
}
