use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventType {
    Login,
    Logout,
    TokenRefresh,
    TokenExpired,
}

impl AuthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventType::Login => "login",
            AuthEventType::Logout => "logout",
            AuthEventType::TokenRefresh => "token_refresh",
            AuthEventType::TokenExpired => "token_expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthEvent {
    pub id: i64,
    pub account_id: i64,
    pub event_type: String,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuthEvent {
    pub account_id: i64,
    pub event_type: AuthEventType,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub error: Option<String>,
}

impl NewAuthEvent {
    pub fn new(account_id: i64, event_type: AuthEventType, success: bool) -> Self {
        Self {
            account_id,
            event_type,
            success,
            ip: None,
            user_agent: None,
            error: None,
        }
    }

    pub fn with_request_info(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
