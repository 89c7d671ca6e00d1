use chrono::{DateTime, Utc};

/// A fixed-duration window of attempts counted against one identity key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RateLimitWindow {
    pub identity_key: String,
    pub attempts: i32,
    pub window_start: DateTime<Utc>,
}

impl RateLimitWindow {
    pub fn retry_at(&self, window: chrono::Duration) -> DateTime<Utc> {
        self.window_start + window
    }
}
