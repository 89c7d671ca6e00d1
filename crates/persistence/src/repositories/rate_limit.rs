use async_trait::async_trait;
use chrono::Utc;
use core_services::rate_limit::{decide_rollover, RolloverDecision};
use domain::errors::RepositoryError;
use domain::models::RateLimitWindow;
use domain::ports::RateLimitRepositoryPort;
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct RateLimitRepository {
    #[allow(dead_code)]
    pool: PgPool,
    window: chrono::Duration,
}

impl RateLimitRepository {
    pub fn new(pool: PgPool, window: chrono::Duration) -> Self {
        Self { pool, window }
    }
}

#[async_trait]
impl RateLimitRepositoryPort for RateLimitRepository {
    async fn check(
        &self,
        ctx: &Context,
        key: &str,
    ) -> Result<Option<RateLimitWindow>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, RateLimitWindow>(
                "SELECT identity_key, attempts, window_start FROM rate_limit_windows WHERE identity_key = $1",
            )
            .bind(key)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("RateLimitWindow")
        })
    }

    async fn increment(&self, ctx: &Context, key: &str) -> Result<RateLimitWindow, RepositoryError> {
        let existing = self.check(ctx, key).await?;
        let now = Utc::now();

        with_conn!(ctx, |conn| {
            match decide_rollover(existing.as_ref(), now, self.window) {
                RolloverDecision::Reset => sqlx::query_as::<_, RateLimitWindow>(
                    r#"
                    INSERT INTO rate_limit_windows (identity_key, attempts, window_start)
                    VALUES ($1, 1, $2)
                    ON CONFLICT (identity_key)
                    DO UPDATE SET attempts = 1, window_start = EXCLUDED.window_start
                    RETURNING identity_key, attempts, window_start
                    "#,
                )
                .bind(key)
                .bind(now)
                .fetch_one(conn)
                .await
                .map_repo_err_ctx("RateLimitWindow"),
                RolloverDecision::Increment => sqlx::query_as::<_, RateLimitWindow>(
                    r#"
                    UPDATE rate_limit_windows
                    SET attempts = attempts + 1
                    WHERE identity_key = $1
                    RETURNING identity_key, attempts, window_start
                    "#,
                )
                .bind(key)
                .fetch_one(conn)
                .await
                .map_repo_err_ctx("RateLimitWindow"),
            }
        })
    }

    async fn cleanup_expired(&self, ctx: &Context) -> Result<u64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let cutoff = Utc::now() - self.window;
            let result = sqlx::query("DELETE FROM rate_limit_windows WHERE window_start < $1")
                .bind(cutoff)
                .execute(conn)
                .await
                .map_repo_err_ctx("RateLimitWindow")?;
            Ok(result.rows_affected())
        })
    }
}
