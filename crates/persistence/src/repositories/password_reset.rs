use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::RepositoryError;
use domain::models::{NewPasswordResetToken, PasswordResetToken};
use domain::ports::PasswordResetRepositoryPort;
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct PasswordResetRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl PasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepositoryPort for PasswordResetRepository {
    async fn create(
        &self,
        ctx: &Context,
        token: &NewPasswordResetToken,
    ) -> Result<PasswordResetToken, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, PasswordResetToken>(
                r#"
                INSERT INTO password_reset_tokens (account_id, token, expiry, used, email_retry_count)
                VALUES ($1, $2, $3, FALSE, 0)
                RETURNING id, account_id, token, expiry, used, email_sent_at, email_error,
                          email_retry_count, created_at
                "#,
            )
            .bind(token.account_id)
            .bind(&token.token)
            .bind(token.expiry)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("PasswordResetToken")
        })
    }

    async fn find_valid_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, PasswordResetToken>(
                r#"
                SELECT id, account_id, token, expiry, used, email_sent_at, email_error,
                       email_retry_count, created_at
                FROM password_reset_tokens
                WHERE token = $1 AND used = FALSE AND expiry >= NOW()
                "#,
            )
            .bind(token)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("PasswordResetToken")
        })
    }

    async fn mark_used(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map_repo_err_ctx("PasswordResetToken")?;
            Ok(())
        })
    }

    async fn invalidate_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query(
                "UPDATE password_reset_tokens SET used = TRUE WHERE account_id = $1 AND used = FALSE",
            )
            .bind(account_id)
            .execute(conn)
            .await
            .map_repo_err_ctx("PasswordResetToken")?;
            Ok(())
        })
    }

    async fn delete_expired(&self, ctx: &Context) -> Result<u64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let result = sqlx::query(
                "DELETE FROM password_reset_tokens WHERE used = TRUE OR expiry < NOW()",
            )
            .execute(conn)
            .await
            .map_repo_err_ctx("PasswordResetToken")?;
            Ok(result.rows_affected())
        })
    }

    async fn update_delivery_result(
        &self,
        ctx: &Context,
        id: i64,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
        retry_count: i32,
    ) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query(
                r#"
                UPDATE password_reset_tokens
                SET email_sent_at = $2, email_error = $3, email_retry_count = $4
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(sent_at)
            .bind(error)
            .bind(retry_count)
            .execute(conn)
            .await
            .map_repo_err_ctx("PasswordResetToken")?;
            Ok(())
        })
    }
}
