use async_trait::async_trait;
use domain::errors::RepositoryError;
use domain::models::{NewRefreshToken, RefreshToken};
use domain::ports::RefreshTokenRepositoryPort;
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct RefreshTokenRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepositoryPort for RefreshTokenRepository {
    async fn create(
        &self,
        ctx: &Context,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, RefreshToken>(
                r#"
                INSERT INTO refresh_tokens
                    (token, account_id, expiry, mobile, identifier, family_id, generation)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, token, account_id, expiry, mobile, identifier, family_id,
                          generation, created_at
                "#,
            )
            .bind(&token.token)
            .bind(token.account_id)
            .bind(token.expiry)
            .bind(token.mobile)
            .bind(&token.identifier)
            .bind(token.family_id)
            .bind(token.generation)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("RefreshToken")
        })
    }

    async fn find_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, RefreshToken>(
                r#"
                SELECT id, token, account_id, expiry, mobile, identifier, family_id,
                       generation, created_at
                FROM refresh_tokens
                WHERE token = $1
                "#,
            )
            .bind(token)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("RefreshToken")
        })
    }

    async fn find_by_token_for_update(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, RefreshToken>(
                r#"
                SELECT id, token, account_id, expiry, mobile, identifier, family_id,
                       generation, created_at
                FROM refresh_tokens
                WHERE token = $1
                FOR UPDATE
                "#,
            )
            .bind(token)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("RefreshToken")
        })
    }

    async fn delete(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map_repo_err_ctx("RefreshToken")?;
            Ok(())
        })
    }

    async fn delete_by_account_id(&self, ctx: &Context, account_id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("DELETE FROM refresh_tokens WHERE account_id = $1")
                .bind(account_id)
                .execute(conn)
                .await
                .map_repo_err_ctx("RefreshToken")?;
            Ok(())
        })
    }

    async fn delete_by_family_id(&self, ctx: &Context, family_id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("DELETE FROM refresh_tokens WHERE family_id = $1")
                .bind(family_id)
                .execute(conn)
                .await
                .map_repo_err_ctx("RefreshToken")?;
            Ok(())
        })
    }

    async fn get_latest_in_family(
        &self,
        ctx: &Context,
        family_id: i64,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, RefreshToken>(
                r#"
                SELECT id, token, account_id, expiry, mobile, identifier, family_id,
                       generation, created_at
                FROM refresh_tokens
                WHERE family_id = $1
                ORDER BY generation DESC
                LIMIT 1
                "#,
            )
            .bind(family_id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("RefreshToken")
        })
    }

    async fn cleanup_old_for_account(
        &self,
        ctx: &Context,
        account_id: i64,
        keep_k: i64,
    ) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query(
                r#"
                DELETE FROM refresh_tokens
                WHERE account_id = $1
                  AND id NOT IN (
                    SELECT id FROM refresh_tokens
                    WHERE account_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2
                  )
                "#,
            )
            .bind(account_id)
            .bind(keep_k)
            .execute(conn)
            .await
            .map_repo_err_ctx("RefreshToken")?;
            Ok(())
        })
    }

    async fn delete_expired(&self, ctx: &Context) -> Result<u64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let result = sqlx::query("DELETE FROM refresh_tokens WHERE expiry < NOW()")
                .execute(conn)
                .await
                .map_repo_err_ctx("RefreshToken")?;
            Ok(result.rows_affected())
        })
    }

    async fn count_for_account(&self, ctx: &Context, account_id: i64) -> Result<i64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let row: (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE account_id = $1")
                    .bind(account_id)
                    .fetch_one(conn)
                    .await
                    .map_repo_err_ctx("RefreshToken")?;
            Ok(row.0)
        })
    }
}
