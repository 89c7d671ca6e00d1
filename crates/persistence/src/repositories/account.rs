use async_trait::async_trait;
use domain::errors::RepositoryError;
use domain::models::{Account, NewAccount};
use domain::ports::{AccountFilters, AccountRepositoryPort};
use domain::tx::Context;
use domain::value_objects::{Email, Username};
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct AccountRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepositoryPort for AccountRepository {
    async fn find_by_email(
        &self,
        ctx: &Context,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, username, password_hash, active, last_login,
                       created_at, updated_at
                FROM accounts
                WHERE email = $1
                "#,
            )
            .bind(email.as_str())
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Account")
        })
    }

    async fn find_by_username(
        &self,
        ctx: &Context,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, username, password_hash, active, last_login,
                       created_at, updated_at
                FROM accounts
                WHERE username = $1
                "#,
            )
            .bind(username.as_str())
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Account")
        })
    }

    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Account>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, username, password_hash, active, last_login,
                       created_at, updated_at
                FROM accounts
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Account")
        })
    }

    async fn create(&self, ctx: &Context, account: &NewAccount) -> Result<Account, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Account>(
                r#"
                INSERT INTO accounts (email, username, password_hash, active)
                VALUES ($1, $2, $3, TRUE)
                RETURNING id, email, username, password_hash, active, last_login,
                          created_at, updated_at
                "#,
            )
            .bind(account.email.as_str())
            .bind(account.username.as_ref().map(|u| u.as_str()))
            .bind(&account.password_hash)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("Account")
        })
    }

    async fn update_password(
        &self,
        ctx: &Context,
        id: i64,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(conn)
                .await
                .map_repo_err_ctx("Account")?;
            Ok(())
        })
    }

    async fn update_last_login(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE accounts SET last_login = NOW(), updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map_repo_err_ctx("Account")?;
            Ok(())
        })
    }

    async fn deactivate(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE accounts SET active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map_repo_err_ctx("Account")?;
            Ok(())
        })
    }

    async fn list(
        &self,
        ctx: &Context,
        filters: AccountFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64), RepositoryError> {
        with_conn!(ctx, |conn| {
            let search = filters.search.as_deref().map(|s| format!("%{s}%"));
            let rows = sqlx::query_as::<_, Account>(
                r#"
                SELECT id, email, username, password_hash, active, last_login,
                       created_at, updated_at
                FROM accounts
                WHERE ($1::bool IS FALSE OR active = TRUE)
                  AND ($2::text IS NULL OR email ILIKE $2 OR username ILIKE $2)
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(filters.active_only)
            .bind(&search)
            .bind(limit)
            .bind(offset)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Account")?;

            let total: (i64,) = sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM accounts
                WHERE ($1::bool IS FALSE OR active = TRUE)
                  AND ($2::text IS NULL OR email ILIKE $2 OR username ILIKE $2)
                "#,
            )
            .bind(filters.active_only)
            .bind(&search)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("Account")?;

            Ok((rows, total.0))
        })
    }

    async fn find_by_role(
        &self,
        ctx: &Context,
        role_name: &str,
    ) -> Result<Vec<Account>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Account>(
                r#"
                SELECT a.id, a.email, a.username, a.password_hash, a.active, a.last_login,
                       a.created_at, a.updated_at
                FROM accounts a
                JOIN account_roles ar ON ar.account_id = a.id
                JOIN roles r ON r.id = ar.role_id
                WHERE r.name = $1
                "#,
            )
            .bind(role_name)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Account")
        })
    }
}
