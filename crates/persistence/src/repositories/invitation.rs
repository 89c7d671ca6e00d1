use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::errors::RepositoryError;
use domain::models::{InvitationToken, NewInvitation};
use domain::ports::{InvitationListFilter, InvitationRepositoryPort};
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct InvitationRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepositoryPort for InvitationRepository {
    async fn create(
        &self,
        ctx: &Context,
        invitation: &NewInvitation,
    ) -> Result<InvitationToken, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, InvitationToken>(
                r#"
                INSERT INTO invitations
                    (email, token, role_id, created_by, expires_at, first_name, last_name,
                     email_retry_count)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
                RETURNING id, email, token, role_id, created_by, expires_at, used_at,
                          first_name, last_name, email_sent_at, email_error,
                          email_retry_count, created_at
                "#,
            )
            .bind(&invitation.email)
            .bind(&invitation.token)
            .bind(invitation.role_id)
            .bind(invitation.created_by)
            .bind(invitation.expires_at)
            .bind(&invitation.first_name)
            .bind(&invitation.last_name)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("Invitation")
        })
    }

    async fn update(&self, ctx: &Context, invitation: &InvitationToken) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query(
                r#"
                UPDATE invitations
                SET email = $2, role_id = $3, expires_at = $4, used_at = $5,
                    first_name = $6, last_name = $7, email_sent_at = $8,
                    email_error = $9, email_retry_count = $10
                WHERE id = $1
                "#,
            )
            .bind(invitation.id)
            .bind(&invitation.email)
            .bind(invitation.role_id)
            .bind(invitation.expires_at)
            .bind(invitation.used_at)
            .bind(&invitation.first_name)
            .bind(&invitation.last_name)
            .bind(invitation.email_sent_at)
            .bind(&invitation.email_error)
            .bind(invitation.email_retry_count)
            .execute(conn)
            .await
            .map_repo_err_ctx("Invitation")?;
            Ok(())
        })
    }

    async fn find_by_id(
        &self,
        ctx: &Context,
        id: i64,
    ) -> Result<Option<InvitationToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, InvitationToken>(
                r#"
                SELECT id, email, token, role_id, created_by, expires_at, used_at,
                       first_name, last_name, email_sent_at, email_error,
                       email_retry_count, created_at
                FROM invitations
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Invitation")
        })
    }

    async fn find_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<InvitationToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, InvitationToken>(
                r#"
                SELECT id, email, token, role_id, created_by, expires_at, used_at,
                       first_name, last_name, email_sent_at, email_error,
                       email_retry_count, created_at
                FROM invitations
                WHERE token = $1
                "#,
            )
            .bind(token)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Invitation")
        })
    }

    async fn mark_used(&self, ctx: &Context, id: i64, used_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE invitations SET used_at = $2 WHERE id = $1")
                .bind(id)
                .bind(used_at)
                .execute(conn)
                .await
                .map_repo_err_ctx("Invitation")?;
            Ok(())
        })
    }

    async fn invalidate_by_email(&self, ctx: &Context, email: &str) -> Result<u64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let result = sqlx::query(
                r#"
                UPDATE invitations
                SET used_at = NOW()
                WHERE email = $1 AND used_at IS NULL AND expires_at >= NOW()
                "#,
            )
            .bind(email)
            .execute(conn)
            .await
            .map_repo_err_ctx("Invitation")?;
            Ok(result.rows_affected())
        })
    }

    async fn delete_expired(&self, ctx: &Context, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        with_conn!(ctx, |conn| {
            let result =
                sqlx::query("DELETE FROM invitations WHERE used_at IS NOT NULL OR expires_at < $1")
                    .bind(now)
                    .execute(conn)
                    .await
                    .map_repo_err_ctx("Invitation")?;
            Ok(result.rows_affected())
        })
    }

    async fn list(
        &self,
        ctx: &Context,
        filter: InvitationListFilter,
    ) -> Result<Vec<InvitationToken>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, InvitationToken>(
                r#"
                SELECT id, email, token, role_id, created_by, expires_at, used_at,
                       first_name, last_name, email_sent_at, email_error,
                       email_retry_count, created_at
                FROM invitations
                WHERE $1::bool IS NULL
                   OR ($1 = TRUE AND used_at IS NULL AND expires_at >= NOW())
                   OR ($1 = FALSE AND (used_at IS NOT NULL OR expires_at < NOW()))
                ORDER BY created_at DESC
                "#,
            )
            .bind(filter.pending)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Invitation")
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
                UPDATE invitations
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
            .map_repo_err_ctx("Invitation")?;
            Ok(())
        })
    }
}
