use async_trait::async_trait;
use domain::errors::RepositoryError;
use domain::models::NewAuthEvent;
use domain::ports::AuthEventRepositoryPort;
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct AuthEventRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl AuthEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthEventRepositoryPort for AuthEventRepository {
    async fn create(&self, ctx: &Context, event: &NewAuthEvent) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query(
                r#"
                INSERT INTO auth_events (account_id, event_type, success, ip, user_agent, error)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.account_id)
            .bind(event.event_type.as_str())
            .bind(event.success)
            .bind(&event.ip)
            .bind(&event.user_agent)
            .bind(&event.error)
            .execute(conn)
            .await
            .map_repo_err_ctx("AuthEvent")?;
            Ok(())
        })
    }
}
