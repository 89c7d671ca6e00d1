use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::RepositoryError;
use crate::models::{NewPasswordResetToken, PasswordResetToken};
use crate::tx::Context;

#[async_trait]
pub trait PasswordResetRepositoryPort: Send + Sync {
    async fn create(
        &self,
        ctx: &Context,
        token: &NewPasswordResetToken,
    ) -> Result<PasswordResetToken, RepositoryError>;

    async fn find_valid_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError>;

    async fn mark_used(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError>;

    async fn invalidate_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<(), RepositoryError>;

    async fn delete_expired(&self, ctx: &Context) -> Result<u64, RepositoryError>;

    async fn update_delivery_result(
        &self,
        ctx: &Context,
        id: i64,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
        retry_count: i32,
    ) -> Result<(), RepositoryError>;
}
