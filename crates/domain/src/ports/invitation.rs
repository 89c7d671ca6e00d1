use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::RepositoryError;
use crate::models::{InvitationToken, NewInvitation};
use crate::tx::Context;

#[derive(Debug, Clone, Default)]
pub struct InvitationListFilter {
    pub pending: Option<bool>,
}

#[async_trait]
pub trait InvitationRepositoryPort: Send + Sync {
    async fn create(
        &self,
        ctx: &Context,
        invitation: &NewInvitation,
    ) -> Result<InvitationToken, RepositoryError>;

    async fn update(&self, ctx: &Context, invitation: &InvitationToken) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        ctx: &Context,
        id: i64,
    ) -> Result<Option<InvitationToken>, RepositoryError>;

    async fn find_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<InvitationToken>, RepositoryError>;

    async fn mark_used(&self, ctx: &Context, id: i64, used_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn invalidate_by_email(&self, ctx: &Context, email: &str) -> Result<u64, RepositoryError>;

    async fn delete_expired(&self, ctx: &Context, now: DateTime<Utc>) -> Result<u64, RepositoryError>;

    async fn list(
        &self,
        ctx: &Context,
        filter: InvitationListFilter,
    ) -> Result<Vec<InvitationToken>, RepositoryError>;

    async fn update_delivery_result(
        &self,
        ctx: &Context,
        id: i64,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
        retry_count: i32,
    ) -> Result<(), RepositoryError>;
}
