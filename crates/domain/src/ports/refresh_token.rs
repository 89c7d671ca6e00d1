use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::{NewRefreshToken, RefreshToken};
use crate::tx::Context;

#[async_trait]
pub trait RefreshTokenRepositoryPort: Send + Sync {
    async fn create(
        &self,
        ctx: &Context,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, RepositoryError>;

    async fn find_by_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Fetches the row with a row-level lock (`SELECT ... FOR UPDATE`) held until the
    /// bound transaction commits or rolls back. Must be called within a bound `Context`.
    async fn find_by_token_for_update(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    async fn delete(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError>;

    async fn delete_by_account_id(&self, ctx: &Context, account_id: i64) -> Result<(), RepositoryError>;

    async fn delete_by_family_id(&self, ctx: &Context, family_id: i64) -> Result<(), RepositoryError>;

    async fn get_latest_in_family(
        &self,
        ctx: &Context,
        family_id: i64,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Keeps only the `keep_k` most recently created rows for the account, deleting the rest.
    async fn cleanup_old_for_account(
        &self,
        ctx: &Context,
        account_id: i64,
        keep_k: i64,
    ) -> Result<(), RepositoryError>;

    async fn delete_expired(&self, ctx: &Context) -> Result<u64, RepositoryError>;

    async fn count_for_account(&self, ctx: &Context, account_id: i64) -> Result<i64, RepositoryError>;
}
