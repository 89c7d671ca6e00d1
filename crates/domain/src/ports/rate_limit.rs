use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::RateLimitWindow;
use crate::tx::Context;

#[async_trait]
pub trait RateLimitRepositoryPort: Send + Sync {
    /// Reads the window for `key` without mutating it.
    async fn check(
        &self,
        ctx: &Context,
        key: &str,
    ) -> Result<Option<RateLimitWindow>, RepositoryError>;

    /// Read-modify-write: resets the window if it rolled over, otherwise increments in place.
    /// Must be called in the same transaction as the preceding `check` to avoid two
    /// concurrent callers both observing `attempts < threshold`.
    async fn increment(&self, ctx: &Context, key: &str) -> Result<RateLimitWindow, RepositoryError>;

    async fn cleanup_expired(&self, ctx: &Context) -> Result<u64, RepositoryError>;
}
