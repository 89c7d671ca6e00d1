use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::NewAuthEvent;
use crate::tx::Context;

#[async_trait]
pub trait AuthEventRepositoryPort: Send + Sync {
    async fn create(&self, ctx: &Context, event: &NewAuthEvent) -> Result<(), RepositoryError>;
}
