use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::{Account, NewAccount};
use crate::tx::Context;
use crate::value_objects::{Email, Username};

#[derive(Debug, Clone, Default)]
pub struct AccountFilters {
    pub search: Option<String>,
    pub active_only: bool,
}

#[async_trait]
pub trait AccountRepositoryPort: Send + Sync {
    async fn find_by_email(
        &self,
        ctx: &Context,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_username(
        &self,
        ctx: &Context,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Account>, RepositoryError>;

    async fn create(&self, ctx: &Context, account: &NewAccount) -> Result<Account, RepositoryError>;

    async fn update_password(
        &self,
        ctx: &Context,
        id: i64,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;

    async fn update_last_login(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError>;

    async fn deactivate(&self, ctx: &Context, id: i64) -> Result<(), RepositoryError>;

    async fn list(
        &self,
        ctx: &Context,
        filters: AccountFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64), RepositoryError>;

    async fn find_by_role(
        &self,
        ctx: &Context,
        role_name: &str,
    ) -> Result<Vec<Account>, RepositoryError>;
}
