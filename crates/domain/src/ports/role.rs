use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::{AccountRole, Permission, Role};
use crate::tx::Context;

#[async_trait]
pub trait RoleRepositoryPort: Send + Sync {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Role>, RepositoryError>;
    async fn find_by_name(&self, ctx: &Context, name: &str) -> Result<Option<Role>, RepositoryError>;
    async fn list(&self, ctx: &Context) -> Result<Vec<Role>, RepositoryError>;
    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Role>, RepositoryError>;
}

#[async_trait]
pub trait PermissionRepositoryPort: Send + Sync {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Permission>, RepositoryError>;
    async fn list(&self, ctx: &Context) -> Result<Vec<Permission>, RepositoryError>;
    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Permission>, RepositoryError>;
}

#[async_trait]
pub trait AccountRoleRepositoryPort: Send + Sync {
    async fn assign(
        &self,
        ctx: &Context,
        account_id: i64,
        role_id: i64,
    ) -> Result<AccountRole, RepositoryError>;
    async fn revoke(&self, ctx: &Context, account_id: i64, role_id: i64) -> Result<(), RepositoryError>;
    async fn list_for_account(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<AccountRole>, RepositoryError>;
}
