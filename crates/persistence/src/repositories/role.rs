use async_trait::async_trait;
use domain::errors::RepositoryError;
use domain::models::{AccountRole, Permission, Role};
use domain::ports::{AccountRoleRepositoryPort, PermissionRepositoryPort, RoleRepositoryPort};
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct RoleRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepositoryPort for RoleRepository {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Role>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(conn)
                .await
                .map_repo_err_ctx("Role")
        })
    }

    async fn find_by_name(&self, ctx: &Context, name: &str) -> Result<Option<Role>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(conn)
                .await
                .map_repo_err_ctx("Role")
        })
    }

    async fn list(&self, ctx: &Context) -> Result<Vec<Role>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY name")
                .fetch_all(conn)
                .await
                .map_repo_err_ctx("Role")
        })
    }

    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Role>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Role>(
                r#"
                SELECT r.id, r.name, r.description
                FROM roles r
                JOIN account_roles ar ON ar.role_id = r.id
                WHERE ar.account_id = $1
                "#,
            )
            .bind(account_id)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Role")
        })
    }
}

#[derive(Clone)]
pub struct PermissionRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepositoryPort for PermissionRepository {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Permission>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Permission>(
                "SELECT id, name, resource, action FROM permissions WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Permission")
        })
    }

    async fn list(&self, ctx: &Context) -> Result<Vec<Permission>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Permission>(
                "SELECT id, name, resource, action FROM permissions ORDER BY resource, action",
            )
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Permission")
        })
    }

    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Permission>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Permission>(
                r#"
                SELECT DISTINCT p.id, p.name, p.resource, p.action
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                JOIN account_roles ar ON ar.role_id = rp.role_id
                WHERE ar.account_id = $1
                  AND p.id NOT IN (
                    SELECT permission_id FROM account_permissions
                    WHERE account_id = $1 AND granted = FALSE
                  )
                UNION
                SELECT p.id, p.name, p.resource, p.action
                FROM permissions p
                JOIN account_permissions ap ON ap.permission_id = p.id
                WHERE ap.account_id = $1 AND ap.granted = TRUE
                "#,
            )
            .bind(account_id)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("Permission")
        })
    }
}

#[derive(Clone)]
pub struct AccountRoleRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl AccountRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRoleRepositoryPort for AccountRoleRepository {
    async fn assign(
        &self,
        ctx: &Context,
        account_id: i64,
        role_id: i64,
    ) -> Result<AccountRole, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, AccountRole>(
                r#"
                INSERT INTO account_roles (account_id, role_id)
                VALUES ($1, $2)
                ON CONFLICT (account_id, role_id) DO UPDATE SET role_id = EXCLUDED.role_id
                RETURNING account_id, role_id
                "#,
            )
            .bind(account_id)
            .bind(role_id)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("AccountRole")
        })
    }

    async fn revoke(&self, ctx: &Context, account_id: i64, role_id: i64) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("DELETE FROM account_roles WHERE account_id = $1 AND role_id = $2")
                .bind(account_id)
                .bind(role_id)
                .execute(conn)
                .await
                .map_repo_err_ctx("AccountRole")?;
            Ok(())
        })
    }

    async fn list_for_account(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<AccountRole>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, AccountRole>(
                "SELECT account_id, role_id FROM account_roles WHERE account_id = $1",
            )
            .bind(account_id)
            .fetch_all(conn)
            .await
            .map_repo_err_ctx("AccountRole")
        })
    }
}

