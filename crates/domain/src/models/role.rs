use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountRole {
    pub account_id: i64,
    pub role_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountPermission {
    pub account_id: i64,
    pub permission_id: i64,
    /// `true` grants, `false` explicitly denies — direct grants override role permissions.
    pub granted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct RolePermission {
    pub role_id: i64,
    pub permission_id: i64,
}
