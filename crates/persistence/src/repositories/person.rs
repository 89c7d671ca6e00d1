use async_trait::async_trait;
use domain::errors::RepositoryError;
use domain::models::{NewPerson, Person};
use domain::ports::PersonRepositoryPort;
use domain::tx::Context;
use domain::with_conn;
use sqlx::PgPool;

use crate::db_utils::SqlxResultExt;

#[derive(Clone)]
pub struct PersonRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl PersonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonRepositoryPort for PersonRepository {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Person>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Person>(
                "SELECT id, first_name, last_name, account_id FROM persons WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Person")
        })
    }

    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Option<Person>, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Person>(
                "SELECT id, first_name, last_name, account_id FROM persons WHERE account_id = $1",
            )
            .bind(account_id)
            .fetch_optional(conn)
            .await
            .map_repo_err_ctx("Person")
        })
    }

    async fn create(&self, ctx: &Context, person: &NewPerson) -> Result<Person, RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query_as::<_, Person>(
                r#"
                INSERT INTO persons (first_name, last_name, account_id)
                VALUES ($1, $2, $3)
                RETURNING id, first_name, last_name, account_id
                "#,
            )
            .bind(&person.first_name)
            .bind(&person.last_name)
            .bind(person.account_id)
            .fetch_one(conn)
            .await
            .map_repo_err_ctx("Person")
        })
    }

    async fn link_account(
        &self,
        ctx: &Context,
        person_id: i64,
        account_id: i64,
    ) -> Result<(), RepositoryError> {
        with_conn!(ctx, |conn| {
            sqlx::query("UPDATE persons SET account_id = $2 WHERE id = $1")
                .bind(person_id)
                .bind(account_id)
                .execute(conn)
                .await
                .map_repo_err_ctx("Person")?;
            Ok(())
        })
    }
}
