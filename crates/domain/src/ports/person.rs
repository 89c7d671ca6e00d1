use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::models::{NewPerson, Person};
use crate::tx::Context;

#[async_trait]
pub trait PersonRepositoryPort: Send + Sync {
    async fn find_by_id(&self, ctx: &Context, id: i64) -> Result<Option<Person>, RepositoryError>;

    async fn find_by_account_id(
        &self,
        ctx: &Context,
        account_id: i64,
    ) -> Result<Option<Person>, RepositoryError>;

    async fn create(&self, ctx: &Context, person: &NewPerson) -> Result<Person, RepositoryError>;

    async fn link_account(
        &self,
        ctx: &Context,
        person_id: i64,
        account_id: i64,
    ) -> Result<(), RepositoryError>;
}
