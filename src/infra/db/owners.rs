use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{OwnersRepo, RepoError};
use crate::domain::entities::Requester;

use super::PostgresRepositories;
use crate::infra::db::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct OwnerRow {
    id: Uuid,
    login: String,
}

#[async_trait]
impl OwnersRepo for PostgresRepositories {
    async fn find_owner(&self, id: Uuid) -> Result<Option<Requester>, RepoError> {
        let row = sqlx::query_as::<_, OwnerRow>("SELECT id, login FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|row| Requester::new(row.id, row.login)))
    }
}
