use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{ListingsWriteRepo, RepoError};
use crate::domain::entities::ListingRecord;

use super::PostgresRepositories;
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl ListingsWriteRepo for PostgresRepositories {
    async fn insert_listing_with_file(&self, listing: &ListingRecord) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO listings (id, owner_id, title, body, price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(listing.id)
        .bind(listing.owner_id)
        .bind(&listing.title)
        .bind(&listing.body)
        .bind(listing.price)
        .bind(listing.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let file = &listing.file;
        sqlx::query(
            r#"
            INSERT INTO listing_files (id, listing_id, name, mime, location, size_bytes, checksum)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(file.id)
        .bind(listing.id)
        .bind(&file.name)
        .bind(&file.mime)
        .bind(&file.location)
        .bind(file.size_bytes)
        .bind(&file.checksum)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_listing(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
