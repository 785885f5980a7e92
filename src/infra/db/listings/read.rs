use async_trait::async_trait;

use crate::application::repos::{ListingsRepo, RepoError};
use crate::domain::entities::ListingRecord;
use crate::domain::filter::ListingFilter;

use super::PostgresRepositories;
use super::build_tail;
use super::types::ListingRow;
use crate::infra::db::map_sqlx_error;

const LISTINGS_SELECT: &str = "SELECT p.id, p.owner_id, u.login AS owner_login, p.title, p.body, \
    p.price, p.created_at, f.id AS file_id, f.name AS file_name, f.mime AS file_mime, \
    f.location AS file_location, f.size_bytes AS file_size_bytes, f.checksum AS file_checksum \
    FROM listings p \
    INNER JOIN users u ON u.id = p.owner_id \
    INNER JOIN listing_files f ON f.listing_id = p.id\n";

#[async_trait]
impl ListingsRepo for PostgresRepositories {
    async fn filtered_listings(
        &self,
        limit: u32,
        offset: u32,
        filter: Option<&ListingFilter>,
    ) -> Result<Vec<ListingRecord>, RepoError> {
        let tail = build_tail(limit, offset, filter)?;
        let sql = format!("{LISTINGS_SELECT}{}", tail.sql);

        let mut query = sqlx::query_as::<_, ListingRow>(&sql);
        for param in &tail.params {
            query = query.bind(*param);
        }

        let rows = query
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(RepoError::NotFound);
        }

        Ok(rows.into_iter().map(ListingRecord::from).collect())
    }
}
