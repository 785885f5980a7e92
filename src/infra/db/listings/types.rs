use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{FileRecord, ListingRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct ListingRow {
    pub(crate) id: Uuid,
    pub(crate) owner_id: Uuid,
    pub(crate) owner_login: String,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) price: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) file_id: Uuid,
    pub(crate) file_name: String,
    pub(crate) file_mime: String,
    pub(crate) file_location: String,
    pub(crate) file_size_bytes: i64,
    pub(crate) file_checksum: String,
}

impl From<ListingRow> for ListingRecord {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            owner_login: row.owner_login,
            title: row.title,
            body: row.body,
            price: row.price,
            created_at: row.created_at,
            file: FileRecord {
                id: row.file_id,
                listing_id: row.id,
                name: row.file_name,
                mime: row.file_mime,
                location: row.file_location,
                size_bytes: row.file_size_bytes,
                checksum: row.file_checksum,
            },
            requester_is_owner: false,
        }
    }
}
