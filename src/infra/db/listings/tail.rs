//! Trailing SQL for filtered listing queries.
//!
//! The tail is appended to a select over `listings p` and contains only
//! numbered placeholders; every value travels in [`QueryTail::params`].

use crate::domain::filter::{FilterError, ListingFilter, ListingOrder, SortDirection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTail {
    pub sql: String,
    /// Values for `$1..$n`, in placeholder order.
    pub params: Vec<i64>,
}

/// Builds the `WHERE`/`ORDER BY`/`LIMIT` tail.
///
/// Without a filter only pagination is emitted and row order is left to the
/// database.
pub fn build_tail(
    limit: u32,
    offset: u32,
    filter: Option<&ListingFilter>,
) -> Result<QueryTail, FilterError> {
    let mut sql = String::new();
    let mut params: Vec<i64> = Vec::with_capacity(4);

    if let Some(filter) = filter {
        let order = filter.order()?;

        let mut predicates = Vec::with_capacity(2);
        if let Some(min) = filter.price_floor() {
            params.push(min);
            predicates.push(format!("p.price >= ${}", params.len()));
        }
        if let Some(max) = filter.price_ceiling() {
            params.push(max);
            predicates.push(format!("p.price <= ${}", params.len()));
        }

        if !predicates.is_empty() {
            sql.push_str("WHERE ");
            sql.push_str(&predicates.join(" AND "));
            sql.push('\n');
        }

        sql.push_str("ORDER BY ");
        sql.push_str(order_clause(order));
        sql.push('\n');
    }

    params.push(i64::from(limit));
    let limit_index = params.len();
    params.push(i64::from(offset));
    let offset_index = params.len();
    sql.push_str(&format!("LIMIT ${limit_index} OFFSET ${offset_index}"));

    Ok(QueryTail { sql, params })
}

fn order_clause(order: ListingOrder) -> &'static str {
    match order {
        ListingOrder::Newest => "p.created_at DESC, p.id ASC",
        ListingOrder::Price(SortDirection::Asc) => "p.price ASC, p.created_at DESC, p.id ASC",
        ListingOrder::Price(SortDirection::Desc) => "p.price DESC, p.created_at DESC, p.id ASC",
        ListingOrder::CreatedAt(SortDirection::Asc) => "p.created_at ASC, p.id ASC",
        ListingOrder::CreatedAt(SortDirection::Desc) => "p.created_at DESC, p.id ASC",
    }
}
