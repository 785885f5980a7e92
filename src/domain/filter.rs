//! Listing filters and the closed set of orderings they resolve to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied filter for listing retrieval.
///
/// Price bounds of `None` or `0` mean "unbounded". Sort field and direction
/// are free text; they are resolved into [`ListingOrder`] before any SQL is
/// produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: String,
    pub sort_order: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrder {
    /// Newest first with id as tie-breaker.
    Newest,
    Price(SortDirection),
    CreatedAt(SortDirection),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid sort order `{order}` for sort field `{field}`")]
    InvalidSortOrder { field: &'static str, order: String },
}

impl ListingFilter {
    /// Lower price bound; non-positive values mean unbounded.
    pub fn price_floor(&self) -> Option<i64> {
        self.min_price.filter(|value| *value > 0)
    }

    /// Upper price bound; non-positive values mean unbounded.
    pub fn price_ceiling(&self) -> Option<i64> {
        self.max_price.filter(|value| *value > 0)
    }

    /// Resolves the textual sort options.
    ///
    /// Unknown sort fields fall back to [`ListingOrder::Newest`] whatever the
    /// direction; a recognised field with an unrecognised direction is an
    /// error.
    pub fn order(&self) -> Result<ListingOrder, FilterError> {
        let field = match self.sort_by.as_str() {
            "price" => "price",
            "created_at" => "created_at",
            _ => return Ok(ListingOrder::Newest),
        };

        let direction = SortDirection::parse(&self.sort_order).ok_or_else(|| {
            FilterError::InvalidSortOrder {
                field,
                order: self.sort_order.clone(),
            }
        })?;

        Ok(match field {
            "price" => ListingOrder::Price(direction),
            _ => ListingOrder::CreatedAt(direction),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(sort_by: &str, sort_order: &str) -> ListingFilter {
        ListingFilter {
            sort_by: sort_by.to_string(),
            sort_order: sort_order.to_string(),
            ..ListingFilter::default()
        }
    }

    #[test]
    fn known_fields_resolve_with_direction() {
        assert_eq!(
            filter("price", "desc").order(),
            Ok(ListingOrder::Price(SortDirection::Desc))
        );
        assert_eq!(
            filter("created_at", "asc").order(),
            Ok(ListingOrder::CreatedAt(SortDirection::Asc))
        );
    }

    #[test]
    fn unknown_field_ignores_direction() {
        assert_eq!(filter("title", "sideways").order(), Ok(ListingOrder::Newest));
        assert_eq!(filter("", "").order(), Ok(ListingOrder::Newest));
    }

    #[test]
    fn known_field_with_bad_direction_is_rejected() {
        let err = filter("price", "up").order().expect_err("direction is invalid");
        assert_eq!(
            err,
            FilterError::InvalidSortOrder {
                field: "price",
                order: "up".to_string(),
            }
        );
        assert!(filter("created_at", "").order().is_err());
        assert!(filter("price", "ASC").order().is_err());
    }

    #[test]
    fn non_positive_bounds_are_unbounded() {
        for bound in [0, -1, i64::MIN] {
            let f = ListingFilter {
                min_price: Some(bound),
                max_price: Some(bound),
                ..ListingFilter::default()
            };
            assert_eq!(f.price_floor(), None);
            assert_eq!(f.price_ceiling(), None);
        }
    }
}
