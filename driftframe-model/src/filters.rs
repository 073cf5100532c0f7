use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Favorite filtering: a fixed boolean, or a live entity whose state is
/// resolved at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FavoriteFilter {
    Fixed(bool),
    Entity(String),
}

/// One bound of a date-range filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DateBound {
    Fixed(DateTime<Utc>),
    Entity(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateBound>,
    pub end: Option<DateBound>,
}

/// Query filters applied by the index-backed providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub favorites: Option<FavoriteFilter>,
    pub date_range: Option<DateRange>,
}

impl QueryFilters {
    /// Entity ids whose state changes must trigger a full provider
    /// reset (filter changes are rare user actions; correctness over
    /// efficiency).
    pub fn referenced_entities(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(FavoriteFilter::Entity(id)) = &self.favorites {
            out.push(id.clone());
        }
        if let Some(range) = &self.date_range {
            for bound in [&range.start, &range.end].into_iter().flatten() {
                if let DateBound::Entity(id) = bound {
                    out.push(id.clone());
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_none() && self.date_range.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_entities_collects_all_live_references() {
        let filters = QueryFilters {
            favorites: Some(FavoriteFilter::Entity("input_boolean.favs".into())),
            date_range: Some(DateRange {
                start: Some(DateBound::Entity("input_datetime.from".into())),
                end: Some(DateBound::Fixed(Utc::now())),
            }),
        };
        assert_eq!(
            filters.referenced_entities(),
            vec!["input_boolean.favs".to_string(), "input_datetime.from".to_string()]
        );
        assert!(QueryFilters::default().referenced_entities().is_empty());
    }
}
